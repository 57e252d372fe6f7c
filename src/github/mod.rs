pub mod client;
pub mod pagination;

pub use client::GitHubClient;
