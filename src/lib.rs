pub mod aggregate;
pub mod config;
pub mod error;
pub mod github;
pub mod models;
pub mod pipeline;
pub mod report;

pub use aggregate::{aggregate, AggregatedReport, ContributionSummary};
pub use config::{Config, Host, ReportFormat};
pub use error::{ContributionError, Result};
pub use github::GitHubClient;
pub use models::*;
pub use pipeline::{collect, run};
pub use report::{render, render_json};
