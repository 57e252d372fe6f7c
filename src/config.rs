use std::fmt;

use chrono::NaiveDate;
use reqwest::Url;
use tracing::info;

use crate::error::{ContributionError, Result};
use crate::models::DateWindow;

pub const PUBLIC_API_URL: &str = "https://api.github.com";

pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const USERNAME_VAR: &str = "GITHUB_USERNAME";
pub const ENTERPRISE_URL_VAR: &str = "GITHUB_ENTERPRISE_URL";
pub const IS_ENTERPRISE_VAR: &str = "GITHUB_IS_ENTERPRISE";
pub const START_DATE_VAR: &str = "GITHUB_START_DATE";
pub const END_DATE_VAR: &str = "GITHUB_END_DATE";
pub const VERIFY_SSL_VAR: &str = "GITHUB_VERIFY_SSL";
pub const REPORT_FORMAT_VAR: &str = "GITHUB_REPORT_FORMAT";

/// How the final report is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Which API host the run talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    Public,
    Enterprise { url: String },
}

/// Run configuration, loaded once and passed into every stage
#[derive(Clone)]
pub struct Config {
    pub token: String,
    pub username: String,
    pub host: Host,
    pub window: DateWindow,
    pub verify_ssl: bool,
    pub format: ReportFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("host", &self.host)
            .field("window", &self.window)
            .field("verify_ssl", &self.verify_ssl)
            .field("format", &self.format)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token = get(TOKEN_VAR).ok_or_else(|| ContributionError::config(TOKEN_VAR, "not set"))?;
        let username = get(USERNAME_VAR)
            .map(|u| u.trim().to_string())
            .ok_or_else(|| ContributionError::config(USERNAME_VAR, "not set"))?;

        let is_enterprise = match get(IS_ENTERPRISE_VAR) {
            Some(raw) => parse_bool(IS_ENTERPRISE_VAR, &raw)?,
            None => false,
        };

        let host = if is_enterprise {
            let url = get(ENTERPRISE_URL_VAR).ok_or_else(|| {
                ContributionError::config(
                    ENTERPRISE_URL_VAR,
                    format!("required when {} is true", IS_ENTERPRISE_VAR),
                )
            })?;
            Host::Enterprise {
                url: validate_url(&url)?,
            }
        } else {
            Host::Public
        };

        let start = parse_date(START_DATE_VAR, get(START_DATE_VAR))?;
        let end = parse_date(END_DATE_VAR, get(END_DATE_VAR))?;
        let window = DateWindow::new(start, end).ok_or_else(|| {
            ContributionError::config(
                START_DATE_VAR,
                format!("start date {} is after end date {}", start, end),
            )
        })?;

        let verify_ssl = match get(VERIFY_SSL_VAR) {
            Some(raw) => parse_bool(VERIFY_SSL_VAR, &raw)?,
            None => true,
        };

        if !verify_ssl && host == Host::Public {
            return Err(ContributionError::config(
                VERIFY_SSL_VAR,
                "certificate verification can only be disabled for enterprise hosts",
            ));
        }

        let format = match get(REPORT_FORMAT_VAR) {
            Some(raw) => parse_format(&raw)?,
            None => ReportFormat::default(),
        };

        let config = Self {
            token,
            username,
            host,
            window,
            verify_ssl,
            format,
        };

        info!(
            username = %config.username,
            api = %config.api_base_url(),
            start = %config.window.start,
            end = %config.window.end,
            "Loaded configuration"
        );

        Ok(config)
    }

    /// REST API root for the configured host
    pub fn api_base_url(&self) -> String {
        match &self.host {
            Host::Public => PUBLIC_API_URL.to_string(),
            Host::Enterprise { url } => {
                if url.ends_with("/api/v3") {
                    url.clone()
                } else {
                    format!("{}/api/v3", url)
                }
            }
        }
    }

    pub fn is_enterprise(&self) -> bool {
        matches!(self.host, Host::Enterprise { .. })
    }
}

fn parse_bool(variable: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ContributionError::config(
            variable,
            format!("expected a boolean, got '{}'", other),
        )),
    }
}

fn parse_date(variable: &str, raw: Option<String>) -> Result<NaiveDate> {
    let raw = raw.ok_or_else(|| ContributionError::config(variable, "not set"))?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        ContributionError::config(
            variable,
            format!("'{}' is not a YYYY-MM-DD date: {}", raw.trim(), e),
        )
    })
}

fn parse_format(raw: &str) -> Result<ReportFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "text" => Ok(ReportFormat::Text),
        "json" => Ok(ReportFormat::Json),
        other => Err(ContributionError::config(
            REPORT_FORMAT_VAR,
            format!("expected 'text' or 'json', got '{}'", other),
        )),
    }
}

fn validate_url(raw: &str) -> Result<String> {
    let url = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(url).map_err(|e| {
        ContributionError::config(ENTERPRISE_URL_VAR, format!("'{}' is not a URL: {}", url, e))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ContributionError::config(
            ENTERPRISE_URL_VAR,
            format!("'{}' is not an http(s) URL", url),
        ));
    }
    Ok(url.to_string())
}
