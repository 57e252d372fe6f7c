use tracing::info;

use crate::aggregate::{aggregate, AggregatedReport};
use crate::config::{Config, ReportFormat};
use crate::error::Result;
use crate::github::GitHubClient;
use crate::report::{render, render_json};

/// Fetch and aggregate contributions for the configured user and window
pub async fn collect(config: &Config) -> Result<AggregatedReport> {
    let client = GitHubClient::new(config)?;
    let events = client.fetch_contributions(config).await?;
    let report = aggregate(&events, config.window);

    info!(
        repositories = report.by_repository.len(),
        events = report.total(),
        "Aggregated contribution report"
    );

    Ok(report)
}

/// Run the whole pipeline and return the rendered report
pub async fn run(config: &Config) -> Result<String> {
    let report = collect(config).await?;

    match config.format {
        ReportFormat::Text => Ok(render(&report)),
        ReportFormat::Json => render_json(&report),
    }
}
