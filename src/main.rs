use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gh_contrib::{run, Config};

const ENVIRONMENT_HELP: &str = "\
Environment:
  GITHUB_TOKEN            Token sent as a bearer credential (required)
  GITHUB_USERNAME         Account whose contributions are reported (required)
  GITHUB_START_DATE       Inclusive start date, YYYY-MM-DD (required)
  GITHUB_END_DATE         Inclusive end date, YYYY-MM-DD (required)
  GITHUB_IS_ENTERPRISE    Use a GitHub Enterprise host [default: false]
  GITHUB_ENTERPRISE_URL   Enterprise base URL, required when GITHUB_IS_ENTERPRISE is true
  GITHUB_VERIFY_SSL       Verify TLS certificates, enterprise only [default: true]
  GITHUB_REPORT_FORMAT    text or json [default: text]";

/// All configuration comes from the environment
#[derive(Parser)]
#[command(name = "gh-contrib", version)]
#[command(about = "Summarise a user's GitHub contribution activity over a date range")]
#[command(after_help = ENVIRONMENT_HELP)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries the report
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("gh_contrib=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let _cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let report = run(&config)
        .await
        .context("Failed to build contribution report")?;

    println!("{}", report);

    Ok(())
}
