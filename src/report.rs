use crate::aggregate::AggregatedReport;
use crate::error::{ContributionError, Result};

const TOP_REPOSITORIES: usize = 3;

/// Render a plain-text contribution report
pub fn render(report: &AggregatedReport) -> String {
    let mut out = String::new();

    out.push_str("User Contribution Report\n");
    out.push_str(&format!(
        "Date Range: {} - {}\n\n",
        report.window.start, report.window.end
    ));

    if report.is_empty() {
        out.push_str("No contributions found in this date range.\n");
        return out;
    }

    let summary = &report.summary;
    out.push_str(&format!("Pull Requests Opened: {}\n", summary.pull_requests_opened));
    out.push_str(&format!("Pull Requests Reviewed: {}\n", summary.pull_requests_reviewed));
    out.push_str(&format!("Comments: {}\n", summary.comments));
    out.push_str(&format!("Valid Comments: {}\n", summary.valid_comments));
    out.push_str(&format!("Commits: {}\n", summary.commits));
    out.push_str(&format!("Lines Added: {}\n", summary.lines_added));
    out.push_str(&format!("Lines Deleted: {}\n", summary.lines_deleted));
    out.push_str(&format!("Lines Modified: {}\n\n", summary.lines_modified()));

    out.push_str(&format!("Top {} Active Repositories:\n", TOP_REPOSITORIES));
    for (repo, count) in report.top_repositories(TOP_REPOSITORIES) {
        out.push_str(&format!("  - {}: {} {}\n", repo, count, plural(count)));
    }

    let width = report
        .by_repository
        .keys()
        .map(|r| r.chars().count())
        .max()
        .unwrap_or(0);

    out.push_str(&format!(
        "\nActivity by Repository ({} total):\n",
        report.total()
    ));
    for (repo, count) in &report.by_repository {
        out.push_str(&format!("  {:<width$}  {}\n", repo, count, width = width));
    }

    out
}

/// Render the report as pretty-printed JSON
pub fn render_json(report: &AggregatedReport) -> Result<String> {
    serde_json::to_string_pretty(report)
        .map_err(|e| ContributionError::unexpected("report", format!("failed to serialize: {}", e)))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "interaction"
    } else {
        "interactions"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::models::{ContributionEvent, ContributionKind, DateWindow, LineChanges};
    use chrono::{DateTime, NaiveDate, Utc};

    fn window() -> DateWindow {
        DateWindow::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 28).unwrap(),
        )
        .unwrap()
    }

    fn event(repo: &str, kind: ContributionKind, ts: &str) -> ContributionEvent {
        let ts = DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc);
        ContributionEvent::new(repo, kind, ts, "octocat")
    }

    fn sample() -> AggregatedReport {
        let events = vec![
            event("octo/api", ContributionKind::PullRequest, "2025-01-05T10:00:00Z"),
            event("octo/api", ContributionKind::Commit, "2025-01-05T11:00:00Z").with_lines(
                LineChanges {
                    additions: 12,
                    deletions: 3,
                },
            ),
            event("octo/web", ContributionKind::Review, "2025-02-01T10:00:00Z")
                .with_substantive(true),
        ];
        aggregate(&events, window())
    }

    #[test]
    fn test_render_text() {
        let text = render(&sample());

        assert!(text.starts_with("User Contribution Report\nDate Range: 2025-01-01 - 2025-03-28\n"));
        assert!(text.contains("Pull Requests Opened: 1\n"));
        assert!(text.contains("Pull Requests Reviewed: 1\n"));
        assert!(text.contains("Valid Comments: 1\n"));
        assert!(text.contains("Lines Modified: 15\n"));
        assert!(text.contains("  - octo/api: 2 interactions\n"));
        assert!(text.contains("  - octo/web: 1 interaction\n"));
        assert!(text.contains("Activity by Repository (3 total):\n"));
        assert!(text.contains("  octo/api  2\n"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let report = sample();
        assert_eq!(render(&report), render(&report));
    }

    #[test]
    fn test_render_empty() {
        let report = aggregate(&Vec::<ContributionEvent>::new(), window());
        let text = render(&report);
        assert!(text.contains("No contributions found"));
        assert!(!text.contains("Top 3"));
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["by_repository"]["octo/api"], 2);
        assert_eq!(value["by_day"]["2025-01-05"], 2);
        assert_eq!(value["summary"]["lines_added"], 12);
        assert_eq!(value["window"]["start"], "2025-01-01");
    }
}
