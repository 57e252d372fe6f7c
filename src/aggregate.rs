use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::models::{ContributionEvent, ContributionKind, DateWindow};

/// Headline counters across all repositories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContributionSummary {
    pub pull_requests_opened: usize,
    pub pull_requests_reviewed: usize,
    pub comments: usize,
    /// Reviews and comments with a substantive body
    pub valid_comments: usize,
    pub commits: usize,
    pub lines_added: u64,
    pub lines_deleted: u64,
}

impl ContributionSummary {
    pub fn lines_modified(&self) -> u64 {
        self.lines_added + self.lines_deleted
    }

    fn record(&mut self, event: &ContributionEvent) {
        match event.kind {
            ContributionKind::PullRequest => self.pull_requests_opened += 1,
            ContributionKind::Review => self.pull_requests_reviewed += 1,
            ContributionKind::Comment => self.comments += 1,
            ContributionKind::Commit => self.commits += 1,
        }

        if event.substantive {
            self.valid_comments += 1;
        }

        if let Some(lines) = event.lines {
            self.lines_added += lines.additions;
            self.lines_deleted += lines.deletions;
        }
    }
}

/// Contribution counts for one date window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedReport {
    pub window: DateWindow,
    pub by_repository: BTreeMap<String, usize>,
    pub by_day: BTreeMap<NaiveDate, usize>,
    pub summary: ContributionSummary,
}

impl AggregatedReport {
    pub fn total(&self) -> usize {
        self.by_repository.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_repository.is_empty()
    }

    /// Busiest repositories first, ties broken by name
    pub fn top_repositories(&self, n: usize) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .by_repository
            .iter()
            .map(|(repo, count)| (repo.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Reduce events to per-repository and per-day counts inside `window`
pub fn aggregate<'a, I>(events: I, window: DateWindow) -> AggregatedReport
where
    I: IntoIterator<Item = &'a ContributionEvent>,
{
    let mut report = AggregatedReport {
        window,
        by_repository: BTreeMap::new(),
        by_day: BTreeMap::new(),
        summary: ContributionSummary::default(),
    };

    let mut dropped = 0usize;
    for event in events {
        if !window.contains(&event.timestamp) {
            dropped += 1;
            continue;
        }

        *report
            .by_repository
            .entry(event.repository.clone())
            .or_insert(0) += 1;
        *report
            .by_day
            .entry(event.timestamp.date_naive())
            .or_insert(0) += 1;
        report.summary.record(event);
    }

    debug!(kept = report.total(), dropped, "Aggregated contributions");

    report
}
