use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kind of contribution recorded for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionKind {
    Commit,
    PullRequest,
    Review,
    Comment,
}

/// Lines touched by a single commit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChanges {
    pub additions: u64,
    pub deletions: u64,
}

/// A single recorded activity attributed to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionEvent {
    /// Repository in `owner/name` form
    pub repository: String,
    pub kind: ContributionKind,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    /// Only set for commits
    pub lines: Option<LineChanges>,
    /// Review or comment body longer than a trivial acknowledgement
    pub substantive: bool,
}

impl ContributionEvent {
    pub fn new(
        repository: impl Into<String>,
        kind: ContributionKind,
        timestamp: DateTime<Utc>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            kind,
            timestamp,
            author: author.into(),
            lines: None,
            substantive: false,
        }
    }

    pub fn with_lines(mut self, lines: LineChanges) -> Self {
        self.lines = Some(lines);
        self
    }

    pub fn with_substantive(mut self, substantive: bool) -> Self {
        self.substantive = substantive;
        self
    }
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Returns `None` when `start` is after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Compares the UTC calendar day, so any time on either bound day is inside
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let day = timestamp.date_naive();
        self.start <= day && day <= self.end
    }
}

/// Body length above which a review or comment counts as substantive
pub const SUBSTANTIVE_BODY_LEN: usize = 10;

/// Characters are counted after trimming surrounding whitespace
pub fn is_substantive(body: Option<&str>) -> bool {
    body.map_or(false, |b| b.trim().chars().count() > SUBSTANTIVE_BODY_LEN)
}
