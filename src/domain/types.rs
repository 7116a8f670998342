use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceVerdict {
    Relevant,
    NotRelevant,
    /// The classifier could not produce an answer. Never notifies.
    Indeterminate,
}

impl RelevanceVerdict {
    pub fn should_notify(self) -> bool {
        matches!(self, RelevanceVerdict::Relevant)
    }

    pub fn label(self) -> &'static str {
        match self {
            RelevanceVerdict::Relevant => "relevant",
            RelevanceVerdict::NotRelevant => "not-relevant",
            RelevanceVerdict::Indeterminate => "indeterminate",
        }
    }
}

impl fmt::Display for RelevanceVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A verdict plus whatever the classifier (or the failure) said about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub verdict: RelevanceVerdict,
    pub reason: String,
}

impl Classification {
    pub fn new(verdict: RelevanceVerdict, reason: impl Into<String>) -> Self {
        Self {
            verdict,
            reason: reason.into(),
        }
    }

    pub fn indeterminate(reason: impl Into<String>) -> Self {
        Self::new(RelevanceVerdict::Indeterminate, reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRecord {
    pub last_refresh: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub scraped: usize,
    pub fresh: usize,
    pub prefiltered_out: usize,
    pub classified: usize,
    pub relevant: usize,
    pub indeterminate: usize,
    pub notified: usize,
    pub notify_failures: usize,
    pub retained: usize,
    pub refreshed_at: DateTime<Utc>,
}

/// Outcome of one triggered run, as reported back to whoever asked for it.
#[derive(Debug, Clone)]
pub enum RunStatus {
    Completed(PipelineReport),
    Failed(String),
}

impl RunStatus {
    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Completed(_))
    }

    pub fn status_line(&self) -> &'static str {
        match self {
            RunStatus::Completed(_) => "Manual check completed successfully.",
            RunStatus::Failed(_) => "Error during manual check.",
        }
    }
}
