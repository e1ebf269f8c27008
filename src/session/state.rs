//! Session phases, events and outcomes

use std::fmt;

use crate::errors::TruthError;

/// Where an analysis session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    FileSelected,
    Analyzing,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::FileSelected => write!(f, "file selected"),
            Phase::Analyzing => write!(f, "analyzing"),
            Phase::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// User-facing notification raised when an analysis settles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: Severity,
}

impl Notice {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: Severity::Error,
        }
    }
}

/// Events delivered to the front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(Phase),
    Notification(Notice),
}

/// How a started analysis ended.
#[derive(Debug)]
pub enum AnalysisOutcome<R> {
    Completed(R),
    Failed(TruthError),
    /// The session was reset before the analysis settled
    Cancelled,
}

impl<R> AnalysisOutcome<R> {
    pub fn is_completed(&self) -> bool {
        matches!(self, AnalysisOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisOutcome::Cancelled)
    }

    pub fn result(self) -> Option<R> {
        match self {
            AnalysisOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}
