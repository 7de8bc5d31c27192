use std::fmt::{self, Display};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::harness::Expected;
use crate::termination::SourceLocation;

//######################################################################################################################
// Issues

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IssueKind {
    /// The block never reached the expected termination point within the timeout
    TerminationNotObserved,
    /// A precondition handler fired although its condition held
    ConditionHeld,
    /// The termination point fired after the harness stopped waiting
    LateTermination,
    /// The block could not be handed to the worker
    WorkerUnavailable,
}

/// A failure record handed to an [`IssueSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub kind: IssueKind,
    pub description: String,
    pub location: SourceLocation,
}

impl Issue {
    pub fn new(kind: IssueKind, description: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            description: description.into(),
            location,
        }
    }

    /// Whether this issue was raised by the harness itself rather than by the code under test.
    pub fn is_harness_failure(&self) -> bool {
        matches!(
            self.kind,
            IssueKind::TerminationNotObserved | IssueKind::WorkerUnavailable
        )
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.description)
    }
}

//######################################################################################################################
// Harness failures

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessFailure {
    TimedOut {
        expected: Expected,
        timeout: Duration,
        location: SourceLocation,
    },
    WorkerUnavailable {
        cause: String,
        location: SourceLocation,
    },
}

impl HarnessFailure {
    pub fn location(&self) -> SourceLocation {
        match self {
            Self::TimedOut { location, .. } | Self::WorkerUnavailable { location, .. } => *location,
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::TimedOut { expected, .. } => expected.failure_description().to_string(),
            Self::WorkerUnavailable { cause, .. } => {
                format!("Could not submit block to worker: {}", cause)
            }
        }
    }

    pub fn into_issue(self) -> Issue {
        let kind = match self {
            Self::TimedOut { .. } => IssueKind::TerminationNotObserved,
            Self::WorkerUnavailable { .. } => IssueKind::WorkerUnavailable,
        };
        Issue::new(kind, self.description(), self.location())
    }
}

impl Display for HarnessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut {
                timeout, location, ..
            } => write!(
                f,
                "{}: {} (waited {})",
                location,
                self.description(),
                humantime::format_duration(*timeout)
            ),
            Self::WorkerUnavailable { location, .. } => {
                write!(f, "{}: {}", location, self.description())
            }
        }
    }
}

impl std::error::Error for HarnessFailure {}

//######################################################################################################################
// Sinks

/// Receives issues recorded by the harness.
pub trait IssueSink: Send + Sync {
    fn record(&self, issue: Issue);

    /// Records an issue found on a worker thread after the harness stopped waiting.
    ///
    /// No test is listening on that thread anymore, so sinks that fail the test by
    /// panicking must not panic here.
    fn record_detached(&self, issue: Issue) {
        self.record(issue)
    }
}

/// Fails the current test by panicking with the issue.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicSink;

impl IssueSink for PanicSink {
    fn record(&self, issue: Issue) {
        if std::thread::panicking() {
            // Already unwinding, a second panic would abort
            tracing::error!(%issue, "dropping issue recorded while panicking");
            return;
        }
        panic!("{}", issue);
    }

    fn record_detached(&self, issue: Issue) {
        tracing::error!(%issue, kind = ?issue.kind, "issue recorded after the harness stopped waiting");
    }
}

/// Keeps every recorded issue for later inspection.
#[derive(Debug, Default)]
pub struct CollectingSink {
    issues: Mutex<Vec<Issue>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub fn take(&self) -> Vec<Issue> {
        std::mem::take(&mut *self.issues.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl IssueSink for CollectingSink {
    fn record(&self, issue: Issue) {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(issue);
    }
}

#[cfg(test)]
mod test {
    use std::panic::catch_unwind;

    use super::*;

    fn location() -> SourceLocation {
        SourceLocation {
            file: "tests/harness.rs",
            line: 7,
            column: 1,
        }
    }

    #[test]
    fn test_timeout_issue() {
        let failure = HarnessFailure::TimedOut {
            expected: Expected::Precondition,
            timeout: Duration::from_millis(1500),
            location: location(),
        };
        assert_eq!(
            failure.to_string(),
            "tests/harness.rs:7: Expected precondition failure in block. (waited 1s 500ms)"
        );

        let issue = failure.into_issue();
        assert_eq!(issue.kind, IssueKind::TerminationNotObserved);
        assert_eq!(issue.description, "Expected precondition failure in block.");
        assert_eq!(issue.location, location());
        assert!(issue.is_harness_failure());
    }

    #[test]
    fn test_only_harness_issues_are_marked() {
        assert!(!Issue::new(IssueKind::ConditionHeld, "", location()).is_harness_failure());
        assert!(!Issue::new(IssueKind::LateTermination, "", location()).is_harness_failure());
        assert!(Issue::new(IssueKind::WorkerUnavailable, "", location()).is_harness_failure());
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        assert!(sink.is_empty());

        sink.record(Issue::new(IssueKind::ConditionHeld, "held", location()));
        assert_eq!(sink.issues().len(), 1);
        assert_eq!(sink.take()[0].description, "held");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_panic_sink_detached_does_not_panic() {
        let result = catch_unwind(|| {
            PanicSink.record_detached(Issue::new(
                IssueKind::LateTermination,
                "fatal-error reached after the harness stopped waiting",
                location(),
            ))
        });
        assert!(result.is_ok());
    }

    #[test]
    fn test_collecting_sink_keeps_detached() {
        let sink = CollectingSink::new();
        sink.record_detached(Issue::new(IssueKind::LateTermination, "late", location()));
        assert_eq!(sink.issues()[0].kind, IssueKind::LateTermination);
    }

    #[test]
    fn test_panic_sink_fails() {
        let payload = catch_unwind(|| {
            PanicSink.record(Issue::new(
                IssueKind::TerminationNotObserved,
                "Expected fatal error in block.",
                location(),
            ))
        })
        .unwrap_err();
        assert_eq!(
            payload.downcast_ref::<String>().map(String::as_str),
            Some("tests/harness.rs:7: Expected fatal error in block.")
        );
    }
}
