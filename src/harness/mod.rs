//! Asserting that a block reaches a termination point.
//!
//! The harness installs an interceptor on the slots of the expected termination kinds,
//! runs the block on a [`Worker`] and waits for the interceptor to fire. A block that
//! reaches the termination point is stopped there: its worker thread parks for good,
//! without unwinding, so neither `catch_unwind` nor destructors in the block run past
//! the termination point. The process keeps running. A block that does not reach it within the timeout produces an
//! [`Issue`](crate::report::Issue) of kind
//! [`TerminationNotObserved`](crate::report::IssueKind::TerminationNotObserved).
//!
//! Caveats:
//! * A block that neither terminates nor returns keeps its worker busy after the
//!   timeout, there is no way to cancel it.
//! * A termination point reached after the slot was restored goes to the default
//!   handler and aborts the process. Pick a timeout generous for the block.
//! * Every intercepted termination keeps one idle worker thread parked until the process
//!   exits. A [`ThreadPool`](threadpool::ThreadPool) worker loses that thread for good,
//!   size it for the number of assertions it serves.
//! * Assertions on the same slot of the same context must not overlap. Use separate
//!   [`TerminationContext`]s to run them concurrently.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::constants::{DESC_EXPECTED_FATAL_ERROR, DESC_EXPECTED_PRECONDITION};
use crate::context::{HandlerGuard, TerminationContext};
use crate::handler::{halt_current_thread, panic_message, Handler};
use crate::report::{HarnessFailure, Issue, IssueKind, IssueSink, PanicSink};
use crate::termination::{SourceLocation, Termination, TerminationKind};

mod signal;
mod worker;

pub use signal::{completion_signal, CompletionSignal, CompletionWaiter, Delivery};
pub use worker::{Job, SpawnThread, Worker};

//######################################################################################################################
// What a block is expected to reach

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expected {
    /// `precondition` with a false condition
    Precondition,
    /// `fatal_error` or `precondition_failure`
    FatalError,
    /// Exactly this termination point.
    ///
    /// `Only(TerminationKind::Precondition)` is an alias of `Precondition`.
    Only(TerminationKind),
}

impl Expected {
    pub fn kinds(self) -> &'static [TerminationKind] {
        match self {
            Self::Precondition | Self::Only(TerminationKind::Precondition) => {
                &[TerminationKind::Precondition]
            }
            Self::FatalError => &[
                TerminationKind::FatalError,
                TerminationKind::PreconditionFailure,
            ],
            Self::Only(TerminationKind::FatalError) => &[TerminationKind::FatalError],
            Self::Only(TerminationKind::PreconditionFailure) => {
                &[TerminationKind::PreconditionFailure]
            }
        }
    }

    pub fn failure_description(self) -> &'static str {
        match self {
            Self::Precondition | Self::Only(TerminationKind::Precondition) => {
                DESC_EXPECTED_PRECONDITION
            }
            _ => DESC_EXPECTED_FATAL_ERROR,
        }
    }
}

//######################################################################################################################
// Handler installed while a block runs

struct Intercepted {
    termination: Termination,
    issue: Option<Issue>,
}

struct Interceptor {
    signal: CompletionSignal<Intercepted>,
    sink: Arc<dyn IssueSink>,
}

impl Handler for Interceptor {
    fn terminate(&self, termination: Termination) -> ! {
        let kind = termination.kind;
        let location = termination.location;

        // Only hand-built terminations passed to `handler().terminate` get here with a
        // condition other than `Some(false)`
        let issue = (kind == TerminationKind::Precondition && termination.condition != Some(false))
            .then(|| {
                Issue::new(
                    IssueKind::ConditionHeld,
                    format!(
                        "Expected precondition to be false: {}",
                        termination.message
                    ),
                    location,
                )
            });

        match self.signal.satisfy(Intercepted { termination, issue }) {
            Delivery::Delivered => debug!(%kind, %location, "intercepted termination"),
            Delivery::AlreadySatisfied => {
                debug!(%kind, %location, "termination reached again, already observed")
            }
            Delivery::Expired => {
                warn!(%kind, %location, "termination reached after the harness stopped waiting");
                self.sink.record_detached(Issue::new(
                    IssueKind::LateTermination,
                    format!("{} reached after the harness stopped waiting", kind),
                    location,
                ));
            }
        }

        halt_current_thread()
    }
}

fn run_block<F>(block: F)
where
    F: FnOnce(),
{
    match catch_unwind(AssertUnwindSafe(block)) {
        Ok(()) => debug!("block returned without reaching a termination point"),
        Err(payload) => warn!(
            panic = panic_message(payload.as_ref()),
            "block panicked before reaching a termination point"
        ),
    }
}

//######################################################################################################################
// Harness

pub struct Harness {
    context: TerminationContext,
    config: HarnessConfig,
    worker: Option<Box<dyn Worker>>,
    sink: Arc<dyn IssueSink>,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    /// Global context, configuration from the environment, one thread per block, and
    /// failures reported by panicking.
    pub fn new() -> Self {
        Self {
            context: TerminationContext::global().clone(),
            config: HarnessConfig::from_env(),
            worker: None,
            sink: Arc::new(PanicSink),
        }
    }

    pub fn with_context(mut self, context: TerminationContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_worker(mut self, worker: impl Worker + 'static) -> Self {
        self.worker = Some(Box::new(worker));
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn IssueSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn context(&self) -> &TerminationContext {
        &self.context
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Runs `block` and reports a missing termination to the sink.
    ///
    /// Returns the intercepted termination, or `None` once the failure was recorded.
    #[track_caller]
    pub fn expect<F>(&self, expected: Expected, block: F) -> Option<Termination>
    where
        F: FnOnce() + Send + 'static,
    {
        match self.run_at(expected, block, SourceLocation::caller()) {
            Ok(termination) => Some(termination),
            Err(failure) => {
                self.sink.record(failure.into_issue());
                None
            }
        }
    }

    /// Runs `block` and returns the outcome instead of recording a failure.
    ///
    /// Issues found in an intercepted termination still go to the sink.
    #[track_caller]
    pub fn run<F>(&self, expected: Expected, block: F) -> Result<Termination, HarnessFailure>
    where
        F: FnOnce() + Send + 'static,
    {
        self.run_at(expected, block, SourceLocation::caller())
    }

    fn run_at<F>(
        &self,
        expected: Expected,
        block: F,
        location: SourceLocation,
    ) -> Result<Termination, HarnessFailure>
    where
        F: FnOnce() + Send + 'static,
    {
        let (signal, waiter) = completion_signal();
        let interceptor: Arc<dyn Handler> = Arc::new(Interceptor {
            signal,
            sink: self.sink.clone(),
        });

        // Restored on every path out of this function
        let _guards: Vec<HandlerGuard> = expected
            .kinds()
            .iter()
            .map(|kind| self.context.install(*kind, interceptor.clone()))
            .collect();

        let job: Job = Box::new(move || run_block(block));
        let submitted = match &self.worker {
            Some(worker) => worker.submit(job),
            None => SpawnThread::new(self.config.thread_name.as_str()).submit(job),
        };
        if let Err(e) = submitted {
            warn!(error = %e, %location, "could not submit block");
            return Err(HarnessFailure::WorkerUnavailable {
                cause: e.to_string(),
                location,
            });
        }

        debug!(?expected, %location, timeout = ?self.config.timeout, "waiting for termination");
        match waiter.wait(self.config.timeout) {
            Some(Intercepted { termination, issue }) => {
                if let Some(issue) = issue {
                    self.sink.record(issue);
                }
                Ok(termination)
            }
            None => {
                warn!(
                    ?expected,
                    %location,
                    "no termination within {}, the block may still be running",
                    humantime::format_duration(self.config.timeout)
                );
                Err(HarnessFailure::TimedOut {
                    expected,
                    timeout: self.config.timeout,
                    location,
                })
            }
        }
    }
}

//######################################################################################################################
// Shorthands on the global context

/// Fails the current test unless `block` reaches `precondition` with a false condition.
#[track_caller]
pub fn assert_precondition_failure<F>(block: F)
where
    F: FnOnce() + Send + 'static,
{
    Harness::new().expect(Expected::Precondition, block);
}

/// Fails the current test unless `block` reaches `fatal_error` or `precondition_failure`.
#[track_caller]
pub fn assert_fatal_error<F>(block: F)
where
    F: FnOnce() + Send + 'static,
{
    Harness::new().expect(Expected::FatalError, block);
}

/// Fails the current test unless `block` reaches the termination point of `kind`.
#[track_caller]
pub fn assert_terminates<F>(kind: TerminationKind, block: F)
where
    F: FnOnce() + Send + 'static,
{
    Harness::new().expect(Expected::Only(kind), block);
}
