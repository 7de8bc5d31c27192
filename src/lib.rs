//! Fatal error and precondition points that tests can intercept.
//!
//! Production code calls [`fatal_error!`], [`precondition!`] or [`precondition_failure!`].
//! By default these print a diagnostic and abort the process. Tests use the
//! [`harness`] to check that a block reaches one of them, without taking the test
//! process down:
//!
//! ```no_run
//! use rustyfatal::{assert_precondition_failure, precondition};
//!
//! fn checked_div(a: u32, b: u32) -> u32 {
//!     precondition!(b != 0, "division of {} by zero", a);
//!     a / b
//! }
//!
//! assert_precondition_failure(|| {
//!     checked_div(1, 0);
//! });
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod format;
pub mod handler;
pub mod harness;
pub mod report;
pub mod termination;

pub use config::HarnessConfig;
pub use context::{HandlerGuard, TerminationContext};
pub use handler::{halt_current_thread, Handler, HostAbort};
pub use harness::{
    assert_fatal_error, assert_precondition_failure, assert_terminates, Expected, Harness,
    SpawnThread, Worker,
};
pub use report::{CollectingSink, HarnessFailure, Issue, IssueKind, IssueSink, PanicSink};
pub use termination::{SourceLocation, Termination, TerminationKind};

//######################################################################################################################
// Termination points on the global context

/// Ends forward progress unconditionally. `message` is only evaluated on this path.
#[track_caller]
pub fn fatal_error<M>(message: M) -> !
where
    M: FnOnce() -> String,
{
    TerminationContext::global().fatal_error(message)
}

/// Returns if `condition` holds, ends forward progress otherwise.
#[track_caller]
pub fn precondition<C, M>(condition: C, message: M)
where
    C: FnOnce() -> bool,
    M: FnOnce() -> String,
{
    TerminationContext::global().precondition(condition, message)
}

/// Marks a state that must never be reached.
#[track_caller]
pub fn precondition_failure<M>(message: M) -> !
where
    M: FnOnce() -> String,
{
    TerminationContext::global().precondition_failure(message)
}

#[macro_export]
macro_rules! fatal_error {
    () => {
        $crate::fatal_error(::std::string::String::new)
    };
    ($($arg:tt)+) => {
        $crate::fatal_error(|| ::std::format!($($arg)+))
    };
}

/// Checks a condition, the message arguments are only formatted when it is false.
#[macro_export]
macro_rules! precondition {
    ($cond:expr $(,)?) => {
        $crate::precondition(|| $cond, ::std::string::String::new)
    };
    ($cond:expr, $($arg:tt)+) => {
        $crate::precondition(|| $cond, || ::std::format!($($arg)+))
    };
}

#[macro_export]
macro_rules! precondition_failure {
    () => {
        $crate::precondition_failure(::std::string::String::new)
    };
    ($($arg:tt)+) => {
        $crate::precondition_failure(|| ::std::format!($($arg)+))
    };
}
