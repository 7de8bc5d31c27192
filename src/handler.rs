use std::thread;

use tracing::error;

use crate::termination::Termination;

/// Behavior installed in a slot.
///
/// Termination points promise never to return, so a handler must either end the
/// process or stop the calling thread for good.
pub trait Handler: Send + Sync {
    fn terminate(&self, termination: Termination) -> !;
}

/// The production behavior: report the diagnostic and abort the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostAbort;

impl Handler for HostAbort {
    fn terminate(&self, termination: Termination) -> ! {
        error!(
            kind = %termination.kind,
            location = %termination.location,
            "{}",
            termination.message
        );
        eprintln!("{}", termination);
        std::process::abort()
    }
}

/// Stops forward progress of the calling thread for good.
///
/// The thread is parked, it neither unwinds nor runs destructors, so code that catches
/// panics around a termination point cannot continue past it. The parked thread stays
/// alive until the process exits.
pub fn halt_current_thread() -> ! {
    loop {
        // park may return spuriously
        thread::park();
    }
}

/// Best effort rendering of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| payload.downcast_ref::<&'static str>().copied())
        .unwrap_or("panic occurred")
}
