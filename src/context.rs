use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::handler::{Handler, HostAbort};
use crate::termination::{SourceLocation, Termination, TerminationKind};

static GLOBAL: OnceCell<TerminationContext> = OnceCell::new();

struct Slots {
    default: Arc<dyn Handler>,
    handlers: [RwLock<Arc<dyn Handler>>; 3],
}

/// A set of handler slots, one per [`TerminationKind`].
///
/// Cloning is cheap and yields a handle to the same slots. The free functions and macros
/// of this crate use [`TerminationContext::global`]; code that wants isolated slots, for
/// example tests running in parallel, creates its own context and calls the termination
/// points on it.
#[derive(Clone)]
pub struct TerminationContext {
    slots: Arc<Slots>,
}

impl TerminationContext {
    pub fn new() -> Self {
        Self::with_default(Arc::new(HostAbort))
    }

    /// A context whose slots fall back to `default` instead of aborting the process.
    pub fn with_default(default: Arc<dyn Handler>) -> Self {
        let handlers = [
            RwLock::new(default.clone()),
            RwLock::new(default.clone()),
            RwLock::new(default.clone()),
        ];
        Self {
            slots: Arc::new(Slots { default, handlers }),
        }
    }

    /// The process-wide context, created on first use.
    pub fn global() -> &'static TerminationContext {
        GLOBAL.get_or_init(TerminationContext::new)
    }

    //##################################################################################################################
    // Slot management

    pub fn handler(&self, kind: TerminationKind) -> Arc<dyn Handler> {
        self.slots.handlers[kind.slot()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the handler of `kind`. The previous handler is not kept anywhere.
    pub fn set_handler(&self, kind: TerminationKind, handler: Arc<dyn Handler>) {
        debug!(%kind, "installing handler");
        *self.slots.handlers[kind.slot()]
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    pub fn restore_default(&self, kind: TerminationKind) {
        debug!(%kind, "restoring default handler");
        *self.slots.handlers[kind.slot()]
            .write()
            .unwrap_or_else(PoisonError::into_inner) = self.slots.default.clone();
    }

    pub fn is_default(&self, kind: TerminationKind) -> bool {
        Arc::ptr_eq(&self.handler(kind), &self.slots.default)
    }

    /// Installs `handler` until the returned guard is dropped.
    #[must_use = "the default handler is restored as soon as the guard is dropped"]
    pub fn install(&self, kind: TerminationKind, handler: Arc<dyn Handler>) -> HandlerGuard {
        self.set_handler(kind, handler);
        HandlerGuard {
            context: self.clone(),
            kind,
        }
    }

    //##################################################################################################################
    // Termination points

    /// Ends forward progress unconditionally.
    #[track_caller]
    pub fn fatal_error<M>(&self, message: M) -> !
    where
        M: FnOnce() -> String,
    {
        self.terminate(
            TerminationKind::FatalError,
            message,
            None,
            SourceLocation::caller(),
        )
    }

    /// Returns if `condition` holds, ends forward progress otherwise.
    ///
    /// `message` is only evaluated when the condition is false.
    #[track_caller]
    pub fn precondition<C, M>(&self, condition: C, message: M)
    where
        C: FnOnce() -> bool,
        M: FnOnce() -> String,
    {
        if !condition() {
            self.terminate(
                TerminationKind::Precondition,
                message,
                Some(false),
                SourceLocation::caller(),
            )
        }
    }

    /// Marks a state that must never be reached.
    #[track_caller]
    pub fn precondition_failure<M>(&self, message: M) -> !
    where
        M: FnOnce() -> String,
    {
        self.terminate(
            TerminationKind::PreconditionFailure,
            message,
            None,
            SourceLocation::caller(),
        )
    }

    fn terminate<M>(
        &self,
        kind: TerminationKind,
        message: M,
        condition: Option<bool>,
        location: SourceLocation,
    ) -> !
    where
        M: FnOnce() -> String,
    {
        // Clone out of the lock, the handler never returns
        let handler = self.handler(kind);
        trace!(%kind, %location, "termination point reached");
        handler.terminate(Termination {
            kind,
            message: message(),
            condition,
            location,
        })
    }
}

impl Default for TerminationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TerminationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("TerminationContext");
        for kind in TerminationKind::ALL {
            let state = if self.is_default(kind) {
                "default"
            } else {
                "overridden"
            };
            debug.field(kind.as_ref(), &state);
        }
        debug.finish()
    }
}

/// Restores the default handler of one slot when dropped.
pub struct HandlerGuard {
    context: TerminationContext,
    kind: TerminationKind,
}

impl HandlerGuard {
    pub fn kind(&self) -> TerminationKind {
        self.kind
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        self.context.restore_default(self.kind);
    }
}

#[cfg(test)]
mod test {
    use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use test_case::test_case;

    use super::*;

    /// Remembers what it saw, then unwinds so the test thread can look at it.
    #[derive(Default)]
    struct Recording(Mutex<Vec<Termination>>);

    impl Handler for Recording {
        fn terminate(&self, termination: Termination) -> ! {
            self.0.lock().unwrap().push(termination);
            resume_unwind(Box::new(()))
        }
    }

    fn recording_context() -> (TerminationContext, Arc<Recording>) {
        let recording = Arc::new(Recording::default());
        let context = TerminationContext::with_default(recording.clone());
        (context, recording)
    }

    #[test]
    fn test_new_context_is_default() {
        let context = TerminationContext::new();
        for kind in TerminationKind::ALL {
            assert!(context.is_default(kind));
        }
    }

    #[test_case(TerminationKind::FatalError)]
    #[test_case(TerminationKind::Precondition)]
    #[test_case(TerminationKind::PreconditionFailure)]
    fn test_install_then_restore_twice(kind: TerminationKind) {
        let context = TerminationContext::new();
        let (_, recording) = recording_context();

        for _ in 0..2 {
            let guard = context.install(kind, recording.clone());
            assert_eq!(guard.kind(), kind);
            assert!(!context.is_default(kind));
            TerminationKind::ALL
                .iter()
                .filter(|other| **other != kind)
                .for_each(|other| assert!(context.is_default(*other)));
            drop(guard);
            assert!(context.is_default(kind));
        }
    }

    #[test]
    fn test_set_handler_does_not_stack() {
        let context = TerminationContext::new();
        let (_, first) = recording_context();
        let (_, second) = recording_context();

        context.set_handler(TerminationKind::FatalError, first);
        context.set_handler(TerminationKind::FatalError, second);
        context.restore_default(TerminationKind::FatalError);
        assert!(context.is_default(TerminationKind::FatalError));
    }

    #[test]
    fn test_clones_share_slots() {
        let context = TerminationContext::new();
        let (_, recording) = recording_context();
        let _guard = context.install(TerminationKind::Precondition, recording);
        assert!(!context.clone().is_default(TerminationKind::Precondition));
    }

    #[test]
    fn test_precondition_true_is_silent() {
        let (context, recording) = recording_context();
        let evaluated = AtomicUsize::new(0);

        context.precondition(
            || true,
            || {
                evaluated.fetch_add(1, Ordering::SeqCst);
                "never".to_string()
            },
        );

        assert_eq!(evaluated.load(Ordering::SeqCst), 0);
        assert!(recording.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_precondition_false_reaches_handler() {
        let (context, recording) = recording_context();

        let line = line!() + 2;
        let result = catch_unwind(AssertUnwindSafe(|| {
            context.precondition(|| 1 + 1 == 3, || format!("bad sum {}", 3))
        }));
        assert!(result.is_err());

        let seen = recording.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, TerminationKind::Precondition);
        assert_eq!(seen[0].condition, Some(false));
        assert_eq!(seen[0].message, "bad sum 3");
        assert_eq!(seen[0].location.file, file!());
        assert_eq!(seen[0].location.line, line);
    }

    #[test]
    fn test_points_use_their_own_slot() {
        let context = TerminationContext::new();
        let (_, fatal) = recording_context();
        let (_, unreachable) = recording_context();
        let _fatal = context.install(TerminationKind::FatalError, fatal.clone());
        let _unreachable =
            context.install(TerminationKind::PreconditionFailure, unreachable.clone());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            context.precondition_failure(|| "unreachable".to_string())
        }));
        let _ = catch_unwind(AssertUnwindSafe(|| context.fatal_error(|| "fatal".to_string())));

        let fatal = fatal.0.lock().unwrap();
        let unreachable = unreachable.0.lock().unwrap();
        assert_eq!(fatal.len(), 1);
        assert_eq!(fatal[0].kind, TerminationKind::FatalError);
        assert_eq!(fatal[0].condition, None);
        assert_eq!(unreachable.len(), 1);
        assert_eq!(unreachable[0].kind, TerminationKind::PreconditionFailure);
        assert_eq!(unreachable[0].message, "unreachable");
    }

    #[test]
    fn test_debug_lists_slots() {
        let context = TerminationContext::new();
        let (_, recording) = recording_context();
        let _guard = context.install(TerminationKind::FatalError, recording);
        let rendered = format!("{:?}", context);
        assert!(rendered.contains("fatal-error: \"overridden\""));
        assert!(rendered.contains("precondition: \"default\""));
    }
}
