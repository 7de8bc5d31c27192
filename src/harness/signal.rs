use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Outcome of [`CompletionSignal::satisfy`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Someone satisfied the signal before
    AlreadySatisfied,
    /// The waiter is gone, it either timed out or was dropped
    Expired,
}

/// Sending half of a single-use signal, it can be satisfied at most once.
pub struct CompletionSignal<T> {
    sender: Mutex<Option<SyncSender<T>>>,
}

/// Receiving half of a single-use signal.
pub struct CompletionWaiter<T> {
    receiver: Receiver<T>,
}

pub fn completion_signal<T>() -> (CompletionSignal<T>, CompletionWaiter<T>) {
    // One slot, so satisfying never blocks
    let (sender, receiver) = sync_channel(1);
    (
        CompletionSignal {
            sender: Mutex::new(Some(sender)),
        },
        CompletionWaiter { receiver },
    )
}

impl<T> CompletionSignal<T> {
    pub fn satisfy(&self, value: T) -> Delivery {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            None => Delivery::AlreadySatisfied,
            Some(sender) => match sender.try_send(value) {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Expired,
            },
        }
    }
}

impl<T> CompletionWaiter<T> {
    /// Blocks until the signal is satisfied or `timeout` elapsed.
    ///
    /// The waiter is consumed, so a signal satisfied afterwards reports [`Delivery::Expired`].
    pub fn wait(self, timeout: Duration) -> Option<T> {
        self.receiver.recv_timeout(timeout).ok()
    }
}
