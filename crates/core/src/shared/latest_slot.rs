use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

/// Creates a single-slot handoff where a new item replaces one still waiting.
///
/// Memory stays bounded at one pending item and the consumer always sees the
/// freshest value. Items are still received in the order they were published.
pub fn latest_slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let evicted = Arc::new(AtomicUsize::new(0));
    let open = Arc::new(AtomicBool::new(true));
    (
        SlotSender {
            tx,
            drain: rx.clone(),
            evicted: evicted.clone(),
            open: open.clone(),
        },
        SlotReceiver { rx, evicted, open },
    )
}

pub struct SlotSender<T> {
    tx: Sender<T>,
    // Lets the producer discard a stale item without the consumer's help.
    drain: Receiver<T>,
    evicted: Arc<AtomicUsize>,
    open: Arc<AtomicBool>,
}

impl<T> SlotSender<T> {
    /// Places `item` in the slot, evicting any item the consumer has not taken.
    ///
    /// Returns `false` once the receiver is gone.
    pub fn publish(&self, item: T) -> bool {
        let mut item = item;
        loop {
            if !self.open.load(Ordering::Acquire) {
                return false;
            }
            match self.tx.try_send(item) {
                Ok(()) => return true,
                Err(TrySendError::Full(back)) => {
                    if self.drain.try_recv().is_ok() {
                        self.evicted.fetch_add(1, Ordering::Relaxed);
                    }
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
    }

    pub fn evicted(&self) -> usize {
        self.evicted.load(Ordering::Relaxed)
    }
}

pub struct SlotReceiver<T> {
    rx: Receiver<T>,
    evicted: Arc<AtomicUsize>,
    open: Arc<AtomicBool>,
}

impl<T> SlotReceiver<T> {
    /// Blocks until an item arrives. `None` once the sender is gone and the
    /// slot is empty.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Items replaced before the consumer took them.
    pub fn evicted(&self) -> usize {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Shared eviction counter, readable after the receiver is moved away.
    pub fn eviction_counter(&self) -> Arc<AtomicUsize> {
        self.evicted.clone()
    }
}

impl<T> Drop for SlotReceiver<T> {
    fn drop(&mut self) {
        self.open.store(false, Ordering::Release);
    }
}
