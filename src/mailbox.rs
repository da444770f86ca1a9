//! Per-channel notification mailboxes.
//!
//! One mailbox per subscribed channel, with exactly one sender (owned by the
//! connection supervisor) and one receiver (owned by the channel's dispatch
//! worker). The sender side is synchronous and O(1) so it can run inside the
//! supervisor's routing loop without ever blocking notification delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, Notify};

use crate::config::NotificationTimeout;
use crate::events::{ListenPolicy, Notification};

/// What a dispatch worker pulls from its mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MailboxItem {
    /// A buffered notification
    Delivered(Notification),
    /// No notification arrived within the timeout window
    TimedOut,
}

/// Create a sender/receiver pair for one channel under the given policy.
pub(crate) fn mailbox(policy: ListenPolicy) -> (MailboxSender, Mailbox) {
    match policy {
        ListenPolicy::All => {
            let (tx, rx) = mpsc::unbounded_channel();
            (MailboxSender::All(tx), Mailbox::All(rx))
        }
        ListenPolicy::Last => {
            let slot = Arc::new(Slot::default());
            (
                MailboxSender::Last(SlotSender {
                    slot: Arc::clone(&slot),
                }),
                Mailbox::Last(slot),
            )
        }
    }
}

/// Single-slot cell backing the LAST policy.
#[derive(Debug, Default)]
struct Slot {
    value: Mutex<Option<Notification>>,
    notify: Notify,
    closed: AtomicBool,
}

#[derive(Debug)]
pub(crate) struct SlotSender {
    slot: Arc<Slot>,
}

impl Drop for SlotSender {
    fn drop(&mut self) {
        self.slot.closed.store(true, Ordering::Release);
        self.slot.notify.notify_waiters();
    }
}

/// Write half of a mailbox. Not cloneable: one writer per channel.
#[derive(Debug)]
pub(crate) enum MailboxSender {
    All(mpsc::UnboundedSender<Notification>),
    Last(SlotSender),
}

impl MailboxSender {
    /// Enqueue a notification. Never blocks; under LAST the previous
    /// unconsumed value is silently overwritten.
    pub fn send(&self, notification: Notification) {
        match self {
            MailboxSender::All(tx) => {
                // The worker only drops its receiver on shutdown
                let _ = tx.send(notification);
            }
            MailboxSender::Last(sender) => {
                *sender.slot.value.lock().unwrap() = Some(notification);
                sender.slot.notify.notify_one();
            }
        }
    }
}

/// Read half of a mailbox, drained by exactly one dispatch worker.
#[derive(Debug)]
pub(crate) enum Mailbox {
    All(mpsc::UnboundedReceiver<Notification>),
    Last(Arc<Slot>),
}

impl Mailbox {
    /// Wait for the next notification. Returns `None` once the sender is gone
    /// and no value remains.
    pub async fn recv(&mut self) -> Option<Notification> {
        match self {
            Mailbox::All(rx) => rx.recv().await,
            Mailbox::Last(slot) => loop {
                let notified = slot.notify.notified();
                if let Some(notification) = slot.value.lock().unwrap().take() {
                    return Some(notification);
                }
                if slot.closed.load(Ordering::Acquire) {
                    return None;
                }
                notified.await;
            },
        }
    }

    /// Wait for the next notification or a timeout indication.
    ///
    /// A pending notification always wins over the timeout, so timeout events
    /// are never coalesced with buffered values. `None` means the sender side
    /// is gone and the worker should stop.
    pub async fn recv_timeout(&mut self, timeout: NotificationTimeout) -> Option<MailboxItem> {
        match timeout {
            NotificationTimeout::Disabled => self.recv().await.map(MailboxItem::Delivered),
            NotificationTimeout::Interval(duration) => {
                match tokio::time::timeout(duration, self.recv()).await {
                    Ok(Some(notification)) => Some(MailboxItem::Delivered(notification)),
                    Ok(None) => None,
                    Err(_) => Some(MailboxItem::TimedOut),
                }
            }
        }
    }
}
