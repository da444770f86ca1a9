//! Per-channel dispatch worker.
//!
//! One long-lived task per subscribed channel, independent of connection
//! state: reconnect cycles never restart a worker. The worker drains its
//! mailbox, invokes the channel handler strictly sequentially, and injects a
//! timeout event whenever the channel stays silent for a full window.

use std::sync::{Arc, RwLock};

use tracing::{debug, error};

use crate::config::NotificationTimeout;
use crate::events::{NotificationEvent, NotificationHandler};
use crate::listener::ListenerStats;
use crate::mailbox::{Mailbox, MailboxItem};
use crate::shutdown::Shutdown;

pub(crate) struct DispatchWorker {
    channel: String,
    mailbox: Mailbox,
    handler: Arc<dyn NotificationHandler>,
    notification_timeout: NotificationTimeout,
    shutdown: Arc<Shutdown>,
    stats: Arc<RwLock<ListenerStats>>,
}

impl DispatchWorker {
    pub fn new(
        channel: String,
        mailbox: Mailbox,
        handler: Arc<dyn NotificationHandler>,
        notification_timeout: NotificationTimeout,
        shutdown: Arc<Shutdown>,
        stats: Arc<RwLock<ListenerStats>>,
    ) -> Self {
        Self {
            channel,
            mailbox,
            handler,
            notification_timeout,
            shutdown,
            stats,
        }
    }

    /// Run until shutdown or until the mailbox closes (supervisor gone).
    pub async fn run(mut self) {
        debug!(channel = %self.channel, "Dispatch worker started");

        let shutdown = Arc::clone(&self.shutdown);
        loop {
            // The timeout window restarts after every event, real or
            // synthetic, because each loop iteration opens a fresh wait.
            let item = tokio::select! {
                _ = shutdown.wait() => break,
                item = self.mailbox.recv_timeout(self.notification_timeout) => item,
            };

            match item {
                Some(MailboxItem::Delivered(notification)) => {
                    self.invoke(NotificationEvent::Notification(notification))
                        .await;
                }
                Some(MailboxItem::TimedOut) => {
                    self.stats.write().unwrap().timeouts_emitted += 1;
                    self.invoke(NotificationEvent::Timeout {
                        channel: self.channel.clone(),
                    })
                    .await;
                }
                None => break,
            }
        }

        debug!(channel = %self.channel, "Dispatch worker stopped");
    }

    /// Invoke the handler, isolating any failure to this one invocation.
    async fn invoke(&self, event: NotificationEvent) {
        if let Err(e) = self.handler.handle(event).await {
            self.stats.write().unwrap().handler_errors += 1;
            error!(channel = %self.channel, error = %e, "Notification handler failed");
        }
    }
}
