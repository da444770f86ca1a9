//! Connection supervisor: owns the connect / subscribe / pump / backoff
//! lifecycle.
//!
//! The supervisor is the only owner of the live connection. Mailboxes and
//! dispatch workers are never torn down on reconnect; the supervisor keeps the
//! senders across connection sessions and simply resumes routing once
//! resubscribed. Connection loss is always transient from here: retries are
//! unbounded, only shutdown ends the loop.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::connection::{ConnectFactory, NotifyConnection};
use crate::error::{ListenError, Result};
use crate::listener::ListenerStats;
use crate::mailbox::MailboxSender;
use crate::shutdown::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Connecting,
    Listening,
}

pub(crate) struct Supervisor {
    factory: Arc<dyn ConnectFactory>,
    senders: HashMap<String, MailboxSender>,
    reconnect: ReconnectConfig,
    heartbeat_interval: Duration,
    shutdown: Arc<Shutdown>,
    stats: Arc<RwLock<ListenerStats>>,
    state: ConnectionState,
}

impl Supervisor {
    pub fn new(
        factory: Arc<dyn ConnectFactory>,
        senders: HashMap<String, MailboxSender>,
        reconnect: ReconnectConfig,
        heartbeat_interval: Duration,
        shutdown: Arc<Shutdown>,
        stats: Arc<RwLock<ListenerStats>>,
    ) -> Self {
        Self {
            factory,
            senders,
            reconnect,
            heartbeat_interval,
            shutdown,
            stats,
            state: ConnectionState::Disconnected,
        }
    }

    /// Run until shutdown. Dropping `self` afterwards closes the mailboxes,
    /// letting idle dispatch workers finish.
    pub async fn run(mut self) {
        let shutdown = Arc::clone(&self.shutdown);
        let mut failed_attempts: u32 = 0;
        let mut sessions: u64 = 0;

        while !shutdown.is_triggered() {
            let connection = tokio::select! {
                _ = shutdown.wait() => break,
                result = self.establish() => match result {
                    Ok(connection) => connection,
                    Err(e) => {
                        failed_attempts += 1;
                        let delay = self.reconnect.delay_for(failed_attempts);
                        warn!(
                            attempt = failed_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Connection attempt failed, backing off"
                        );
                        self.state = ConnectionState::Disconnected;
                        self.stats.write().unwrap().connect_failures += 1;
                        tokio::select! {
                            _ = shutdown.wait() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                        continue;
                    }
                },
            };

            failed_attempts = 0;
            sessions += 1;
            {
                let mut stats = self.stats.write().unwrap();
                stats.connected = true;
                if sessions > 1 {
                    stats.reconnects += 1;
                }
            }
            info!(
                state = ?self.state,
                channels = self.senders.len(),
                "Listening for notifications"
            );

            let loss = self.pump(connection).await;

            self.state = ConnectionState::Disconnected;
            self.stats.write().unwrap().connected = false;

            match loss {
                Some(e) => warn!(error = %e, "Connection lost, reconnecting"),
                // Shutdown requested; the connection was dropped inside pump()
                None => break,
            }
        }

        debug!("Connection supervisor stopped");
    }

    /// Connect and subscribe every channel. A subscribe failure counts as a
    /// failed attempt like any connect failure.
    async fn establish(&mut self) -> Result<Box<dyn NotifyConnection>> {
        self.state = ConnectionState::Connecting;
        debug!(state = ?self.state, "Establishing listener connection");

        let mut connection = self.factory.connect().await?;
        for channel in self.senders.keys() {
            connection.listen(channel).await?;
            debug!(channel = %channel, "Subscribed to channel");
        }

        self.state = ConnectionState::Listening;
        Ok(connection)
    }

    /// Pull notifications and route them into mailboxes until the connection
    /// is lost or shutdown is requested. Returns the loss, or `None` on
    /// shutdown. The connection is dropped (and thereby closed) on exit.
    async fn pump(&mut self, mut connection: Box<dyn NotifyConnection>) -> Option<ListenError> {
        let shutdown = Arc::clone(&self.shutdown);
        loop {
            let received = tokio::select! {
                _ = shutdown.wait() => return None,
                received = tokio::time::timeout(self.heartbeat_interval, connection.recv()) => received,
            };

            match received {
                Ok(Ok(notification)) => {
                    {
                        let mut stats = self.stats.write().unwrap();
                        stats.notifications_received += 1;
                        stats.last_notification_at = Some(SystemTime::now());
                    }
                    match self.senders.get(&notification.channel) {
                        Some(sender) => {
                            debug!(
                                channel = %notification.channel,
                                "Routing notification to channel mailbox"
                            );
                            sender.send(notification);
                        }
                        None => debug!(
                            channel = %notification.channel,
                            "Ignoring notification for unsubscribed channel"
                        ),
                    }
                }
                Ok(Err(e)) => return Some(e),
                Err(_) => {
                    // A full heartbeat interval passed with no traffic on any
                    // channel, so nothing has proven the connection alive.
                    debug!("No traffic observed, issuing liveness probe");
                    if let Err(e) = connection.ping().await {
                        return Some(e);
                    }
                }
            }
        }
    }
}
