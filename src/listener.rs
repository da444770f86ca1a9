//! Public listener surface: [`NotificationListener`] and its statistics.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::{ListenerConfig, NotificationTimeout};
use crate::connection::ConnectFactory;
use crate::dispatch::DispatchWorker;
use crate::error::{ListenError, Result};
use crate::events::{HandlerMap, ListenPolicy};
use crate::mailbox;
use crate::shutdown::{Shutdown, ShutdownHandle};
use crate::supervisor::Supervisor;

/// Snapshot of listener activity.
#[derive(Debug, Clone, Default)]
pub struct ListenerStats {
    pub connected: bool,
    pub notifications_received: u64,
    pub timeouts_emitted: u64,
    pub handler_errors: u64,
    pub connect_failures: u64,
    pub reconnects: u64,
    pub last_notification_at: Option<SystemTime>,
}

/// Resilient LISTEN/NOTIFY listener.
///
/// Owns one connection supervisor and one dispatch worker per subscribed
/// channel for the duration of a [`run`](NotificationListener::run) call.
/// Transient failures (connect, subscribe, heartbeat, connection loss) are
/// retried forever with capped exponential backoff and never surface to the
/// caller; `run` returns only on shutdown or on invalid configuration.
///
/// Each listener instance supports one `run` call: the shutdown handle is
/// shared between the instance and its run.
pub struct NotificationListener {
    factory: Arc<dyn ConnectFactory>,
    config: ListenerConfig,
    shutdown: Arc<Shutdown>,
    stats: Arc<RwLock<ListenerStats>>,
}

impl NotificationListener {
    /// Create a listener over a connection factory.
    ///
    /// # Errors
    /// Returns [`ListenError::Configuration`] if the configuration is invalid.
    pub fn new<F: ConnectFactory + 'static>(factory: F, config: ListenerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory: Arc::new(factory),
            config,
            shutdown: Arc::new(Shutdown::default()),
            stats: Arc::new(RwLock::new(ListenerStats::default())),
        })
    }

    /// Handle for stopping this listener from another task
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(Arc::clone(&self.shutdown))
    }

    /// Current activity snapshot
    pub fn stats(&self) -> ListenerStats {
        self.stats.read().unwrap().clone()
    }

    /// Listen on every channel in `handlers` until shutdown.
    ///
    /// Spawns the connection supervisor and one dispatch worker per channel,
    /// then waits. Once the shutdown handle fires, every spawned task is
    /// joined within the configured grace period (stragglers are aborted)
    /// before this returns, so no background task outlives the call.
    pub async fn run(
        &self,
        handlers: HandlerMap,
        policy: ListenPolicy,
        notification_timeout: NotificationTimeout,
    ) -> Result<()> {
        notification_timeout.validate()?;
        if handlers.is_empty() {
            return Err(ListenError::configuration(
                "at least one channel handler is required",
            ));
        }

        info!(
            channels = handlers.len(),
            policy = %policy,
            "Starting notification listener"
        );

        let mut senders = HashMap::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(handlers.len() + 1);

        for (channel, handler) in handlers {
            let (sender, mailbox) = mailbox::mailbox(policy);
            senders.insert(channel.clone(), sender);

            let worker = DispatchWorker::new(
                channel,
                mailbox,
                handler,
                notification_timeout,
                Arc::clone(&self.shutdown),
                Arc::clone(&self.stats),
            );
            tasks.push(tokio::spawn(worker.run()));
        }

        let heartbeat_interval = self
            .config
            .effective_heartbeat_interval(notification_timeout);
        let supervisor = Supervisor::new(
            Arc::clone(&self.factory),
            senders,
            self.config.reconnect.clone(),
            heartbeat_interval,
            Arc::clone(&self.shutdown),
            Arc::clone(&self.stats),
        );
        tasks.push(tokio::spawn(supervisor.run()));

        self.shutdown.wait().await;
        info!("Shutdown requested, stopping listener tasks");
        self.join_all(tasks).await;
        info!("Notification listener stopped");
        Ok(())
    }

    /// Join every spawned task within the shutdown grace period, aborting
    /// whatever is still running when it expires.
    async fn join_all(&self, tasks: Vec<JoinHandle<()>>) {
        let deadline = Instant::now() + self.config.shutdown_grace;

        for mut task in tasks {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => {
                    error!(error = %e, "Listener task panicked");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!("Listener task exceeded shutdown grace period, aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }
    }
}
