//! Connection capability consumed by the supervisor.
//!
//! The listener core never touches the wire protocol; it drives these traits.
//! Production code uses [`PgConnectFactory`], which rides on
//! `sqlx::postgres::PgListener`; tests inject in-memory fakes.

use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::PgPool;
use tracing::debug;

use crate::error::{ListenError, Result};
use crate::events::Notification;

/// An established LISTEN connection.
///
/// Closing is by drop: releasing the value closes the underlying connection,
/// which also unsubscribes every channel.
#[async_trait]
pub trait NotifyConnection: Send {
    /// Subscribe this connection to a channel
    async fn listen(&mut self, channel: &str) -> Result<()>;

    /// Wait for the next notification; an error means the connection is lost
    async fn recv(&mut self) -> Result<Notification>;

    /// Cheap liveness probe, issued only when no traffic has proven the
    /// connection alive recently
    async fn ping(&mut self) -> Result<()>;
}

/// Opens fresh [`NotifyConnection`]s for the supervisor, which reconnects
/// through this factory after any loss.
#[async_trait]
pub trait ConnectFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn NotifyConnection>>;
}

/// Connection factory backed by a `sqlx` Postgres pool.
#[derive(Debug, Clone)]
pub struct PgConnectFactory {
    pool: PgPool,
}

impl PgConnectFactory {
    /// Use an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a lazy pool from a connection URL. No connection is attempted
    /// until the listener first connects.
    pub fn from_url(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_lazy(url)
            .map_err(|e| ListenError::configuration(format!("invalid connection url: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl ConnectFactory for PgConnectFactory {
    async fn connect(&self) -> Result<Box<dyn NotifyConnection>> {
        let listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| ListenError::Connect(e.to_string()))?;
        debug!("Established Postgres LISTEN connection");
        Ok(Box::new(PgNotifyConnection {
            listener,
            pool: self.pool.clone(),
        }))
    }
}

struct PgNotifyConnection {
    listener: PgListener,
    pool: PgPool,
}

#[async_trait]
impl NotifyConnection for PgNotifyConnection {
    async fn listen(&mut self, channel: &str) -> Result<()> {
        self.listener
            .listen(channel)
            .await
            .map_err(|e| ListenError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })
    }

    async fn recv(&mut self) -> Result<Notification> {
        // try_recv reports a dropped connection as Ok(None) instead of
        // reconnecting silently; surfacing it as a loss keeps resubscription
        // under the supervisor's control.
        match self.listener.try_recv().await {
            Ok(Some(notification)) => Ok(Notification::new(
                notification.channel(),
                notification.payload(),
            )),
            Ok(None) => Err(ListenError::ConnectionLost(
                "listener connection dropped".to_string(),
            )),
            Err(e) => Err(ListenError::ConnectionLost(e.to_string())),
        }
    }

    async fn ping(&mut self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| ListenError::Heartbeat(e.to_string()))
    }
}
