//! Notification events, delivery policy and the handler trait.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single server-side NOTIFY event.
///
/// Postgres delivers an empty string when NOTIFY carries no payload, so
/// `payload` is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
}

impl Notification {
    pub fn new<C: Into<String>, P: Into<String>>(channel: C, payload: P) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }
}

/// What a channel handler receives: either a real notification or a synthetic
/// timeout event injected when the channel has been silent too long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A notification delivered by the server
    Notification(Notification),
    /// The channel saw no notification within the configured timeout window
    Timeout { channel: String },
}

impl NotificationEvent {
    /// The channel this event belongs to
    pub fn channel(&self) -> &str {
        match self {
            NotificationEvent::Notification(notification) => &notification.channel,
            NotificationEvent::Timeout { channel } => channel,
        }
    }

    /// Whether this is a synthetic timeout event
    pub fn is_timeout(&self) -> bool {
        matches!(self, NotificationEvent::Timeout { .. })
    }
}

/// Governs how a channel's mailbox buffers notifications for one `run()` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenPolicy {
    /// Deliver every notification, in arrival order
    #[default]
    All,
    /// Deliver only the freshest unconsumed notification; older unconsumed
    /// values are overwritten at enqueue time
    Last,
}

impl fmt::Display for ListenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenPolicy::All => write!(f, "all"),
            ListenPolicy::Last => write!(f, "last"),
        }
    }
}

/// Trait for handling notification events on a subscribed channel.
///
/// Invocations for one channel are strictly sequential. A returned error is
/// logged and isolated: it never stops delivery to this channel or any other.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, event: NotificationEvent) -> anyhow::Result<()>;
}

/// Mapping from channel name to its handler, fixed for the lifetime of `run()`.
pub type HandlerMap = HashMap<String, Arc<dyn NotificationHandler>>;

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> NotificationHandler for FnHandler<F>
where
    F: Fn(NotificationEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: NotificationEvent) -> anyhow::Result<()> {
        (self.0)(event).await
    }
}

/// Adapt an async closure into a [`NotificationHandler`].
///
/// # Examples
///
/// ```rust
/// use pg_listen::events::{handler_fn, HandlerMap};
///
/// let mut handlers = HandlerMap::new();
/// handlers.insert(
///     "orders".to_string(),
///     handler_fn(|event| async move {
///         println!("{event:?}");
///         Ok(())
///     }),
/// );
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn NotificationHandler>
where
    F: Fn(NotificationEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
