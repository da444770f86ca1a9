#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # pg-listen
//!
//! Resilient PostgreSQL LISTEN/NOTIFY listener for tokio applications.
//!
//! ## Overview
//!
//! `pg-listen` maintains exactly one live LISTEN connection, subscribes a
//! fixed set of named channels, and routes every incoming notification to a
//! per-channel handler. When a channel stays silent for a configured window it
//! injects a synthetic timeout event; when no channel has seen traffic
//! recently it probes the connection with a trivial query to detect silent
//! death; and on any failure it reconnects transparently with capped
//! exponential backoff, resubscribing every channel. Shutdown is cooperative:
//! once requested, the supervisor and every dispatch worker are joined before
//! `run` returns, so no background task leaks.
//!
//! ## Delivery policies
//!
//! - [`ListenPolicy::All`]: every notification, in arrival order, exactly once
//!   per connection session.
//! - [`ListenPolicy::Last`]: only the freshest unconsumed notification; bursts
//!   that arrive while a handler is busy coalesce into the newest value.
//!
//! ## Module Organization
//!
//! - [`listener`] - The [`NotificationListener`] surface and run lifecycle
//! - [`events`] - Notification events, delivery policy, handler trait
//! - [`connection`] - Injected connection capability and the sqlx-backed impl
//! - [`config`] - Backoff, heartbeat and shutdown configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use pg_listen::{
//!     handler_fn, HandlerMap, ListenPolicy, ListenerConfig, NotificationListener,
//!     NotificationTimeout, PgConnectFactory,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = PgConnectFactory::from_url("postgres://localhost/app")?;
//! let listener = NotificationListener::new(factory, ListenerConfig::default())?;
//!
//! let mut handlers = HandlerMap::new();
//! handlers.insert(
//!     "orders".to_string(),
//!     handler_fn(|event| async move {
//!         println!("received: {event:?}");
//!         Ok(())
//!     }),
//! );
//!
//! let shutdown = listener.shutdown_handle();
//! tokio::spawn(async move {
//!     tokio::signal::ctrl_c().await.ok();
//!     shutdown.shutdown();
//! });
//!
//! listener
//!     .run(
//!         handlers,
//!         ListenPolicy::All,
//!         NotificationTimeout::Interval(Duration::from_secs(30)),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod listener;

mod dispatch;
mod mailbox;
mod shutdown;
mod supervisor;

pub use config::{ListenerConfig, NotificationTimeout, ReconnectConfig};
pub use connection::{ConnectFactory, NotifyConnection, PgConnectFactory};
pub use error::{ListenError, Result};
pub use events::{
    handler_fn, HandlerMap, ListenPolicy, Notification, NotificationEvent, NotificationHandler,
};
pub use listener::{ListenerStats, NotificationListener};
pub use shutdown::ShutdownHandle;
