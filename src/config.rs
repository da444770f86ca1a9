//! # Listener configuration
//!
//! Plain configuration structs with builder-style setters and explicit
//! validation. The backoff formula is configuration, not policy baked into the
//! supervisor: callers tune base delay, cap, multiplier and jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ListenError, Result};

/// Reconnection backoff parameters.
///
/// The delay before the n-th consecutive failed attempt is
/// `min(max_delay, base_delay * multiplier^(n-1))`, optionally stretched by a
/// multiplicative jitter in `[1.0, 1.0 + jitter_factor]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any computed delay
    pub max_delay: Duration,
    /// Exponential growth factor between consecutive failures
    pub multiplier: f64,
    /// Jitter factor (0.0 - 1.0); 0.0 disables jitter
    pub jitter_factor: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300), // 5 minutes
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl ReconnectConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    /// Validate the backoff parameters
    pub fn validate(&self) -> Result<()> {
        if self.base_delay.is_zero() {
            return Err(ListenError::configuration("base_delay must be positive"));
        }
        if self.max_delay < self.base_delay {
            return Err(ListenError::configuration(
                "max_delay must be at least base_delay",
            ));
        }
        if self.multiplier < 1.0 {
            return Err(ListenError::configuration("multiplier must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ListenError::configuration(
                "jitter_factor must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    /// Compute the backoff delay after `failed_attempts` consecutive failures.
    ///
    /// Returns zero when no attempt has failed yet, so a connection lost after
    /// a successful session is retried immediately.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }

        // The cap makes exponents beyond ~32 indistinguishable; clamping keeps
        // the f64 arithmetic finite.
        let exponent = failed_attempts.saturating_sub(1).min(32);
        let delay = self.base_delay.mul_f64(self.multiplier.powi(exponent as i32));

        let jittered = if self.jitter_factor > 0.0 {
            delay.mul_f64(1.0 + fastrand::f64() * self.jitter_factor)
        } else {
            delay
        };

        jittered.min(self.max_delay)
    }
}

/// Cadence of synthetic timeout events per channel.
///
/// `Disabled` switches timeout injection off entirely; handlers then only ever
/// see real notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationTimeout {
    Disabled,
    Interval(Duration),
}

impl NotificationTimeout {
    pub fn validate(&self) -> Result<()> {
        match self {
            NotificationTimeout::Disabled => Ok(()),
            NotificationTimeout::Interval(duration) if duration.is_zero() => Err(
                ListenError::configuration("notification timeout must be positive"),
            ),
            NotificationTimeout::Interval(_) => Ok(()),
        }
    }
}

/// Top-level listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Reconnection backoff parameters
    pub reconnect: ReconnectConfig,
    /// Liveness probe cadence; when unset it is derived from the notification
    /// timeout as `max(1s, timeout / 3)`, or 30s if timeouts are disabled
    pub heartbeat_interval: Option<Duration>,
    /// How long shutdown waits for in-flight handlers before aborting them
    pub shutdown_grace: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            heartbeat_interval: None,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl ListenerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.reconnect.validate()?;

        if let Some(interval) = self.heartbeat_interval {
            if interval.is_zero() {
                return Err(ListenError::configuration(
                    "heartbeat_interval must be positive",
                ));
            }
        }
        if self.shutdown_grace.is_zero() {
            return Err(ListenError::configuration(
                "shutdown_grace must be positive",
            ));
        }

        Ok(())
    }

    /// The heartbeat cadence to use for a given notification timeout
    pub(crate) fn effective_heartbeat_interval(&self, timeout: NotificationTimeout) -> Duration {
        if let Some(interval) = self.heartbeat_interval {
            return interval;
        }
        match timeout {
            NotificationTimeout::Interval(duration) => (duration / 3).max(Duration::from_secs(1)),
            NotificationTimeout::Disabled => Duration::from_secs(30),
        }
    }
}
