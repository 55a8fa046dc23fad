use serde::Deserialize;
use std::time::Duration;

/// Tunables for the protocol. Defaults match the spec's defaults
/// (`request_window` = 20, 1s resend/retry intervals). No CLI surface;
/// the only way in is [`Settings::default`] or [`Settings::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub request_window: u64,
    pub resend_first_interval_ms: u64,
    pub retry_interval_ms: u64,
    pub durable_load_timeout_ms: u64,
    pub durable_store_timeout_ms: u64,
    pub durable_max_attempts: u32,
    pub sharding_buffer_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_window: 20,
            resend_first_interval_ms: 1_000,
            retry_interval_ms: 1_000,
            durable_load_timeout_ms: 3_000,
            durable_store_timeout_ms: 3_000,
            durable_max_attempts: 10,
            sharding_buffer_size: 1_000,
        }
    }
}

impl Settings {
    /// Loads overrides from `RELIABLE_DELIVERY_*` environment variables
    /// over [`Settings::default`], following the env-prefixed,
    /// `Default`-backed config pattern used elsewhere in this
    /// workspace's service configs.
    pub fn from_env() -> anyhow::Result<Self> {
        let overrides: PartialSettings = envy::prefixed("RELIABLE_DELIVERY_").from_env()?;
        Ok(overrides.apply(Self::default()))
    }

    pub fn resend_first_interval(&self) -> Duration {
        Duration::from_millis(self.resend_first_interval_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn durable_load_timeout(&self) -> Duration {
        Duration::from_millis(self.durable_load_timeout_ms)
    }

    pub fn durable_store_timeout(&self) -> Duration {
        Duration::from_millis(self.durable_store_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Default)]
struct PartialSettings {
    request_window: Option<u64>,
    resend_first_interval_ms: Option<u64>,
    retry_interval_ms: Option<u64>,
    durable_load_timeout_ms: Option<u64>,
    durable_store_timeout_ms: Option<u64>,
    durable_max_attempts: Option<u32>,
    sharding_buffer_size: Option<usize>,
}

impl PartialSettings {
    fn apply(self, defaults: Settings) -> Settings {
        Settings {
            request_window: self.request_window.unwrap_or(defaults.request_window),
            resend_first_interval_ms: self
                .resend_first_interval_ms
                .unwrap_or(defaults.resend_first_interval_ms),
            retry_interval_ms: self.retry_interval_ms.unwrap_or(defaults.retry_interval_ms),
            durable_load_timeout_ms: self
                .durable_load_timeout_ms
                .unwrap_or(defaults.durable_load_timeout_ms),
            durable_store_timeout_ms: self
                .durable_store_timeout_ms
                .unwrap_or(defaults.durable_store_timeout_ms),
            durable_max_attempts: self.durable_max_attempts.unwrap_or(defaults.durable_max_attempts),
            sharding_buffer_size: self.sharding_buffer_size.unwrap_or(defaults.sharding_buffer_size),
        }
    }
}
