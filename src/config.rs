//! Configuration types for rtlgen-client

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Main configuration for the generation client and task monitor
///
/// Works out of the box against a local backend; every field has a sensible
/// default and can be overridden individually when deserialized from
/// JSON/TOML.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the generation backend (default: "http://127.0.0.1:8000")
    ///
    /// All REST paths (`/upload`, `/generate`, `/status/{id}`, ...) are
    /// resolved relative to this.
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// Interval between status/progress polls (default: 1.5s)
    #[serde(default = "default_status_poll_interval")]
    pub status_poll_interval: Duration,

    /// Interval between log polls (default: 2.0s)
    #[serde(default = "default_log_poll_interval")]
    pub log_poll_interval: Duration,

    /// Timeout applied to every individual HTTP request (default: 30s)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Consecutive poll failures in one loop before a degraded-connectivity
    /// warning is logged (default: 5)
    ///
    /// Individual failures are expected to self-heal on the next tick and
    /// are logged at debug level only.
    #[serde(default = "default_degraded_threshold")]
    pub degraded_threshold: u32,

    /// Stop polling once the task reaches a terminal status (default: false)
    ///
    /// The default keeps the caller-driven lifecycle: the monitor polls
    /// until explicitly stopped, even after the backend reports
    /// `completed` or `failed`.
    #[serde(default)]
    pub auto_stop_on_terminal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            status_poll_interval: default_status_poll_interval(),
            log_poll_interval: default_log_poll_interval(),
            request_timeout: default_request_timeout(),
            degraded_threshold: default_degraded_threshold(),
            auto_stop_on_terminal: false,
        }
    }
}

#[allow(clippy::expect_used)]
fn default_base_url() -> Url {
    // Hard-coded literal, parse cannot fail
    Url::parse("http://127.0.0.1:8000").expect("default base URL is valid")
}

fn default_status_poll_interval() -> Duration {
    Duration::from_millis(1500)
}

fn default_log_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_degraded_threshold() -> u32 {
    5
}
