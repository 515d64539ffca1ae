use std::time::Duration;

use serde::Deserialize;

/// Plugin configuration, read from `plugins > store-services` in
/// `tauri.conf.json`. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// How long a purchase flow may stay open before it is abandoned.
    pub purchase_timeout_secs: u64,
    /// Pause before the review sheet is requested.
    pub review_delay_ms: u64,
    pub review_interval_hours: i64,
    pub update_prompt_interval_days: i64,
    /// Updates at or above this Play priority skip the prompt interval.
    pub urgent_update_priority: i32,
    /// File name of the `tauri-plugin-store` store holding prompt timestamps.
    pub store_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            purchase_timeout_secs: 600,
            review_delay_ms: 2_000,
            review_interval_hours: 24,
            update_prompt_interval_days: 31,
            urgent_update_priority: 4,
            store_path: "store-services.json".to_string(),
        }
    }
}

impl Config {
    pub fn purchase_timeout(&self) -> Duration {
        Duration::from_secs(self.purchase_timeout_secs)
    }

    pub fn review_delay(&self) -> Duration {
        Duration::from_millis(self.review_delay_ms)
    }

    pub fn review_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.review_interval_hours)
    }

    pub fn update_prompt_interval(&self) -> chrono::Duration {
        chrono::Duration::days(self.update_prompt_interval_days)
    }
}
