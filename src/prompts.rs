//! Throttled review and in-app update prompts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tauri::Runtime;
use tokio::sync::Mutex;

use crate::models::{AppUpdateInfo, InstallStatus, UpdateAvailability, UpdateKind};
use crate::platform::{RawUpdateInfo, StoreBridge};
use crate::Result;

pub const REVIEW_PROMPT_KEY: &str = "lastReviewPrompt";
pub const UPDATE_PROMPT_KEY: &str = "lastUpdatePrompt";

/// Persists one "last prompted" timestamp per key.
pub trait TimestampStore: Send + Sync {
    fn last_prompted(&self, key: &str) -> Result<Option<DateTime<Utc>>>;

    fn set_last_prompted(&self, key: &str, at: DateTime<Utc>) -> Result<()>;
}

impl<R: Runtime> TimestampStore for tauri_plugin_store::Store<R> {
    fn last_prompted(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .get(key)
            .and_then(|value| value.as_i64())
            .and_then(DateTime::from_timestamp_millis))
    }

    fn set_last_prompted(&self, key: &str, at: DateTime<Utc>) -> Result<()> {
        self.set(key, at.timestamp_millis());
        self.save()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PromptThrottle {
    key: &'static str,
    interval: chrono::Duration,
}

impl PromptThrottle {
    pub fn new(key: &'static str, interval: chrono::Duration) -> Self {
        Self { key, interval }
    }

    pub fn is_due(&self, store: &dyn TimestampStore, now: DateTime<Utc>) -> Result<bool> {
        Ok(match store.last_prompted(self.key)? {
            None => true,
            // A timestamp from the future means the clock moved backwards.
            Some(last) if last > now => true,
            Some(last) => now - last >= self.interval,
        })
    }

    pub fn record(&self, store: &dyn TimestampStore, now: DateTime<Utc>) -> Result<()> {
        store.set_last_prompted(self.key, now)
    }
}

pub struct ReviewPrompter {
    throttle: PromptThrottle,
    delay: Duration,
    /// Held from the throttle check until the timestamp is recorded.
    in_flight: Mutex<()>,
}

impl ReviewPrompter {
    pub fn new(interval: chrono::Duration, delay: Duration) -> Self {
        Self {
            throttle: PromptThrottle::new(REVIEW_PROMPT_KEY, interval),
            delay,
            in_flight: Mutex::new(()),
        }
    }

    /// Ask the store for its rating sheet unless one was requested within the
    /// interval. The platform decides whether the sheet is actually shown.
    pub async fn request<S>(&self, bridge: &S, store: &dyn TimestampStore) -> Result<bool>
    where
        S: StoreBridge + ?Sized,
    {
        let _guard = self.in_flight.lock().await;
        if !self.throttle.is_due(store, Utc::now())? {
            log::debug!("review requested too recently, skipping");
            return Ok(false);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        bridge.request_review().await?;
        self.throttle.record(store, Utc::now())?;
        log::info!("review flow requested");
        Ok(true)
    }
}

impl From<RawUpdateInfo> for AppUpdateInfo {
    fn from(raw: RawUpdateInfo) -> Self {
        AppUpdateInfo {
            availability: UpdateAvailability::from_code(raw.update_availability),
            available_version_code: raw.available_version_code,
            staleness_days: raw.client_version_staleness_days,
            priority: raw.update_priority,
            immediate_allowed: raw.immediate_allowed,
            flexible_allowed: raw.flexible_allowed,
            install_status: InstallStatus::from_code(raw.install_status),
        }
    }
}

pub struct UpdatePrompter {
    throttle: PromptThrottle,
    urgent_priority: i32,
    in_flight: Mutex<()>,
}

impl UpdatePrompter {
    pub fn new(interval: chrono::Duration, urgent_priority: i32) -> Self {
        Self {
            throttle: PromptThrottle::new(UPDATE_PROMPT_KEY, interval),
            urgent_priority,
            in_flight: Mutex::new(()),
        }
    }

    pub async fn check<S>(&self, bridge: &S) -> Result<AppUpdateInfo>
    where
        S: StoreBridge + ?Sized,
    {
        Ok(bridge.app_update_info().await?.into())
    }

    /// Start the native update flow when an update of the requested kind is
    /// available and the user was not prompted within the interval. Urgent
    /// updates ignore the interval.
    pub async fn prompt<S>(
        &self,
        bridge: &S,
        store: &dyn TimestampStore,
        kind: UpdateKind,
    ) -> Result<bool>
    where
        S: StoreBridge + ?Sized,
    {
        let _guard = self.in_flight.lock().await;
        let info = self.check(bridge).await?;
        if !info.is_available() {
            log::debug!("no update available ({:?})", info.availability);
            return Ok(false);
        }
        if !info.allows(kind) {
            log::debug!("{kind:?} update flow not allowed for this update");
            return Ok(false);
        }

        let urgent = info.priority >= self.urgent_priority;
        if !urgent && !self.throttle.is_due(store, Utc::now())? {
            log::debug!("update prompt shown too recently, skipping");
            return Ok(false);
        }

        bridge.start_update(kind).await?;
        self.throttle.record(store, Utc::now())?;
        log::info!(
            "started {kind:?} update flow to version {:?}",
            info.available_version_code
        );
        Ok(true)
    }

    pub async fn complete<S>(&self, bridge: &S) -> Result<()>
    where
        S: StoreBridge + ?Sized,
    {
        bridge.complete_update().await
    }
}
