use serde::{ser::Serializer, Serialize};

use crate::models::PurchaseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Tauri(#[from] tauri::Error),
  #[error(transparent)]
  Store(#[from] tauri_plugin_store::Error),
  #[cfg(mobile)]
  #[error(transparent)]
  PluginInvoke(#[from] tauri::plugin::mobile::PluginInvokeError),
  #[error(transparent)]
  Billing(#[from] PurchaseError),
  #[error("another purchase is already in progress")]
  PurchaseInProgress,
  #[error("store services are not supported on this platform")]
  UnsupportedPlatform,
}

impl Serialize for Error {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.serialize_str(self.to_string().as_ref())
  }
}
