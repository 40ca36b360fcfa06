//! Lifecycle notifications broadcast to interested hosts.

use serde::{Deserialize, Serialize};

/// Something the controller did that pages may want to react to, such as
/// offering a reload once a new version takes control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ControllerEvent {
    Installed { version: String },
    InstallFailed { version: String, reason: String },
    Waiting { version: String },
    ControllerChanged { version: String },
    StaleStoreDeleted { name: String },
    CacheCleared { name: String },
}
