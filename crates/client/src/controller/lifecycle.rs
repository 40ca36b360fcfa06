//! Controller lifecycle states.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where a controller is in its install/activate lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Constructed, nothing run yet.
    Parsed,
    /// Fetching and storing the critical assets.
    Installing,
    /// Every critical asset is stored.
    Installed,
    /// Installed while another version still governs the scope.
    Waiting,
    /// Deleting stale stores and claiming the scope.
    Activating,
    /// Routing fetches.
    Active,
    /// Install failed; this controller never takes over.
    Redundant,
}

impl LifecycleState {
    /// Only an active controller routes fetches.
    pub fn can_intercept_fetch(self) -> bool {
        matches!(self, LifecycleState::Active)
    }

    /// States from which `install` may run.
    pub fn can_install(self) -> bool {
        matches!(self, LifecycleState::Parsed | LifecycleState::Redundant)
    }

    /// States from which `activate` may run.
    pub fn can_activate(self) -> bool {
        matches!(self, LifecycleState::Installed | LifecycleState::Waiting)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Waiting => "waiting",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}
