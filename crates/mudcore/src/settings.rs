//! Settings file support.
//!
//! Everything a game tunes at startup lives in one JSON document:
//!
//! ```json
//! {
//!   "multisession_mode": 1,
//!   "max_nr_simultaneous_puppets": 1,
//!   "auto_puppet": true,
//!   "idle_timeout_secs": 3600,
//!   "permission_hierarchy": ["Guest", "Player", "Helper", "Builder", "Admin", "Developer"],
//!   "lock_func_modules": ["mudcore.lockfuncs", "game.lockfuncs"],
//!   "superuser": 1
//! }
//! ```
//!
//! Missing keys take their defaults.

use std::path::Path;
use std::time::Duration;

use mudcore_lock::{BUILTIN_MODULE, PermissionHierarchy};
use mudcore_protocol::EntityId;
use mudcore_session::{MultisessionMode, RouterConfig};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Startup settings for a [`Core`](crate::Core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSettings {
    /// 0 to 3, see [`MultisessionMode`].
    pub multisession_mode: u8,
    pub max_nr_simultaneous_puppets: usize,
    pub auto_puppet: bool,
    /// Idle disconnect after this many seconds. `None` or 0 disables it.
    pub idle_timeout_secs: Option<u64>,
    pub permission_hierarchy: PermissionHierarchy,
    /// Lock function modules in registration order; later modules
    /// override earlier ones.
    pub lock_func_modules: Vec<String>,
    /// Entity id that bypasses every lock unless quelling.
    pub superuser: Option<EntityId>,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            multisession_mode: 0,
            max_nr_simultaneous_puppets: 1,
            auto_puppet: true,
            idle_timeout_secs: None,
            permission_hierarchy: PermissionHierarchy::default(),
            lock_func_modules: vec![BUILTIN_MODULE.to_string()],
            superuser: None,
        }
    }
}

impl CoreSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&json)?;
        tracing::info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// The router part of the settings.
    pub fn router_config(&self) -> Result<RouterConfig, ConfigError> {
        let multisession_mode = MultisessionMode::from_level(self.multisession_mode)
            .ok_or(ConfigError::InvalidMode(self.multisession_mode))?;
        Ok(RouterConfig {
            multisession_mode,
            max_puppets: self.max_nr_simultaneous_puppets,
            auto_puppet: self.auto_puppet,
            idle_timeout: self
                .idle_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_str_missing_keys_take_defaults() {
        let settings = CoreSettings::from_json_str(r#"{"multisession_mode": 2}"#).unwrap();
        assert_eq!(settings.multisession_mode, 2);
        assert_eq!(settings.lock_func_modules, vec![BUILTIN_MODULE.to_string()]);
        assert!(settings.auto_puppet);
    }

    #[test]
    fn test_from_json_str_full_document() {
        let settings = CoreSettings::from_json_str(
            r#"{
                "multisession_mode": 3,
                "max_nr_simultaneous_puppets": 4,
                "auto_puppet": false,
                "idle_timeout_secs": 600,
                "permission_hierarchy": ["Guest", "Member", "Staff"],
                "lock_func_modules": ["mudcore.lockfuncs", "game.lockfuncs"],
                "superuser": 1
            }"#,
        )
        .unwrap();
        assert_eq!(settings.superuser, Some(EntityId(1)));
        assert_eq!(settings.permission_hierarchy.index_of("staff"), Some(2));

        let config = settings.router_config().unwrap();
        assert_eq!(config.multisession_mode, MultisessionMode::CoPuppet);
        assert_eq!(config.max_puppets, 4);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_router_config_rejects_unknown_mode() {
        let settings = CoreSettings {
            multisession_mode: 9,
            ..CoreSettings::default()
        };
        assert!(matches!(settings.router_config(), Err(ConfigError::InvalidMode(9))));
    }

    #[test]
    fn test_router_config_zero_idle_timeout_disables() {
        let settings = CoreSettings {
            idle_timeout_secs: Some(0),
            ..CoreSettings::default()
        };
        assert_eq!(settings.router_config().unwrap().idle_timeout, None);
    }

    #[test]
    fn test_from_json_file_reports_path() {
        let err = CoreSettings::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_from_json_str_rejects_bad_types() {
        assert!(matches!(
            CoreSettings::from_json_str(r#"{"auto_puppet": "yes"}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
