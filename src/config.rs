//! Configuration for ledgermesh
//!
//! CLI arguments and environment variable handling using clap, plus the
//! optional JSON connection profile operators ship alongside a deployment.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Channel carrying the shard registry.
pub const CONTROL_CHANNEL: &str = "mainline";
/// Contract id of the shard registry on the control channel.
pub const REGISTRY_CONTRACT: &str = "catalyst";
/// Contract id of the model ledger on each shard channel.
pub const MODEL_CONTRACT: &str = "models";

/// Default registrar principal.
pub const ADMIN_USER_ID: &str = "admin";
/// Default registrar enrollment secret.
pub const ADMIN_USER_SECRET: &str = "adminpw";
/// Default application principal.
pub const APP_USER_ID: &str = "appUser";
/// Default affiliation for registered application principals.
pub const USER_AFFILIATION: &str = "org1.department1";
/// Default membership service provider id stamped into identities.
pub const DEFAULT_MSP_ID: &str = "Org1MSP";

/// Runtime settings shared by every subcommand.
#[derive(Parser, Debug, Clone)]
pub struct Settings {
    /// Directory holding the embedded state database and identity vault
    #[arg(long, env = "LEDGERMESH_DATA", default_value = "./ledgermesh-data")]
    pub data_dir: PathBuf,

    /// Optional JSON connection profile; fields present there override the
    /// corresponding flags
    #[arg(long, env = "LEDGERMESH_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Membership service provider id for provisioned identities
    #[arg(long, env = "LEDGERMESH_MSP", default_value = DEFAULT_MSP_ID)]
    pub msp_id: String,

    /// Registrar principal id
    #[arg(long, env = "LEDGERMESH_ADMIN", default_value = ADMIN_USER_ID)]
    pub admin_id: String,

    /// Registrar enrollment secret
    #[arg(long, env = "LEDGERMESH_ADMIN_SECRET", default_value = ADMIN_USER_SECRET)]
    pub admin_secret: String,

    /// Application principal id
    #[arg(long, env = "LEDGERMESH_USER", default_value = APP_USER_ID)]
    pub user_id: String,

    /// Affiliation for registered application principals
    #[arg(long, env = "LEDGERMESH_AFFILIATION", default_value = USER_AFFILIATION)]
    pub affiliation: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Deployment description shipped by operators as JSON.
///
/// Every field is optional; present fields override the matching CLI flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default)]
    pub msp_id: Option<String>,
    #[serde(default)]
    pub admin_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
}

impl ConnectionProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl Settings {
    /// Path of the embedded world-state database.
    pub fn state_db_path(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Path of the identity vault database.
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join("vault")
    }

    /// Load the connection profile if one was configured and fold its
    /// fields over the flag values.
    pub fn apply_profile(&mut self) -> Result<()> {
        let Some(path) = self.profile.clone() else {
            return Ok(());
        };
        let profile = ConnectionProfile::load(&path)?;
        if let Some(msp_id) = profile.msp_id {
            self.msp_id = msp_id;
        }
        if let Some(admin_id) = profile.admin_id {
            self.admin_id = admin_id;
        }
        if let Some(user_id) = profile.user_id {
            self.user_id = user_id;
        }
        if let Some(affiliation) = profile.affiliation {
            self.affiliation = affiliation;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.admin_id.is_empty() || self.admin_secret.is_empty() {
            return Err("registrar id and secret must not be empty".to_string());
        }
        if self.user_id.is_empty() {
            return Err("user id must not be empty".to_string());
        }
        if self.user_id == self.admin_id {
            return Err("user id must differ from the registrar id".to_string());
        }
        Ok(())
    }
}
