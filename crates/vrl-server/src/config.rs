use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vrl_store::StoreConfig;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Ledger file. Without one the server runs on an in-memory ledger.
    pub ledger_path: Option<PathBuf>,
    /// Index snapshot file, loaded at startup and rewritten after advances.
    pub snapshot_path: Option<PathBuf>,
    /// Field names clients may query by. Empty allows any well-formed name.
    pub allowed_key_fields: Vec<String>,
    /// Used when a request names no key field.
    pub default_key_field: String,
    pub store: StoreConfig,
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> ServerResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> ServerResult<()> {
        for field in self.allowed_key_fields.iter().chain([&self.default_key_field]) {
            if !is_valid_field_name(field) {
                return Err(ServerError::Config(format!("invalid key field name {field:?}")));
            }
        }
        if !self.allowed_key_fields.is_empty()
            && !self.allowed_key_fields.contains(&self.default_key_field)
        {
            return Err(ServerError::Config(format!(
                "default key field {:?} is not in allowed_key_fields",
                self.default_key_field
            )));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            ledger_path: None,
            snapshot_path: None,
            allowed_key_fields: Vec::new(),
            default_key_field: "vin".into(),
            store: StoreConfig::default(),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, at most 64 bytes.
pub fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 64 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
