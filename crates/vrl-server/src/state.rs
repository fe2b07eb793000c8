use std::sync::Arc;

use vrl_store::RecordStore;

use crate::config::{is_valid_field_name, ServerConfig};
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<RecordStore>, config: ServerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Resolve the requested key field, falling back to the configured
    /// default, and check it against the naming rules and allow-list.
    pub fn key_field(&self, requested: Option<&str>) -> ServerResult<String> {
        let field = requested
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(self.config.default_key_field.as_str());

        if !is_valid_field_name(field) {
            return Err(ServerError::InvalidKeyField(format!("{field:?} is not a valid field name")));
        }
        let allowed = &self.config.allowed_key_fields;
        if !allowed.is_empty() && !allowed.iter().any(|f| f == field) {
            return Err(ServerError::InvalidKeyField(format!("{field:?} is not queryable")));
        }
        Ok(field.to_string())
    }
}
