use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vrl_store::{Record, Sequence, StoredRecord};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
    pub key_field: Option<String>,
}

impl KeyQuery {
    /// The key exactly as sent. Keys are compared byte for byte, so
    /// surrounding whitespace is significant.
    fn key(&self) -> ServerResult<&str> {
        if self.key.is_empty() {
            return Err(ServerError::BadRequest("key must not be empty".into()));
        }
        Ok(&self.key)
    }
}

#[derive(Debug, Serialize)]
pub struct RecordView {
    pub sequence: Sequence,
    pub deleted: bool,
    pub record: Value,
}

impl From<&StoredRecord> for RecordView {
    fn from(stored: &StoredRecord) -> Self {
        Self {
            sequence: stored.sequence,
            deleted: stored.is_tombstone(),
            record: stored.record.to_json(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WriteAck {
    pub sequence: Sequence,
}

/// `GET /v1/records/latest?key=…&key_field=…`
pub async fn latest_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> ServerResult<Json<RecordView>> {
    let key_field = state.key_field(query.key_field.as_deref())?;
    let latest = state.store.latest(&key_field, query.key()?).await?;
    Ok(Json(RecordView::from(&latest)))
}

/// `GET /v1/records/history?key=…&key_field=…`
pub async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> ServerResult<Json<Value>> {
    let key_field = state.key_field(query.key_field.as_deref())?;
    let key = query.key()?;
    let history = state.store.history(&key_field, key).await?;
    let records: Vec<RecordView> = history.iter().map(RecordView::from).collect();
    Ok(Json(json!({
        "key_field": key_field,
        "key": key,
        "count": records.len(),
        "records": records,
    })))
}

/// `POST /v1/records` with a JSON object body.
pub async fn append_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ServerResult<(StatusCode, Json<WriteAck>)> {
    let Value::Object(object) = body else {
        return Err(ServerError::BadRequest("record must be a JSON object".into()));
    };
    let sequence = state.store.append(&Record::from_object(object)).await?;
    Ok((StatusCode::CREATED, Json(WriteAck { sequence })))
}

/// `DELETE /v1/records?key=…&key_field=…`
pub async fn delete_handler(
    State(state): State<AppState>,
    Query(query): Query<KeyQuery>,
) -> ServerResult<Json<WriteAck>> {
    let key_field = state.key_field(query.key_field.as_deref())?;
    let sequence = state.store.delete(&key_field, &query.key).await?;
    Ok(Json(WriteAck { sequence }))
}

/// `GET /v1/records`
pub async fn list_handler(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let all = state.store.get_all().await?;
    let records: Vec<RecordView> = all.iter().map(RecordView::from).collect();
    Ok(Json(json!({ "count": records.len(), "records": records })))
}

/// `GET /v1/health`: reports the ledger head, or 503 if it is unreachable.
pub async fn health_handler(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let head = state.store.head().await?;
    Ok(Json(json!({ "status": "ok", "head": head })))
}

/// `GET /v1/account`
pub async fn account_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "identity": state.store.identity().to_hex() }))
}

/// `GET /v1/info`
pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "vrl-server",
        "version": env!("CARGO_PKG_VERSION"),
        "default_key_field": state.config.default_key_field,
        "allowed_key_fields": state.config.allowed_key_fields,
        "indexed_fields": state.store.indexed_fields(),
    }))
}
