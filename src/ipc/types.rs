use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// Caller identity as verified by the external authorization layer. This
/// core trusts it as-is; `identity` is recorded as `createdBy` on writes.
#[derive(Debug, Deserialize, Clone)]
pub struct Actor {
    pub role: String,
    pub identity: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub actor: Option<Actor>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
