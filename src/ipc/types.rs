use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::export::ExportStatus;
use crate::session::QuizSession;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Open quiz sessions by session id. Dropped once finished.
    pub sessions: HashMap<String, QuizSession>,
    /// Export control state keyed by trainee name.
    pub exports: HashMap<String, ExportStatus>,
}

impl AppState {
    /// Opens (creating if needed) the workspace database. Open sessions and
    /// export states belong to the previous workspace and are dropped.
    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let conn = crate::db::open_db(&path)?;
        tracing::info!(workspace = %path.display(), "workspace opened");
        self.sessions.clear();
        self.exports.clear();
        self.db = Some(conn);
        self.workspace = Some(path);
        Ok(())
    }
}
