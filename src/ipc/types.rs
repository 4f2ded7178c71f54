use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Settings;
use crate::ledger::Ledger;
use crate::logging::LogHandle;
use crate::view::AttendanceView;

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
    pub settings: Settings,
    pub ledger: Option<Ledger>,
    /// Open views by id. Each owns its working set exclusively.
    pub views: HashMap<String, AttendanceView>,
    /// Present when this process installed the global subscriber.
    pub log_handle: Option<LogHandle>,
}
