use crate::config::Settings;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use crate::logging;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "openViews": state.views.len(),
        }),
    )
}

fn open_workspace(path: &std::path::Path) -> anyhow::Result<(Settings, Ledger)> {
    let settings = Settings::load(path)?;
    let ledger = Ledger::open(path)?.with_editable_window(settings.editable_window_days);
    Ok((settings, ledger))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(&path) {
        Ok((settings, ledger)) => {
            if let Some(handle) = &state.log_handle {
                if let Err(e) = logging::apply(handle, &settings.log_filter) {
                    tracing::warn!(error = ?e, "keeping previous log filter");
                }
            }
            tracing::info!(
                workspace = %path.display(),
                page_size = settings.page_size,
                log_filter = %settings.log_filter,
                "workspace opened"
            );
            // Views are bound to the previous ledger.
            state.views.clear();
            state.workspace = Some(path.clone());
            state.settings = settings;
            state.ledger = Some(ledger);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "settings": state.settings,
                }),
            )
        }
        Err(e) => {
            tracing::error!(workspace = %path.display(), error = ?e, "workspace open failed");
            err(&req.id, "db_open_failed", format!("{e:?}"), None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
