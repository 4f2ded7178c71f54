use super::params::get_required_str;
use crate::backend::AttendanceBackend;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use serde_json::json;

fn daily_summary(ledger: &Ledger, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let group_id = get_required_str(params, "groupId")?;
    let rows = ledger.fetch_daily_summary(&group_id)?;
    Ok(json!({ "groupId": group_id, "rows": rows }))
}

fn ranking(ledger: &Ledger, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let group_id = get_required_str(params, "groupId")?;
    let rows = ledger.fetch_ranking(&group_id)?;
    Ok(json!({ "groupId": group_id, "rows": rows }))
}

fn handle(
    state: &mut AppState,
    req: &Request,
    f: fn(&Ledger, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(ledger) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(ledger, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.dailySummary" => Some(handle(state, req, daily_summary)),
        "analytics.ranking" => Some(handle(state, req, ranking)),
        _ => None,
    }
}
