use super::params::{get_optional_str, get_required_str};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use serde_json::json;

fn groups_create(ledger: &Ledger, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let group_id = ledger.create_group(&name)?;
    Ok(json!({ "groupId": group_id }))
}

fn members_add(ledger: &Ledger, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let group_id = get_required_str(params, "groupId")?;
    let display_name = get_required_str(params, "displayName")?;
    let id = get_optional_str(params, "id")?;
    let member_id = ledger.add_member(&group_id, &display_name, id.as_deref())?;
    Ok(json!({ "memberId": member_id }))
}

fn with_ledger(
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
        "groups.create" => Some(with_ledger(state, req, groups_create)),
        "members.add" => Some(with_ledger(state, req, members_add)),
        _ => None,
    }
}
