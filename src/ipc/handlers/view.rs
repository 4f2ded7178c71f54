use super::params::{get_date, get_optional_str, get_page, get_required_str, get_status};
use crate::error::EngineError;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::ledger::Ledger;
use crate::view::{AttendanceView, LoadTicket};
use serde_json::json;
use uuid::Uuid;

fn state_json(view: &AttendanceView) -> serde_json::Value {
    serde_json::to_value(view.state()).unwrap_or_else(|_| json!(null))
}

/// A failed load keeps the view (and its edits); the error carries the view state.
fn load_error(view: &AttendanceView, e: EngineError) -> HandlerErr {
    let mut error = HandlerErr::from(e);
    if let Some(details) = error.details.as_mut() {
        details["state"] = state_json(view);
    }
    error
}

fn run_load(
    ledger: &Ledger,
    view: &mut AttendanceView,
    ticket: Option<LoadTicket>,
) -> Result<serde_json::Value, HandlerErr> {
    let changed = ticket.is_some();
    if let Some(ticket) = ticket {
        if let Err(e) = view.load(ledger, ticket) {
            return Err(load_error(view, e));
        }
    }
    Ok(json!({ "changed": changed, "state": state_json(view) }))
}

fn view_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(ledger) = state.ledger.as_ref() else {
        return Err(HandlerErr {
            code: "no_workspace",
            message: "select a workspace first".to_string(),
            details: None,
        });
    };
    let group_id = get_required_str(&req.params, "groupId")?;
    let date = get_date(&req.params, "date")?;

    let mut view = AttendanceView::new(group_id, date, state.settings.page_size);
    view.refresh(ledger)?;

    let view_id = Uuid::new_v4().to_string();
    let result = json!({ "viewId": view_id, "state": state_json(&view) });
    tracing::debug!(view_id = %view_id, "view opened");
    state.views.insert(view_id, view);
    Ok(result)
}

fn view_close(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let view_id = get_required_str(&req.params, "viewId")?;
    let Some(view) = state.views.remove(&view_id) else {
        return Err(view_not_found());
    };
    Ok(json!({ "closed": true, "discardedEdits": view.is_dirty() }))
}

fn view_not_found() -> HandlerErr {
    HandlerErr {
        code: "view_not_found",
        message: "view not found".to_string(),
        details: None,
    }
}

type ViewOp = fn(&Ledger, &mut AttendanceView, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>;

fn with_view(state: &mut AppState, req: &Request, op: ViewOp) -> serde_json::Value {
    let Some(ledger) = state.ledger.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let view_id = match get_required_str(&req.params, "viewId") {
        Ok(v) => v,
        Err(error) => return error.response(&req.id),
    };
    let Some(view) = state.views.get_mut(&view_id) else {
        return view_not_found().response(&req.id);
    };
    match op(ledger, view, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn view_state(
    _ledger: &Ledger,
    view: &mut AttendanceView,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    Ok(state_json(view))
}

fn view_select_group(
    ledger: &Ledger,
    view: &mut AttendanceView,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let group_id = get_required_str(params, "groupId")?;
    let ticket = view.select_group(&group_id);
    run_load(ledger, view, ticket)
}

fn view_select_date(
    ledger: &Ledger,
    view: &mut AttendanceView,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    let ticket = view.select_date(date);
    run_load(ledger, view, ticket)
}

fn view_go_to_page(
    ledger: &Ledger,
    view: &mut AttendanceView,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let page = get_page(params)?;
    let ticket = view.go_to_page(page);
    run_load(ledger, view, ticket)
}

fn view_refresh(
    ledger: &Ledger,
    view: &mut AttendanceView,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let ticket = view.begin_load();
    run_load(ledger, view, Some(ticket))
}

fn view_mark(
    _ledger: &Ledger,
    view: &mut AttendanceView,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let member_id = get_required_str(params, "memberId")?;
    let status = get_status(params)?;
    let applied = view.mark(&member_id, status);
    Ok(json!({
        "applied": applied,
        "dirty": view.is_dirty(),
        "liveCounts": view.live_counts(),
    }))
}

fn view_mark_all(
    _ledger: &Ledger,
    view: &mut AttendanceView,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let status = get_status(params)?;
    let count = view.mark_all(status);
    Ok(json!({
        "count": count,
        "dirty": view.is_dirty(),
        "liveCounts": view.live_counts(),
    }))
}

fn view_set_notes(
    _ledger: &Ledger,
    view: &mut AttendanceView,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let member_id = get_required_str(params, "memberId")?;
    let notes = get_optional_str(params, "notes")?;
    let applied = view.set_notes(&member_id, notes);
    Ok(json!({ "applied": applied, "dirty": view.is_dirty() }))
}

fn view_revert(
    _ledger: &Ledger,
    view: &mut AttendanceView,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    view.revert()?;
    Ok(state_json(view))
}

fn view_save(
    ledger: &Ledger,
    view: &mut AttendanceView,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let outcome = match view.save(ledger) {
        Ok(outcome) => outcome,
        Err(e) => return Err(load_error(view, e)),
    };
    Ok(json!({ "commit": outcome, "state": state_json(view) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "view.open" => match view_open(state, req) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        },
        "view.close" => match view_close(state, req) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        },
        "view.state" => with_view(state, req, view_state),
        "view.selectGroup" => with_view(state, req, view_select_group),
        "view.selectDate" => with_view(state, req, view_select_date),
        "view.goToPage" => with_view(state, req, view_go_to_page),
        "view.refresh" => with_view(state, req, view_refresh),
        "view.mark" => with_view(state, req, view_mark),
        "view.markAll" => with_view(state, req, view_mark_all),
        "view.setNotes" => with_view(state, req, view_set_notes),
        "view.revert" => with_view(state, req, view_revert),
        "view.save" => with_view(state, req, view_save),
        _ => return None,
    };
    Some(resp)
}
