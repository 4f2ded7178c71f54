use chrono::NaiveDate;

use crate::ipc::error::HandlerErr;
use crate::status::AttendanceStatus;

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be string or null", key))),
    }
}

/// Calendar day only, `YYYY-MM-DD`. No time of day, no zone.
pub fn get_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = get_required_str(params, key)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

pub fn get_status(params: &serde_json::Value) -> Result<AttendanceStatus, HandlerErr> {
    let raw = get_required_str(params, "status")?;
    raw.parse::<AttendanceStatus>().map_err(|e| HandlerErr::bad_params(e.to_string()))
}

pub fn get_page(params: &serde_json::Value) -> Result<u32, HandlerErr> {
    let page = params
        .get("page")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("page must be a positive integer"))?;
    u32::try_from(page).map_err(|_| HandlerErr::bad_params("page out of range"))
}
