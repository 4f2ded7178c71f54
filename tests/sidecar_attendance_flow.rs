use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn row_status<'a>(state: &'a serde_json::Value, member_id: &str) -> Option<&'a str> {
    state
        .get("rows")?
        .as_array()?
        .iter()
        .find(|r| r.get("memberId").and_then(|v| v.as_str()) == Some(member_id))?
        .get("status")?
        .as_str()
}

#[test]
fn open_mark_save_and_reload_over_ipc() {
    let workspace = temp_dir("rollcall-sidecar-flow");
    std::fs::write(workspace.join("rollcall.json"), r#"{ "pageSize": 2 }"#)
        .expect("write settings");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").is_some());

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        selected.pointer("/settings/pageSize").and_then(|v| v.as_u64()),
        Some(2)
    );

    let group_id = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "groups.create",
        json!({ "name": "Grade 4" }),
    )
    .get("groupId")
    .and_then(|v| v.as_str())
    .expect("groupId")
    .to_string();
    for (i, id) in ["m1", "m2", "m3"].iter().enumerate() {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("4.{}", i),
            "members.add",
            json!({ "groupId": group_id, "displayName": format!("Kid {}", id), "id": id }),
        );
    }

    let opened = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "view.open",
        json!({ "groupId": group_id, "date": "2024-03-01" }),
    );
    let view_id = opened
        .get("viewId")
        .and_then(|v| v.as_str())
        .expect("viewId")
        .to_string();
    let state = opened.get("state").expect("state");
    assert_eq!(state.get("totalCount").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(state.get("totalPages").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(row_status(state, "m1"), Some("unmarked"));

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "view.mark",
        json!({ "viewId": view_id, "memberId": "m1", "status": "present" }),
    );
    assert_eq!(marked.get("applied").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(marked.get("dirty").and_then(|v| v.as_bool()), Some(true));

    let off_page = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "view.mark",
        json!({ "viewId": view_id, "memberId": "m3", "status": "present" }),
    );
    assert_eq!(off_page.get("applied").and_then(|v| v.as_bool()), Some(false));

    request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "view.mark",
        json!({ "viewId": view_id, "memberId": "m2", "status": "absent" }),
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "view.save",
        json!({ "viewId": view_id }),
    );
    assert_eq!(
        saved.pointer("/commit/outcome").and_then(|v| v.as_str()),
        Some("committed")
    );
    assert_eq!(
        saved.pointer("/commit/affectedCount").and_then(|v| v.as_u64()),
        Some(2)
    );
    assert_eq!(saved.pointer("/state/dirty").and_then(|v| v.as_bool()), Some(false));

    let beyond = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "view.goToPage",
        json!({ "viewId": view_id, "page": 3 }),
    );
    assert_eq!(beyond.get("changed").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(beyond.pointer("/state/page").and_then(|v| v.as_u64()), Some(1));

    let page2 = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "view.goToPage",
        json!({ "viewId": view_id, "page": 2 }),
    );
    let state = page2.get("state").expect("state");
    assert_eq!(row_status(state, "m3"), Some("unmarked"));

    let ranking = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "analytics.ranking",
        json!({ "groupId": group_id }),
    );
    let first = ranking
        .pointer("/rows/0/memberId")
        .and_then(|v| v.as_str());
    assert_eq!(first, Some("m1"));

    let other_day = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "view.selectDate",
        json!({ "viewId": view_id, "date": "2024-03-02" }),
    );
    assert_eq!(other_day.pointer("/state/page").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(row_status(other_day.get("state").expect("state"), "m1"), Some("unmarked"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn errors_are_classified_over_ipc() {
    let workspace = temp_dir("rollcall-sidecar-errors");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let no_ws = request(
        &mut stdin,
        &mut reader,
        "1",
        "view.open",
        json!({ "groupId": "g", "date": "2024-03-01" }),
    );
    assert_eq!(error_code(&no_ws), Some("no_workspace"));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "3",
        "view.open",
        json!({ "groupId": "nope", "date": "2024-03-01" }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "4",
        "view.open",
        json!({ "groupId": "nope", "date": "2024-03-01T10:00:00Z" }),
    );
    assert_eq!(error_code(&bad_date), Some("bad_params"));

    let unknown_view = request(
        &mut stdin,
        &mut reader,
        "5",
        "view.state",
        json!({ "viewId": "does-not-exist" }),
    );
    assert_eq!(error_code(&unknown_view), Some("view_not_found"));

    let unknown = request(&mut stdin, &mut reader, "6", "attendance.teleport", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
}
