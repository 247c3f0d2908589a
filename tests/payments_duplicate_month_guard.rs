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
    let exe = env!("CARGO_BIN_EXE_feebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn feebookd");
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

fn setup_account(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &PathBuf) {
    let _ = request_ok(
        stdin,
        reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "2",
        "fees.create",
        json!({
            "admissionId": "ADM-2024-010",
            "studentName": "Sara Malik",
            "academicYear": "2024-25",
            "monthlyFeeAmount": 1000
        }),
    );
}

#[test]
fn duplicate_month_for_same_year_is_rejected_and_account_unchanged() {
    let workspace = temp_dir("feebook-dup-month");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_account(&mut stdin, &mut reader, &workspace);

    let appended = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-2024-010",
            "year": 2024,
            "monthsSelected": ["January", "February"],
            "amountPerMonth": 1000,
            "totalAmount": 2000,
            "paymentDate": "2024-02-05"
        }),
    );
    let receipt = appended
        .get("receiptId")
        .and_then(|v| v.as_str())
        .expect("receipt id");
    assert!(receipt.starts_with("MFR"), "unexpected receipt {}", receipt);
    assert_eq!(
        appended
            .get("account")
            .and_then(|a| a.get("feeSummary"))
            .and_then(|s| s.get("totalMonthlyFeesPaid"))
            .and_then(|v| v.as_f64()),
        Some(2000.0)
    );

    let conflict = request(
        &mut stdin,
        &mut reader,
        "4",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-2024-010",
            "year": 2024,
            "monthsSelected": ["February"],
            "amountPerMonth": 1000,
            "totalAmount": 1000
        }),
    );
    assert_eq!(conflict.get("ok").and_then(|v| v.as_bool()), Some(false));
    let error = conflict.get("error").expect("error body");
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("month_already_paid"));
    assert_eq!(
        error
            .get("details")
            .and_then(|d| d.get("months"))
            .cloned(),
        Some(json!(["February"]))
    );

    // Account untouched by the rejected append.
    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "fees.get",
        json!({ "admissionId": "ADM-2024-010" }),
    );
    let account = fetched.get("account").expect("account");
    assert_eq!(
        account
            .get("monthlyPayments")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
    assert_eq!(
        account
            .get("feeSummary")
            .and_then(|s| s.get("totalMonthlyFeesPaid"))
            .and_then(|v| v.as_f64()),
        Some(2000.0)
    );
}

#[test]
fn same_month_in_a_different_year_is_allowed() {
    let workspace = temp_dir("feebook-dup-month-year");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_account(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-2024-010",
            "year": 2024,
            "monthsSelected": ["February"],
            "amountPerMonth": 1000,
            "totalAmount": 1000
        }),
    );
    let next_year = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-2024-010",
            "year": 2025,
            "monthsSelected": ["February"],
            "amountPerMonth": 1000,
            "totalAmount": 1000
        }),
    );
    assert_eq!(
        next_year
            .get("account")
            .and_then(|a| a.get("feeSummary"))
            .and_then(|s| s.get("totalMonthlyFeesPaid"))
            .and_then(|v| v.as_f64()),
        Some(2000.0)
    );
}

#[test]
fn month_names_are_normalized_and_unknown_names_rejected() {
    let workspace = temp_dir("feebook-month-normalize");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    setup_account(&mut stdin, &mut reader, &workspace);

    let appended = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-2024-010",
            "year": 2024,
            "monthsSelected": ["march"],
            "amountPerMonth": 1000,
            "totalAmount": 1000
        }),
    );
    let months = appended
        .get("account")
        .and_then(|a| a.get("monthlyPayments"))
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|p| p.get("monthsPaid"))
        .cloned();
    assert_eq!(months, Some(json!(["March"])));

    // Normalization applies to the conflict check too.
    let conflict = request(
        &mut stdin,
        &mut reader,
        "4",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-2024-010",
            "year": 2024,
            "monthsSelected": ["MARCH"],
            "amountPerMonth": 1000,
            "totalAmount": 1000
        }),
    );
    assert_eq!(
        conflict
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("month_already_paid")
    );

    let unknown = request(
        &mut stdin,
        &mut reader,
        "5",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-2024-010",
            "year": 2024,
            "monthsSelected": ["Febuary"],
            "amountPerMonth": 1000,
            "totalAmount": 1000
        }),
    );
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("bad_params")
    );

    let missing_account = request(
        &mut stdin,
        &mut reader,
        "6",
        "fees.payments.append",
        json!({
            "admissionId": "ADM-9999-404",
            "year": 2024,
            "monthsSelected": ["April"],
            "amountPerMonth": 1000,
            "totalAmount": 1000
        }),
    );
    assert_eq!(
        missing_account
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_found")
    );
}
