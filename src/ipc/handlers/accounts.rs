use serde_json::json;

use crate::ipc::error::{err, fee_err, ok};
use crate::ipc::helpers::{db_conn, db_conn_mut, opt_f64, opt_str, required_str, to_value};
use crate::ipc::types::{AppState, Request};
use crate::ledger::{AccountStatus, AdmissionTimeFees};
use crate::service::{self, ListFilters, NewAccount};

/// The one-time charge breakdown is parsed leniently: missing or
/// non-numeric fields count as 0. Negative values are rejected later by
/// the service.
fn parse_admission_time_fees(params: &serde_json::Value) -> AdmissionTimeFees {
    let read = |key: &str| -> f64 {
        params
            .get("admissionTimeFees")
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0)
    };
    AdmissionTimeFees {
        registration_fee: read("registrationFee"),
        admission_fee: read("admissionFee"),
        annual_charges: read("annualCharges"),
        activity_fee: read("activityFee"),
        maintenance_fee: read("maintenanceFee"),
        tuition_fee: read("tuitionFee"),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let admission_id = match required_str(req, "admissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_name = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let academic_year = match required_str(req, "academicYear") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_name = match opt_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let father_name = match opt_str(req, "fatherName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let contact_phone = match opt_str(req, "contactPhone") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let contact_address = match opt_str(req, "contactAddress") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let monthly_fee_amount = match opt_f64(req, "monthlyFeeAmount") {
        Ok(v) => v.unwrap_or(0.0),
        Err(resp) => return resp,
    };
    let status = match opt_str(req, "status") {
        Ok(None) => None,
        Ok(Some(raw)) => match AccountStatus::parse(&raw) {
            Some(s) => Some(s),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "status must be one of: Active, Inactive, Transferred, Graduated",
                    None,
                )
            }
        },
        Err(resp) => return resp,
    };

    let new = NewAccount {
        admission_id,
        student_name,
        class_name,
        father_name,
        contact_phone,
        contact_address,
        academic_year,
        monthly_fee_amount,
        admission_time_fees: parse_admission_time_fees(&req.params),
        status,
    };

    match service::create_account(conn, new) {
        Ok(account) => match to_value(req, &account) {
            Ok(v) => ok(&req.id, json!({ "account": v })),
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let admission_id = match required_str(req, "admissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match service::get_account(conn, &admission_id) {
        Ok(account) => match to_value(req, &account) {
            Ok(v) => ok(&req.id, json!({ "account": v })),
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let academic_year = match opt_str(req, "academicYear") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let class_name = match opt_str(req, "class") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let status = match opt_str(req, "status") {
        Ok(None) => None,
        Ok(Some(raw)) => match AccountStatus::parse(&raw) {
            Some(s) => Some(s),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "status must be one of: Active, Inactive, Transferred, Graduated",
                    None,
                )
            }
        },
        Err(resp) => return resp,
    };

    let filters = ListFilters {
        academic_year,
        status,
        class_name,
    };

    match service::list_accounts(conn, &filters) {
        Ok(accounts) => match to_value(req, &accounts) {
            Ok(v) => {
                let count = accounts.len();
                ok(&req.id, json!({ "accounts": v, "count": count }))
            }
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let admission_id = match required_str(req, "admissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    match service::update_account(conn, &admission_id, patch) {
        Ok(account) => match to_value(req, &account) {
            Ok(v) => ok(&req.id, json!({ "account": v })),
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let admission_id = match required_str(req, "admissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match service::delete_account(conn, &admission_id) {
        Ok(()) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => fee_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.create" => Some(handle_create(state, req)),
        "fees.get" => Some(handle_get(state, req)),
        "fees.list" => Some(handle_list(state, req)),
        "fees.update" => Some(handle_update(state, req)),
        "fees.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
