use chrono::Local;
use serde_json::json;

use crate::ipc::error::{fee_err, ok};
use crate::ipc::helpers::{db_conn, opt_str, required_i64, required_str, to_value};
use crate::ipc::types::{AppState, Request};
use crate::reports;

fn handle_monthly_collection(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let year = match required_i64(req, "year") {
        Ok(v) => v as i32,
        Err(resp) => return resp,
    };
    let month = match required_str(req, "month") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match reports::monthly_collection(conn, year, &month) {
        Ok(report) => match to_value(req, &report) {
            Ok(v) => ok(&req.id, v),
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

fn handle_defaulters(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let academic_year = match opt_str(req, "academicYear") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let today = Local::now().date_naive();
    match reports::fee_defaulters(conn, academic_year.as_deref(), today) {
        Ok(defaulters) => match to_value(req, &defaulters) {
            Ok(v) => {
                let count = defaulters.len();
                ok(&req.id, json!({ "defaulters": v, "count": count }))
            }
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.monthlyCollection" => Some(handle_monthly_collection(state, req)),
        "reports.defaulters" => Some(handle_defaulters(state, req)),
        _ => None,
    }
}
