use serde_json::json;

use crate::ipc::error::{err, fee_err, ok};
use crate::ipc::helpers::{db_conn_mut, opt_str, required_f64, required_i64, required_str, to_value};
use crate::ipc::types::{AppState, Request};
use crate::service::{self, NewAdditionalFee, NewMonthlyPayment};

fn parse_months(req: &Request) -> Result<Vec<String>, serde_json::Value> {
    let Some(raw) = req.params.get("monthsSelected").and_then(|v| v.as_array()) else {
        return Err(err(
            &req.id,
            "bad_params",
            "missing monthsSelected (array of month names)",
            None,
        ));
    };
    raw.iter()
        .map(|v| {
            v.as_str().map(|s| s.to_string()).ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    "monthsSelected entries must be strings",
                    None,
                )
            })
        })
        .collect()
}

fn handle_payment_append(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let admission_id = match required_str(req, "admissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let year = match required_i64(req, "year") {
        Ok(v) => v as i32,
        Err(resp) => return resp,
    };
    let months = match parse_months(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let amount_per_month = match required_f64(req, "amountPerMonth") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let total_amount = match required_f64(req, "totalAmount") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let payment_method = match opt_str(req, "paymentMethod") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let payment_date = match opt_str(req, "paymentDate") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let remarks = match opt_str(req, "remarks") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let created_by = match opt_str(req, "createdBy") {
        Ok(v) => v.or_else(|| req.actor.as_ref().map(|a| a.identity.clone())),
        Err(resp) => return resp,
    };

    let new = NewMonthlyPayment {
        admission_id,
        year,
        months,
        amount_per_month,
        total_amount,
        payment_method,
        payment_date,
        remarks,
        created_by,
    };

    match service::append_monthly_payment(conn, new) {
        Ok((account, receipt_id)) => match to_value(req, &account) {
            Ok(v) => ok(&req.id, json!({ "account": v, "receiptId": receipt_id })),
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

fn handle_additional_append(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let admission_id = match required_str(req, "admissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let fee_type = match required_str(req, "feeType") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let amount = match required_f64(req, "amount") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let description = match opt_str(req, "description") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let due_date = match opt_str(req, "dueDate") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let new = NewAdditionalFee {
        admission_id,
        fee_type,
        amount,
        description,
        due_date,
    };

    match service::append_additional_fee(conn, new) {
        Ok((account, receipt_id)) => match to_value(req, &account) {
            Ok(v) => ok(&req.id, json!({ "account": v, "receiptId": receipt_id })),
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

fn handle_additional_mark_paid(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn_mut(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let admission_id = match required_str(req, "admissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let receipt_id = match required_str(req, "receiptId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let payment_method = match opt_str(req, "paymentMethod") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let paid_date = match opt_str(req, "paidDate") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match service::mark_additional_fee_paid(conn, &admission_id, &receipt_id, payment_method, paid_date)
    {
        Ok(account) => match to_value(req, &account) {
            Ok(v) => ok(&req.id, json!({ "account": v })),
            Err(resp) => resp,
        },
        Err(e) => fee_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.payments.append" => Some(handle_payment_append(state, req)),
        "fees.additionalFees.append" => Some(handle_additional_append(state, req)),
        "fees.additionalFees.markPaid" => Some(handle_additional_mark_paid(state, req)),
        _ => None,
    }
}
