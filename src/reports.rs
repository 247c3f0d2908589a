use chrono::{Datelike, NaiveDate};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

use crate::ledger;
use crate::service::{self, FeeError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionPayment {
    pub admission_id: String,
    pub student_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    pub receipt_id: String,
    pub months_paid: Vec<String>,
    pub amount_per_month: f64,
    pub total_amount: f64,
    pub payment_method: String,
    pub payment_date: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCollectionReport {
    pub year: i32,
    pub month: String,
    pub total_collection: f64,
    pub total_students: usize,
    pub payments: Vec<CollectionPayment>,
}

/// Scan every account's payments for entries covering `month` of `year`.
/// Zeroed report when nothing matches.
pub fn monthly_collection(
    conn: &Connection,
    year: i32,
    month: &str,
) -> Result<MonthlyCollectionReport, FeeError> {
    let Some(month) = ledger::normalize_month(month) else {
        return Err(FeeError::Validation(format!("unknown month name: {}", month)));
    };
    if year <= 0 {
        return Err(FeeError::Validation("year must be a positive year".to_string()));
    }

    let mut stmt = conn.prepare(
        "SELECT a.admission_id, a.student_name, a.class_name,
                p.receipt_id, p.months_paid, p.amount_per_month,
                p.total_amount, p.payment_method, p.payment_date
         FROM monthly_payments p
         JOIN fee_accounts a ON a.id = p.account_id
         WHERE p.year = ?
         ORDER BY p.payment_date, p.rowid",
    )?;
    let rows = stmt
        .query_map([year], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, Option<String>>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, f64>(5)?,
                r.get::<_, f64>(6)?,
                r.get::<_, String>(7)?,
                r.get::<_, String>(8)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let mut payments: Vec<CollectionPayment> = Vec::new();
    let mut total_collection = 0.0;
    for (
        admission_id,
        student_name,
        class_name,
        receipt_id,
        months_json,
        amount_per_month,
        total_amount,
        payment_method,
        payment_date,
    ) in rows
    {
        let months_paid: Vec<String> = serde_json::from_str(&months_json).map_err(|e| {
            FeeError::Internal(format!(
                "invalid months_paid for receipt {}: {}",
                receipt_id, e
            ))
        })?;
        if !months_paid.iter().any(|m| m == month) {
            continue;
        }
        total_collection += total_amount;
        payments.push(CollectionPayment {
            admission_id,
            student_name,
            class_name,
            receipt_id,
            months_paid,
            amount_per_month,
            total_amount,
            payment_method,
            payment_date,
        });
    }

    Ok(MonthlyCollectionReport {
        year,
        month: month.to_string(),
        total_students: payments.len(),
        total_collection,
        payments,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaulter {
    pub admission_id: String,
    pub student_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    pub monthly_fee_amount: f64,
    pub pending_months: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_address: Option<String>,
}

/// Active accounts missing the current month's payment for the current
/// calendar year. Month coverage is recomputed from the payment rows, not
/// read from the summary columns.
pub fn fee_defaulters(
    conn: &Connection,
    academic_year: Option<&str>,
    today: NaiveDate,
) -> Result<Vec<Defaulter>, FeeError> {
    let mut sql = String::from(
        "SELECT id, admission_id, student_name, class_name, father_name,
                monthly_fee_amount, last_payment_date, contact_phone, contact_address
         FROM fee_accounts
         WHERE status = 'Active'",
    );
    let mut binds: Vec<Value> = Vec::new();
    if let Some(year) = academic_year {
        sql.push_str(" AND academic_year = ?");
        binds.push(Value::Text(year.to_string()));
    }
    sql.push_str(" ORDER BY class_name, student_name");

    let mut stmt = conn.prepare(&sql)?;
    let accounts = stmt
        .query_map(params_from_iter(binds), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, Option<String>>(4)?,
                r.get::<_, f64>(5)?,
                r.get::<_, Option<String>>(6)?,
                r.get::<_, Option<String>>(7)?,
                r.get::<_, Option<String>>(8)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    let current_year = today.year();
    let current_month = ledger::current_month_name(today);

    let mut defaulters: Vec<Defaulter> = Vec::new();
    for (
        account_id,
        admission_id,
        student_name,
        class_name,
        father_name,
        monthly_fee_amount,
        last_payment_date,
        contact_phone,
        contact_address,
    ) in accounts
    {
        let payments = service::load_payments(conn, &account_id)?;
        let covered = ledger::months_paid_for_year(&payments, current_year);
        if covered.contains(current_month) {
            continue;
        }
        defaulters.push(Defaulter {
            admission_id,
            student_name,
            class_name,
            father_name,
            monthly_fee_amount,
            pending_months: ledger::pending_months(&covered),
            last_payment_date,
            contact_phone,
            contact_address,
        });
    }

    Ok(defaulters)
}
