use chrono::{Duration, Local, NaiveDate, Utc};
use rand::Rng;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::{
    self, AccountStatus, AdditionalFeeEntry, AdditionalFeeStatus, AdmissionTimeFees, FeeSummary,
    PaymentEntry,
};

pub const RECEIPT_PREFIX_ADMISSION: &str = "ADM";
pub const RECEIPT_PREFIX_MONTHLY: &str = "MFR";
pub const RECEIPT_PREFIX_ADDITIONAL: &str = "AFR";

const MAX_RECEIPT_ATTEMPTS: u32 = 16;

#[derive(Debug, Error)]
pub enum FeeError {
    #[error("{0}")]
    Validation(String),

    #[error("fee account already exists for admission {0}")]
    DuplicateAccount(String),

    #[error("fee account not found for admission {0}")]
    AccountNotFound(String),

    #[error("additional fee not found for receipt {0}")]
    FeeRecordNotFound(String),

    #[error("months already paid for that year: {}", .0.join(", "))]
    MonthAlreadyPaid(Vec<String>),

    // Message stays generic on the wire; the source is logged at the edge.
    #[error("storage operation failed")]
    Storage(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FeeError {
    pub fn code(&self) -> &'static str {
        match self {
            FeeError::Validation(_) => "bad_params",
            FeeError::DuplicateAccount(_) => "duplicate_account",
            FeeError::AccountNotFound(_) => "not_found",
            FeeError::FeeRecordNotFound(_) => "not_found",
            FeeError::MonthAlreadyPaid(_) => "month_already_paid",
            FeeError::Storage(_) => "db_failed",
            FeeError::Internal(_) => "internal",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            FeeError::MonthAlreadyPaid(months) => Some(json!({ "months": months })),
            _ => None,
        }
    }
}

/// Full account aggregate as returned to callers. Additional-fee statuses
/// are the lazily evaluated view (Pending past due reads as Overdue).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeAccount {
    pub admission_id: String,
    pub student_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_address: Option<String>,
    pub academic_year: String,
    pub status: AccountStatus,
    pub monthly_fee_amount: f64,
    pub admission_time_fees: AdmissionTimeFees,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission_receipt_id: Option<String>,
    pub admission_fees_paid: bool,
    pub monthly_payments: Vec<PaymentEntry>,
    pub additional_fees: Vec<AdditionalFeeEntry>,
    pub fee_summary: FeeSummary,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub admission_id: String,
    pub student_name: String,
    pub class_name: Option<String>,
    pub father_name: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_address: Option<String>,
    pub academic_year: String,
    pub monthly_fee_amount: f64,
    pub admission_time_fees: AdmissionTimeFees,
    pub status: Option<AccountStatus>,
}

#[derive(Debug, Clone)]
pub struct NewMonthlyPayment {
    pub admission_id: String,
    pub year: i32,
    pub months: Vec<String>,
    pub amount_per_month: f64,
    pub total_amount: f64,
    pub payment_method: Option<String>,
    pub payment_date: Option<String>,
    pub remarks: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAdditionalFee {
    pub admission_id: String,
    pub fee_type: String,
    pub amount: f64,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    pub academic_year: Option<String>,
    pub status: Option<AccountStatus>,
    pub class_name: Option<String>,
}

pub fn create_account(conn: &mut Connection, new: NewAccount) -> Result<FeeAccount, FeeError> {
    let admission_id = require_non_empty(&new.admission_id, "admissionId")?;
    let student_name = require_non_empty(&new.student_name, "studentName")?;
    let academic_year = require_non_empty(&new.academic_year, "academicYear")?;
    if new.monthly_fee_amount < 0.0 {
        return Err(FeeError::Validation(
            "monthlyFeeAmount must not be negative".to_string(),
        ));
    }
    if !new.admission_time_fees.all_non_negative() {
        return Err(FeeError::Validation(
            "admission-time fee fields must not be negative".to_string(),
        ));
    }

    let today = Local::now().date_naive();
    let now = Utc::now().to_rfc3339();
    let status = new.status.unwrap_or(AccountStatus::Active);
    let summary = ledger::compute_summary(&new.admission_time_fees, &[], &[], today);
    let admission_fees_paid = summary.total_admission_fees > 0.0;

    let tx = conn.transaction()?;

    let exists: Option<i64> = tx
        .query_row(
            "SELECT 1 FROM fee_accounts WHERE admission_id = ?",
            [&admission_id],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Err(FeeError::DuplicateAccount(admission_id));
    }

    let account_id = Uuid::new_v4().to_string();
    let admission_receipt = fresh_receipt_id(&tx, RECEIPT_PREFIX_ADMISSION)?;
    tx.execute(
        "INSERT INTO fee_accounts(
            id, admission_id, student_name, class_name, father_name,
            contact_phone, contact_address, academic_year, status,
            monthly_fee_amount, registration_fee, admission_fee, annual_charges,
            activity_fee, maintenance_fee, tuition_fee,
            admission_receipt_id, admission_fees_paid,
            total_admission_fees, total_monthly_fees_paid, total_additional_fees,
            grand_total, last_payment_date, monthly_fees_status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            account_id,
            admission_id,
            student_name,
            new.class_name,
            new.father_name,
            new.contact_phone,
            new.contact_address,
            academic_year,
            status.as_str(),
            new.monthly_fee_amount,
            new.admission_time_fees.registration_fee,
            new.admission_time_fees.admission_fee,
            new.admission_time_fees.annual_charges,
            new.admission_time_fees.activity_fee,
            new.admission_time_fees.maintenance_fee,
            new.admission_time_fees.tuition_fee,
            admission_receipt,
            admission_fees_paid,
            summary.total_admission_fees,
            summary.total_monthly_fees_paid,
            summary.total_additional_fees,
            summary.grand_total,
            summary.last_payment_date,
            summary.monthly_fees_status,
            now,
        ],
    )?;
    tx.commit()?;

    get_account(conn, &admission_id)
}

/// Append a monthly payment. The duplicate-month check and the insert run
/// in one transaction, so a conflicting append rolls back whole.
pub fn append_monthly_payment(
    conn: &mut Connection,
    new: NewMonthlyPayment,
) -> Result<(FeeAccount, String), FeeError> {
    let admission_id = require_non_empty(&new.admission_id, "admissionId")?;
    if new.year <= 0 {
        return Err(FeeError::Validation("year must be a positive year".to_string()));
    }
    if new.months.is_empty() {
        return Err(FeeError::Validation(
            "monthsSelected must not be empty".to_string(),
        ));
    }
    let mut months: Vec<String> = Vec::with_capacity(new.months.len());
    for raw in &new.months {
        let Some(canonical) = ledger::normalize_month(raw) else {
            return Err(FeeError::Validation(format!("unknown month name: {}", raw)));
        };
        if months.iter().any(|m| m == canonical) {
            return Err(FeeError::Validation(format!(
                "month listed twice in request: {}",
                canonical
            )));
        }
        months.push(canonical.to_string());
    }
    if new.amount_per_month < 0.0 || new.total_amount < 0.0 {
        return Err(FeeError::Validation(
            "amountPerMonth and totalAmount must not be negative".to_string(),
        ));
    }

    let today = Local::now().date_naive();
    let payment_date = resolve_date(new.payment_date.as_deref(), "paymentDate", today)?;
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    let account_id = account_id_for(&tx, &admission_id)?;

    let mut payments = load_payments(&tx, &account_id)?;
    let conflicts = ledger::conflicting_months(&payments, new.year, &months);
    if !conflicts.is_empty() {
        return Err(FeeError::MonthAlreadyPaid(conflicts));
    }

    let receipt_id = fresh_receipt_id(&tx, RECEIPT_PREFIX_MONTHLY)?;
    let months_json = serde_json::to_string(&months)
        .map_err(|e| FeeError::Internal(format!("failed to encode months: {}", e)))?;
    let entry = PaymentEntry {
        receipt_id: receipt_id.clone(),
        year: new.year,
        months_paid: months,
        amount_per_month: new.amount_per_month,
        total_amount: new.total_amount,
        payment_method: new
            .payment_method
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Cash".to_string()),
        payment_date,
        status: "Completed".to_string(),
        remarks: new.remarks,
        created_by: new.created_by,
    };
    tx.execute(
        "INSERT INTO monthly_payments(
            id, account_id, receipt_id, year, months_paid, amount_per_month,
            total_amount, payment_method, payment_date, status, remarks,
            created_by, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            account_id,
            entry.receipt_id,
            entry.year,
            months_json,
            entry.amount_per_month,
            entry.total_amount,
            entry.payment_method,
            entry.payment_date,
            entry.status,
            entry.remarks,
            entry.created_by,
            now,
        ],
    )?;

    payments.push(entry);
    let additional = load_additional(&tx, &account_id)?;
    let admission_fees = load_admission_fees(&tx, &account_id)?;
    let summary = ledger::compute_summary(&admission_fees, &payments, &additional, today);
    persist_summary(&tx, &account_id, &summary, &now)?;
    tx.commit()?;

    Ok((get_account(conn, &admission_id)?, receipt_id))
}

pub fn append_additional_fee(
    conn: &mut Connection,
    new: NewAdditionalFee,
) -> Result<(FeeAccount, String), FeeError> {
    let admission_id = require_non_empty(&new.admission_id, "admissionId")?;
    let fee_type = require_non_empty(&new.fee_type, "feeType")?;
    if new.amount < 0.0 {
        return Err(FeeError::Validation("amount must not be negative".to_string()));
    }

    let today = Local::now().date_naive();
    let due_date = match new.due_date.as_deref() {
        Some(raw) => resolve_date(Some(raw), "dueDate", today)?,
        None => (today + Duration::days(30)).format("%Y-%m-%d").to_string(),
    };
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    let account_id = account_id_for(&tx, &admission_id)?;
    let receipt_id = fresh_receipt_id(&tx, RECEIPT_PREFIX_ADDITIONAL)?;

    tx.execute(
        "INSERT INTO additional_fees(
            id, account_id, receipt_id, fee_type, amount, description,
            due_date, status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            Uuid::new_v4().to_string(),
            account_id,
            receipt_id,
            fee_type,
            new.amount,
            new.description,
            due_date,
            AdditionalFeeStatus::Pending.as_str(),
            now,
        ],
    )?;

    recompute_and_persist(&tx, &account_id, today, &now)?;
    tx.commit()?;

    Ok((get_account(conn, &admission_id)?, receipt_id))
}

pub fn mark_additional_fee_paid(
    conn: &mut Connection,
    admission_id: &str,
    receipt_id: &str,
    payment_method: Option<String>,
    paid_date: Option<String>,
) -> Result<FeeAccount, FeeError> {
    let admission_id = require_non_empty(admission_id, "admissionId")?;
    let receipt_id = require_non_empty(receipt_id, "receiptId")?;

    let today = Local::now().date_naive();
    let paid_date = resolve_date(paid_date.as_deref(), "paidDate", today)?;
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    let account_id = account_id_for(&tx, &admission_id)?;

    let status_raw: Option<String> = tx
        .query_row(
            "SELECT status FROM additional_fees WHERE account_id = ? AND receipt_id = ?",
            (&account_id, &receipt_id),
            |r| r.get(0),
        )
        .optional()?;
    let Some(status_raw) = status_raw else {
        return Err(FeeError::FeeRecordNotFound(receipt_id));
    };
    if AdditionalFeeStatus::parse(&status_raw) == Some(AdditionalFeeStatus::Paid) {
        return Err(FeeError::Validation(format!(
            "additional fee {} is already marked paid",
            receipt_id
        )));
    }

    tx.execute(
        "UPDATE additional_fees
         SET status = ?, paid_date = ?, payment_method = ?
         WHERE account_id = ? AND receipt_id = ?",
        params![
            AdditionalFeeStatus::Paid.as_str(),
            paid_date,
            payment_method,
            account_id,
            receipt_id,
        ],
    )?;

    recompute_and_persist(&tx, &account_id, today, &now)?;
    tx.commit()?;

    get_account(conn, &admission_id)
}

/// Merge permitted fields from a JSON patch, then re-derive the summary.
/// Mirrors the wire field names; anything outside the permitted set is
/// rejected rather than silently dropped.
pub fn update_account(
    conn: &mut Connection,
    admission_id: &str,
    patch: &serde_json::Map<String, serde_json::Value>,
) -> Result<FeeAccount, FeeError> {
    let admission_id = require_non_empty(admission_id, "admissionId")?;
    if patch.is_empty() {
        return Err(FeeError::Validation(
            "patch must include at least one field".to_string(),
        ));
    }

    let mut set_parts: Vec<String> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    for (key, value) in patch {
        match key.as_str() {
            "studentName" | "academicYear" => {
                let Some(s) = value.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
                    return Err(FeeError::Validation(format!(
                        "patch.{} must be a non-empty string",
                        key
                    )));
                };
                set_parts.push(format!("{} = ?", column_for(key)));
                bind_values.push(Value::Text(s.to_string()));
            }
            "className" | "fatherName" | "contactPhone" | "contactAddress" => {
                if value.is_null() {
                    set_parts.push(format!("{} = ?", column_for(key)));
                    bind_values.push(Value::Null);
                } else if let Some(s) = value.as_str() {
                    set_parts.push(format!("{} = ?", column_for(key)));
                    bind_values.push(Value::Text(s.trim().to_string()));
                } else {
                    return Err(FeeError::Validation(format!(
                        "patch.{} must be a string or null",
                        key
                    )));
                }
            }
            "status" => {
                let parsed = value.as_str().and_then(ledger::AccountStatus::parse);
                let Some(status) = parsed else {
                    return Err(FeeError::Validation(
                        "patch.status must be one of: Active, Inactive, Transferred, Graduated"
                            .to_string(),
                    ));
                };
                set_parts.push("status = ?".to_string());
                bind_values.push(Value::Text(status.as_str().to_string()));
            }
            "monthlyFeeAmount" | "registrationFee" | "admissionFee" | "annualCharges"
            | "activityFee" | "maintenanceFee" | "tuitionFee" => {
                let Some(n) = value.as_f64() else {
                    return Err(FeeError::Validation(format!(
                        "patch.{} must be a number",
                        key
                    )));
                };
                if n < 0.0 {
                    return Err(FeeError::Validation(format!(
                        "patch.{} must not be negative",
                        key
                    )));
                }
                set_parts.push(format!("{} = ?", column_for(key)));
                bind_values.push(Value::Real(n));
            }
            other => {
                return Err(FeeError::Validation(format!(
                    "patch.{} is not an updatable field",
                    other
                )));
            }
        }
    }

    let today = Local::now().date_naive();
    let now = Utc::now().to_rfc3339();

    let tx = conn.transaction()?;
    let account_id = account_id_for(&tx, &admission_id)?;

    let sql = format!(
        "UPDATE fee_accounts SET {} WHERE id = ?",
        set_parts.join(", ")
    );
    bind_values.push(Value::Text(account_id.clone()));
    tx.execute(&sql, params_from_iter(bind_values))?;

    recompute_and_persist(&tx, &account_id, today, &now)?;
    tx.commit()?;

    get_account(conn, &admission_id)
}

/// Administrative escape hatch: removes the account and its ledger rows.
pub fn delete_account(conn: &mut Connection, admission_id: &str) -> Result<(), FeeError> {
    let admission_id = require_non_empty(admission_id, "admissionId")?;

    let tx = conn.transaction()?;
    let account_id = account_id_for(&tx, &admission_id)?;
    tx.execute(
        "DELETE FROM additional_fees WHERE account_id = ?",
        [&account_id],
    )?;
    tx.execute(
        "DELETE FROM monthly_payments WHERE account_id = ?",
        [&account_id],
    )?;
    tx.execute("DELETE FROM fee_accounts WHERE id = ?", [&account_id])?;
    tx.commit()?;
    Ok(())
}

pub fn get_account(conn: &Connection, admission_id: &str) -> Result<FeeAccount, FeeError> {
    let admission_id = require_non_empty(admission_id, "admissionId")?;
    let today = Local::now().date_naive();
    let row = account_row(conn, "admission_id = ?", &[Value::Text(admission_id.clone())])?
        .into_iter()
        .next()
        .ok_or(FeeError::AccountNotFound(admission_id))?;
    assemble_account(conn, row, today)
}

pub fn list_accounts(conn: &Connection, filters: &ListFilters) -> Result<Vec<FeeAccount>, FeeError> {
    let today = Local::now().date_naive();

    let mut where_parts: Vec<&str> = Vec::new();
    let mut binds: Vec<Value> = Vec::new();
    if let Some(year) = &filters.academic_year {
        where_parts.push("academic_year = ?");
        binds.push(Value::Text(year.clone()));
    }
    if let Some(status) = filters.status {
        where_parts.push("status = ?");
        binds.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(class) = &filters.class_name {
        where_parts.push("class_name = ?");
        binds.push(Value::Text(class.clone()));
    }
    let clause = if where_parts.is_empty() {
        "1 = 1".to_string()
    } else {
        where_parts.join(" AND ")
    };

    let rows = account_row(conn, &clause, &binds)?;
    rows.into_iter()
        .map(|row| assemble_account(conn, row, today))
        .collect()
}

fn require_non_empty(raw: &str, field: &str) -> Result<String, FeeError> {
    let t = raw.trim();
    if t.is_empty() {
        return Err(FeeError::Validation(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

fn resolve_date(raw: Option<&str>, field: &str, today: NaiveDate) -> Result<String, FeeError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today.format("%Y-%m-%d").to_string()),
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => Ok(d.format("%Y-%m-%d").to_string()),
            Err(_) => Err(FeeError::Validation(format!(
                "{} must be a YYYY-MM-DD date",
                field
            ))),
        },
    }
}

fn column_for(wire_field: &str) -> &'static str {
    match wire_field {
        "studentName" => "student_name",
        "className" => "class_name",
        "fatherName" => "father_name",
        "contactPhone" => "contact_phone",
        "contactAddress" => "contact_address",
        "academicYear" => "academic_year",
        "monthlyFeeAmount" => "monthly_fee_amount",
        "registrationFee" => "registration_fee",
        "admissionFee" => "admission_fee",
        "annualCharges" => "annual_charges",
        "activityFee" => "activity_fee",
        "maintenanceFee" => "maintenance_fee",
        "tuitionFee" => "tuition_fee",
        _ => unreachable!("column_for called with unvetted field"),
    }
}

/// Receipt ids stay human-readable (prefix + time + random) but uniqueness
/// is store-enforced: check before insert, bounded retry on collision.
fn fresh_receipt_id(conn: &Connection, prefix: &str) -> Result<String, FeeError> {
    for _ in 0..MAX_RECEIPT_ATTEMPTS {
        let secs = Utc::now().timestamp().rem_euclid(1_000_000);
        let tail: u32 = rand::thread_rng().gen_range(0..1000);
        let candidate = format!("{}{:06}{:03}", prefix, secs, tail);

        let taken: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM monthly_payments WHERE receipt_id = ?1
                 UNION SELECT 1 FROM additional_fees WHERE receipt_id = ?1
                 UNION SELECT 1 FROM fee_accounts WHERE admission_receipt_id = ?1",
                [&candidate],
                |r| r.get(0),
            )
            .optional()?;
        if taken.is_none() {
            return Ok(candidate);
        }
    }
    Err(FeeError::Internal(
        "could not allocate a unique receipt id".to_string(),
    ))
}

fn account_id_for(conn: &Connection, admission_id: &str) -> Result<String, FeeError> {
    conn.query_row(
        "SELECT id FROM fee_accounts WHERE admission_id = ?",
        [admission_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| FeeError::AccountNotFound(admission_id.to_string()))
}

fn load_admission_fees(conn: &Connection, account_id: &str) -> Result<AdmissionTimeFees, FeeError> {
    Ok(conn.query_row(
        "SELECT registration_fee, admission_fee, annual_charges,
                activity_fee, maintenance_fee, tuition_fee
         FROM fee_accounts WHERE id = ?",
        [account_id],
        |r| {
            Ok(AdmissionTimeFees {
                registration_fee: r.get(0)?,
                admission_fee: r.get(1)?,
                annual_charges: r.get(2)?,
                activity_fee: r.get(3)?,
                maintenance_fee: r.get(4)?,
                tuition_fee: r.get(5)?,
            })
        },
    )?)
}

pub(crate) fn load_payments(
    conn: &Connection,
    account_id: &str,
) -> Result<Vec<PaymentEntry>, FeeError> {
    let mut stmt = conn.prepare(
        "SELECT receipt_id, year, months_paid, amount_per_month, total_amount,
                payment_method, payment_date, status, remarks, created_by
         FROM monthly_payments
         WHERE account_id = ?
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map([account_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i32>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, f64>(3)?,
                r.get::<_, f64>(4)?,
                r.get::<_, String>(5)?,
                r.get::<_, String>(6)?,
                r.get::<_, String>(7)?,
                r.get::<_, Option<String>>(8)?,
                r.get::<_, Option<String>>(9)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    rows.into_iter()
        .map(
            |(
                receipt_id,
                year,
                months_json,
                amount_per_month,
                total_amount,
                payment_method,
                payment_date,
                status,
                remarks,
                created_by,
            )| {
                let months_paid: Vec<String> = serde_json::from_str(&months_json).map_err(|e| {
                    FeeError::Internal(format!(
                        "invalid months_paid for receipt {}: {}",
                        receipt_id, e
                    ))
                })?;
                Ok(PaymentEntry {
                    receipt_id,
                    year,
                    months_paid,
                    amount_per_month,
                    total_amount,
                    payment_method,
                    payment_date,
                    status,
                    remarks,
                    created_by,
                })
            },
        )
        .collect()
}

fn load_additional(conn: &Connection, account_id: &str) -> Result<Vec<AdditionalFeeEntry>, FeeError> {
    let mut stmt = conn.prepare(
        "SELECT receipt_id, fee_type, amount, description, due_date,
                paid_date, payment_method, status
         FROM additional_fees
         WHERE account_id = ?
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map([account_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, f64>(2)?,
                r.get::<_, Option<String>>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, Option<String>>(5)?,
                r.get::<_, Option<String>>(6)?,
                r.get::<_, String>(7)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;

    rows.into_iter()
        .map(
            |(receipt_id, fee_type, amount, description, due_date, paid_date, payment_method, status_raw)| {
                let status = AdditionalFeeStatus::parse(&status_raw).ok_or_else(|| {
                    FeeError::Internal(format!(
                        "invalid additional fee status '{}' for receipt {}",
                        status_raw, receipt_id
                    ))
                })?;
                Ok(AdditionalFeeEntry {
                    receipt_id,
                    fee_type,
                    amount,
                    description,
                    due_date,
                    paid_date,
                    payment_method,
                    status,
                })
            },
        )
        .collect()
}

fn recompute_and_persist(
    conn: &Connection,
    account_id: &str,
    today: NaiveDate,
    now: &str,
) -> Result<(), FeeError> {
    let admission_fees = load_admission_fees(conn, account_id)?;
    let payments = load_payments(conn, account_id)?;
    let additional = load_additional(conn, account_id)?;
    let summary = ledger::compute_summary(&admission_fees, &payments, &additional, today);
    persist_summary(conn, account_id, &summary, now)
}

fn persist_summary(
    conn: &Connection,
    account_id: &str,
    summary: &FeeSummary,
    now: &str,
) -> Result<(), FeeError> {
    conn.execute(
        "UPDATE fee_accounts
         SET admission_fees_paid = ?,
             total_admission_fees = ?,
             total_monthly_fees_paid = ?,
             total_additional_fees = ?,
             grand_total = ?,
             last_payment_date = ?,
             monthly_fees_status = ?,
             updated_at = ?
         WHERE id = ?",
        params![
            summary.total_admission_fees > 0.0,
            summary.total_admission_fees,
            summary.total_monthly_fees_paid,
            summary.total_additional_fees,
            summary.grand_total,
            summary.last_payment_date,
            summary.monthly_fees_status,
            now,
            account_id,
        ],
    )?;
    Ok(())
}

struct AccountRow {
    id: String,
    admission_id: String,
    student_name: String,
    class_name: Option<String>,
    father_name: Option<String>,
    contact_phone: Option<String>,
    contact_address: Option<String>,
    academic_year: String,
    status: String,
    monthly_fee_amount: f64,
    admission_time_fees: AdmissionTimeFees,
    admission_receipt_id: Option<String>,
    admission_fees_paid: bool,
    total_admission_fees: f64,
    total_monthly_fees_paid: f64,
    total_additional_fees: f64,
    grand_total: f64,
    last_payment_date: Option<String>,
    monthly_fees_status: String,
    created_at: String,
    updated_at: Option<String>,
}

fn account_row(
    conn: &Connection,
    where_clause: &str,
    binds: &[Value],
) -> Result<Vec<AccountRow>, FeeError> {
    let sql = format!(
        "SELECT id, admission_id, student_name, class_name, father_name,
                contact_phone, contact_address, academic_year, status,
                monthly_fee_amount, registration_fee, admission_fee,
                annual_charges, activity_fee, maintenance_fee, tuition_fee,
                admission_receipt_id, admission_fees_paid,
                total_admission_fees, total_monthly_fees_paid,
                total_additional_fees, grand_total, last_payment_date,
                monthly_fees_status, created_at, updated_at
         FROM fee_accounts
         WHERE {}
         ORDER BY student_name, admission_id",
        where_clause
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(binds.iter().cloned()), |r| {
            Ok(AccountRow {
                id: r.get(0)?,
                admission_id: r.get(1)?,
                student_name: r.get(2)?,
                class_name: r.get(3)?,
                father_name: r.get(4)?,
                contact_phone: r.get(5)?,
                contact_address: r.get(6)?,
                academic_year: r.get(7)?,
                status: r.get(8)?,
                monthly_fee_amount: r.get(9)?,
                admission_time_fees: AdmissionTimeFees {
                    registration_fee: r.get(10)?,
                    admission_fee: r.get(11)?,
                    annual_charges: r.get(12)?,
                    activity_fee: r.get(13)?,
                    maintenance_fee: r.get(14)?,
                    tuition_fee: r.get(15)?,
                },
                admission_receipt_id: r.get(16)?,
                admission_fees_paid: r.get::<_, i64>(17)? != 0,
                total_admission_fees: r.get(18)?,
                total_monthly_fees_paid: r.get(19)?,
                total_additional_fees: r.get(20)?,
                grand_total: r.get(21)?,
                last_payment_date: r.get(22)?,
                monthly_fees_status: r.get(23)?,
                created_at: r.get(24)?,
                updated_at: r.get(25)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

fn assemble_account(
    conn: &Connection,
    row: AccountRow,
    today: NaiveDate,
) -> Result<FeeAccount, FeeError> {
    let payments = load_payments(conn, &row.id)?;
    let mut additional = load_additional(conn, &row.id)?;
    for entry in &mut additional {
        entry.status = ledger::effective_additional_status(entry, today);
    }
    let status = AccountStatus::parse(&row.status).ok_or_else(|| {
        FeeError::Internal(format!(
            "invalid account status '{}' for admission {}",
            row.status, row.admission_id
        ))
    })?;

    Ok(FeeAccount {
        admission_id: row.admission_id,
        student_name: row.student_name,
        class_name: row.class_name,
        father_name: row.father_name,
        contact_phone: row.contact_phone,
        contact_address: row.contact_address,
        academic_year: row.academic_year,
        status,
        monthly_fee_amount: row.monthly_fee_amount,
        admission_time_fees: row.admission_time_fees,
        admission_receipt_id: row.admission_receipt_id,
        admission_fees_paid: row.admission_fees_paid,
        monthly_payments: payments,
        additional_fees: additional,
        fee_summary: FeeSummary {
            total_admission_fees: row.total_admission_fees,
            total_monthly_fees_paid: row.total_monthly_fees_paid,
            total_additional_fees: row.total_additional_fees,
            grand_total: row.grand_total,
            last_payment_date: row.last_payment_date,
            monthly_fees_status: row.monthly_fees_status,
        },
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
