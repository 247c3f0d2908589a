use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Canonical month names, in calendar order. `monthsPaid` sets and report
/// parameters only ever contain these exact strings.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

pub const STATUS_UP_TO_DATE: &str = "Up to Date";
pub const STATUS_PENDING: &str = "Pending";

/// Case-insensitive lookup returning the canonical spelling.
pub fn normalize_month(raw: &str) -> Option<&'static str> {
    let t = raw.trim();
    MONTH_NAMES
        .iter()
        .find(|m| m.eq_ignore_ascii_case(t))
        .copied()
}

pub fn current_month_name(today: NaiveDate) -> &'static str {
    MONTH_NAMES[today.month0() as usize]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountStatus {
    Active,
    Inactive,
    Transferred,
    Graduated,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "Active",
            AccountStatus::Inactive => "Inactive",
            AccountStatus::Transferred => "Transferred",
            AccountStatus::Graduated => "Graduated",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(AccountStatus::Active),
            "inactive" => Some(AccountStatus::Inactive),
            "transferred" => Some(AccountStatus::Transferred),
            "graduated" => Some(AccountStatus::Graduated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdditionalFeeStatus {
    Pending,
    Paid,
    Overdue,
}

impl AdditionalFeeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AdditionalFeeStatus::Pending => "Pending",
            AdditionalFeeStatus::Paid => "Paid",
            AdditionalFeeStatus::Overdue => "Overdue",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(AdditionalFeeStatus::Pending),
            "paid" => Some(AdditionalFeeStatus::Paid),
            "overdue" => Some(AdditionalFeeStatus::Overdue),
            _ => None,
        }
    }
}

/// One-time charges collected at admission. Missing fields parse as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdmissionTimeFees {
    pub registration_fee: f64,
    pub admission_fee: f64,
    pub annual_charges: f64,
    pub activity_fee: f64,
    pub maintenance_fee: f64,
    pub tuition_fee: f64,
}

impl AdmissionTimeFees {
    pub fn total(&self) -> f64 {
        self.registration_fee
            + self.admission_fee
            + self.annual_charges
            + self.activity_fee
            + self.maintenance_fee
            + self.tuition_fee
    }

    pub fn all_non_negative(&self) -> bool {
        [
            self.registration_fee,
            self.admission_fee,
            self.annual_charges,
            self.activity_fee,
            self.maintenance_fee,
            self.tuition_fee,
        ]
        .iter()
        .all(|v| *v >= 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntry {
    pub receipt_id: String,
    pub year: i32,
    pub months_paid: Vec<String>,
    pub amount_per_month: f64,
    pub total_amount: f64,
    pub payment_method: String,
    /// ISO `YYYY-MM-DD`.
    pub payment_date: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFeeEntry {
    pub receipt_id: String,
    pub fee_type: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub due_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    pub status: AdditionalFeeStatus,
}

/// Derived view of an account's ledger. Never written by callers; the
/// service recomputes it before every persist.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSummary {
    pub total_admission_fees: f64,
    pub total_monthly_fees_paid: f64,
    pub total_additional_fees: f64,
    pub grand_total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_date: Option<String>,
    pub monthly_fees_status: String,
}

fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Recompute the full summary from the three source collections. Pure:
/// `today` is passed in so the result is a function of its arguments alone.
pub fn compute_summary(
    admission: &AdmissionTimeFees,
    payments: &[PaymentEntry],
    additional: &[AdditionalFeeEntry],
    today: NaiveDate,
) -> FeeSummary {
    let total_admission_fees = admission.total();
    let total_monthly_fees_paid: f64 = payments.iter().map(|p| p.total_amount).sum();
    let total_additional_fees: f64 = additional
        .iter()
        .filter(|f| f.status == AdditionalFeeStatus::Paid)
        .map(|f| f.amount)
        .sum();

    let mut last_payment: Option<NaiveDate> = None;
    for d in payments
        .iter()
        .map(|p| p.payment_date.as_str())
        .chain(
            additional
                .iter()
                .filter(|f| f.status == AdditionalFeeStatus::Paid)
                .filter_map(|f| f.paid_date.as_deref()),
        )
        .filter_map(parse_iso_date)
    {
        last_payment = Some(match last_payment {
            Some(prev) if prev >= d => prev,
            _ => d,
        });
    }

    let covered = months_paid_for_year(payments, today.year());
    let monthly_fees_status = if covered.contains(current_month_name(today)) {
        STATUS_UP_TO_DATE.to_string()
    } else {
        STATUS_PENDING.to_string()
    };

    FeeSummary {
        total_admission_fees,
        total_monthly_fees_paid,
        total_additional_fees,
        grand_total: total_admission_fees + total_monthly_fees_paid + total_additional_fees,
        last_payment_date: last_payment.map(|d| d.format("%Y-%m-%d").to_string()),
        monthly_fees_status,
    }
}

/// Union of `monthsPaid` across every payment entry for `year`.
pub fn months_paid_for_year(payments: &[PaymentEntry], year: i32) -> BTreeSet<&str> {
    payments
        .iter()
        .filter(|p| p.year == year)
        .flat_map(|p| p.months_paid.iter().map(String::as_str))
        .collect()
}

/// Requested months that are already covered for `year`, in canonical
/// calendar order. Non-empty means the append must be rejected.
pub fn conflicting_months(payments: &[PaymentEntry], year: i32, requested: &[String]) -> Vec<String> {
    let covered = months_paid_for_year(payments, year);
    MONTH_NAMES
        .iter()
        .filter(|m| requested.iter().any(|r| r == *m) && covered.contains(**m))
        .map(|m| m.to_string())
        .collect()
}

/// The twelve canonical months minus the covered set, in calendar order.
pub fn pending_months(covered: &BTreeSet<&str>) -> Vec<String> {
    MONTH_NAMES
        .iter()
        .filter(|m| !covered.contains(**m))
        .map(|m| m.to_string())
        .collect()
}

/// Lazy overdue evaluation: a Pending entry whose due date has passed reads
/// as Overdue. The stored status stays Pending until the fee is marked paid.
pub fn effective_additional_status(
    entry: &AdditionalFeeEntry,
    today: NaiveDate,
) -> AdditionalFeeStatus {
    if entry.status == AdditionalFeeStatus::Pending {
        if let Some(due) = parse_iso_date(&entry.due_date) {
            if due < today {
                return AdditionalFeeStatus::Overdue;
            }
        }
    }
    entry.status
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn payment(year: i32, months: &[&str], total: f64, paid_on: &str) -> PaymentEntry {
        PaymentEntry {
            receipt_id: format!("MFR-{}-{}", year, months.join("")),
            year,
            months_paid: months.iter().map(|m| m.to_string()).collect(),
            amount_per_month: total / months.len() as f64,
            total_amount: total,
            payment_method: "Cash".to_string(),
            payment_date: paid_on.to_string(),
            status: "Completed".to_string(),
            remarks: None,
            created_by: None,
        }
    }

    fn additional(amount: f64, status: AdditionalFeeStatus, paid: Option<&str>) -> AdditionalFeeEntry {
        AdditionalFeeEntry {
            receipt_id: "AFR000001001".to_string(),
            fee_type: "Transport".to_string(),
            amount,
            description: None,
            due_date: "2024-03-01".to_string(),
            paid_date: paid.map(|d| d.to_string()),
            payment_method: None,
            status,
        }
    }

    #[test]
    fn normalize_month_is_case_insensitive() {
        assert_eq!(normalize_month("january"), Some("January"));
        assert_eq!(normalize_month(" FEBRUARY "), Some("February"));
        assert_eq!(normalize_month("Febuary"), None);
    }

    #[test]
    fn grand_total_sums_three_components() {
        let admission = AdmissionTimeFees {
            registration_fee: 500.0,
            admission_fee: 2000.0,
            tuition_fee: 1000.0,
            ..Default::default()
        };
        let payments = vec![payment(2024, &["January", "February"], 2000.0, "2024-02-05")];
        let extras = vec![
            additional(300.0, AdditionalFeeStatus::Paid, Some("2024-03-10")),
            additional(999.0, AdditionalFeeStatus::Pending, None),
        ];

        let s = compute_summary(&admission, &payments, &extras, date(2024, 3, 15));
        assert_eq!(s.total_admission_fees, 3500.0);
        assert_eq!(s.total_monthly_fees_paid, 2000.0);
        assert_eq!(s.total_additional_fees, 300.0);
        assert_eq!(s.grand_total, 5800.0);
    }

    #[test]
    fn pending_and_overdue_additional_fees_are_excluded_from_totals() {
        let extras = vec![
            additional(100.0, AdditionalFeeStatus::Pending, None),
            additional(200.0, AdditionalFeeStatus::Overdue, None),
            additional(50.0, AdditionalFeeStatus::Paid, Some("2024-01-20")),
        ];
        let s = compute_summary(&AdmissionTimeFees::default(), &[], &extras, date(2024, 2, 1));
        assert_eq!(s.total_additional_fees, 50.0);
        assert_eq!(s.grand_total, 50.0);
    }

    #[test]
    fn last_payment_date_is_max_across_payments_and_paid_extras() {
        let payments = vec![
            payment(2024, &["January"], 1000.0, "2024-01-05"),
            payment(2024, &["February"], 1000.0, "2024-02-05"),
        ];
        let extras = vec![additional(300.0, AdditionalFeeStatus::Paid, Some("2024-04-10"))];
        let s = compute_summary(&AdmissionTimeFees::default(), &payments, &extras, date(2024, 4, 15));
        assert_eq!(s.last_payment_date.as_deref(), Some("2024-04-10"));

        let none = compute_summary(&AdmissionTimeFees::default(), &[], &[], date(2024, 4, 15));
        assert_eq!(none.last_payment_date, None);
    }

    #[test]
    fn unparseable_dates_are_ignored_for_last_payment() {
        let mut p = payment(2024, &["January"], 1000.0, "not-a-date");
        p.receipt_id = "MFR-x".to_string();
        let s = compute_summary(&AdmissionTimeFees::default(), &[p], &[], date(2024, 1, 20));
        assert_eq!(s.last_payment_date, None);
    }

    #[test]
    fn monthly_status_tracks_current_month_coverage() {
        let payments = vec![payment(2024, &["January", "February"], 2000.0, "2024-01-05")];
        let feb = compute_summary(&AdmissionTimeFees::default(), &payments, &[], date(2024, 2, 20));
        assert_eq!(feb.monthly_fees_status, STATUS_UP_TO_DATE);

        let mar = compute_summary(&AdmissionTimeFees::default(), &payments, &[], date(2024, 3, 1));
        assert_eq!(mar.monthly_fees_status, STATUS_PENDING);

        // Coverage is per calendar year.
        let next_jan = compute_summary(&AdmissionTimeFees::default(), &payments, &[], date(2025, 1, 10));
        assert_eq!(next_jan.monthly_fees_status, STATUS_PENDING);
    }

    #[test]
    fn summary_is_idempotent() {
        let admission = AdmissionTimeFees {
            admission_fee: 2500.0,
            ..Default::default()
        };
        let payments = vec![payment(2024, &["June"], 1200.0, "2024-06-02")];
        let extras = vec![additional(80.0, AdditionalFeeStatus::Paid, Some("2024-06-20"))];
        let today = date(2024, 6, 25);
        let a = compute_summary(&admission, &payments, &extras, today);
        let b = compute_summary(&admission, &payments, &extras, today);
        assert_eq!(a, b);
    }

    #[test]
    fn conflicting_months_reports_overlap_only() {
        let payments = vec![payment(2024, &["January", "February"], 2000.0, "2024-02-05")];
        let conflicts = conflicting_months(
            &payments,
            2024,
            &["February".to_string(), "March".to_string()],
        );
        assert_eq!(conflicts, vec!["February".to_string()]);

        // A different year never conflicts.
        let clear = conflicting_months(&payments, 2025, &["February".to_string()]);
        assert!(clear.is_empty());
    }

    #[test]
    fn pending_months_is_calendar_ordered_complement() {
        let payments = vec![payment(2024, &["March", "January"], 2000.0, "2024-03-05")];
        let covered = months_paid_for_year(&payments, 2024);
        let pending = pending_months(&covered);
        assert_eq!(pending.len(), 10);
        assert_eq!(pending[0], "February");
        assert_eq!(pending[1], "April");
        assert!(!pending.contains(&"January".to_string()));
        assert!(!pending.contains(&"March".to_string()));
    }

    #[test]
    fn overdue_is_evaluated_lazily_from_due_date() {
        let entry = additional(100.0, AdditionalFeeStatus::Pending, None);
        assert_eq!(
            effective_additional_status(&entry, date(2024, 2, 20)),
            AdditionalFeeStatus::Pending
        );
        assert_eq!(
            effective_additional_status(&entry, date(2024, 3, 2)),
            AdditionalFeeStatus::Overdue
        );

        let paid = additional(100.0, AdditionalFeeStatus::Paid, Some("2024-02-25"));
        assert_eq!(
            effective_additional_status(&paid, date(2024, 5, 1)),
            AdditionalFeeStatus::Paid
        );
    }
}
