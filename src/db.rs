use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "feebook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fee_accounts(
            id TEXT PRIMARY KEY,
            admission_id TEXT NOT NULL UNIQUE,
            student_name TEXT NOT NULL,
            class_name TEXT,
            father_name TEXT,
            contact_phone TEXT,
            contact_address TEXT,
            academic_year TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Active',
            monthly_fee_amount REAL NOT NULL DEFAULT 0,
            registration_fee REAL NOT NULL DEFAULT 0,
            admission_fee REAL NOT NULL DEFAULT 0,
            annual_charges REAL NOT NULL DEFAULT 0,
            activity_fee REAL NOT NULL DEFAULT 0,
            maintenance_fee REAL NOT NULL DEFAULT 0,
            tuition_fee REAL NOT NULL DEFAULT 0,
            admission_receipt_id TEXT UNIQUE,
            admission_fees_paid INTEGER NOT NULL DEFAULT 0,
            total_admission_fees REAL NOT NULL DEFAULT 0,
            total_monthly_fees_paid REAL NOT NULL DEFAULT 0,
            total_additional_fees REAL NOT NULL DEFAULT 0,
            grand_total REAL NOT NULL DEFAULT 0,
            last_payment_date TEXT,
            monthly_fees_status TEXT NOT NULL DEFAULT 'Pending',
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fee_accounts_status ON fee_accounts(status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fee_accounts_academic_year ON fee_accounts(academic_year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fee_accounts_class ON fee_accounts(class_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS monthly_payments(
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            receipt_id TEXT NOT NULL UNIQUE,
            year INTEGER NOT NULL,
            months_paid TEXT NOT NULL,
            amount_per_month REAL NOT NULL,
            total_amount REAL NOT NULL,
            payment_method TEXT NOT NULL DEFAULT 'Cash',
            payment_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Completed',
            remarks TEXT,
            created_by TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES fee_accounts(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monthly_payments_account ON monthly_payments(account_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_monthly_payments_year ON monthly_payments(year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS additional_fees(
            id TEXT PRIMARY KEY,
            account_id TEXT NOT NULL,
            receipt_id TEXT NOT NULL UNIQUE,
            fee_type TEXT NOT NULL,
            amount REAL NOT NULL,
            description TEXT,
            due_date TEXT NOT NULL,
            paid_date TEXT,
            payment_method TEXT,
            status TEXT NOT NULL DEFAULT 'Pending',
            created_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES fee_accounts(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_additional_fees_account ON additional_fees(account_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_additional_fees_status ON additional_fees(status)",
        [],
    )?;

    Ok(conn)
}
