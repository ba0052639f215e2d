//! Database schema definitions

/// SQL to create all tables
/// NOTE: All monetary amounts stored as TEXT to preserve rust_decimal::Decimal precision
pub const CREATE_TABLES: &str = r#"
-- Accounts: consultant -> manager two-level hierarchy, email is the login key
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    role TEXT NOT NULL DEFAULT 'consultant',
    manager_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Clients keyed by CNPJ -- the consultant's manager is denormalized for roll-ups
CREATE TABLE IF NOT EXISTS clients (
    cnpj TEXT PRIMARY KEY,
    client_name TEXT NOT NULL,
    consultant_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    manager_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Sales fact table. (source, raw_id) is the import idempotency key;
-- client/consultant/manager stay NULL for orphan sales until assignment.
CREATE TABLE IF NOT EXISTS sales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    raw_id TEXT NOT NULL,
    client_cnpj TEXT REFERENCES clients(cnpj),
    consultant_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    manager_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    date TEXT NOT NULL,
    revenue_gross TEXT NOT NULL DEFAULT '0',
    revenue_net TEXT NOT NULL DEFAULT '0',
    volume TEXT,
    product_name TEXT NOT NULL DEFAULT '',
    product_detail TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT '',
    raw_client_name TEXT NOT NULL DEFAULT '',
    raw_client_cnpj TEXT NOT NULL DEFAULT '',
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now')),
    UNIQUE (source, raw_id)
);

-- One revenue target per (user, year, month)
CREATE TABLE IF NOT EXISTS goals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    target_value TEXT NOT NULL DEFAULT '0',
    UNIQUE (user_id, year, month)
);

-- Commission percentage applied to net revenue, one rule per source
CREATE TABLE IF NOT EXISTS commission_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_name TEXT NOT NULL,
    source TEXT NOT NULL UNIQUE,
    percentage TEXT NOT NULL DEFAULT '0',
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Append-only audit trail for user and import actions
CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
    timestamp INTEGER DEFAULT (strftime('%s', 'now')),
    action TEXT NOT NULL,
    details TEXT
);

-- Refresh-token sessions -- only the SHA-256 hash of the token is stored
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash TEXT NOT NULL UNIQUE,
    expires_at INTEGER NOT NULL,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
CREATE INDEX IF NOT EXISTS idx_users_manager ON users(manager_id);
CREATE INDEX IF NOT EXISTS idx_sales_source ON sales(source);
CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(date);
CREATE INDEX IF NOT EXISTS idx_sales_consultant ON sales(consultant_id);
CREATE INDEX IF NOT EXISTS idx_sales_raw_cnpj ON sales(raw_client_cnpj);
CREATE INDEX IF NOT EXISTS idx_goals_period ON goals(year, month);
CREATE INDEX IF NOT EXISTS idx_audit_action ON audit_logs(action);
CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_logs(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)
"#;

/// ALTER TABLE migrations for databases created before a column existed.
/// "duplicate column name" errors are tolerated on re-run.
pub const MIGRATIONS: &[&str] = &[
    // Bionio exports carry a payment type column the other sources lack
    "ALTER TABLE sales ADD COLUMN payment_type TEXT NOT NULL DEFAULT ''",
];
