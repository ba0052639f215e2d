//! Shared domain types for ingestion and role gating

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Access role of a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Consultant,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Consultant => "consultant",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "consultant" => Some(Role::Consultant),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sale row staged from a source batch, not yet attributed or persisted.
/// `raw_id` is the synthetic per-source document id used for dedup/idempotency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedSale {
    pub raw_id: String,
    /// Normalized 14-digit CNPJ
    pub cnpj: String,
    pub client_name: String,
    pub date: NaiveDateTime,
    pub revenue_gross: Decimal,
    pub revenue_net: Decimal,
    pub volume: Option<Decimal>,
    pub product_name: String,
    pub product_detail: String,
    pub payment_type: String,
    pub status: String,
}

/// Output of a source's staging step, before attribution and upsert
#[derive(Debug, Clone)]
pub struct StagedBatch {
    pub source: &'static str,
    /// Every row/record the source returned
    pub rows_found: usize,
    /// Rows that passed the paid-status filter (skipped rows included)
    pub rows_processed: usize,
    /// Rows that survived per-row cleaning
    pub staged: Vec<StagedSale>,
}
