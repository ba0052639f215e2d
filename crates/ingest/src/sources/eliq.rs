//! ELIQ (Uzzipay/Sigyo) REST client and staging
//!
//! Bearer-token API returning confirmed transactions for a date range.
//! Payloads are loosely typed: amounts arrive as strings or numbers, and
//! the client/product blocks may sit at the top level or nested under
//! `informacao` depending on the transaction kind.

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::normalize::{clean_cnpj, clean_json_value, parse_datetime_iso};
use crate::types::{StagedBatch, StagedSale};
use crate::{ImportError, ImportResult};

pub const SOURCE: &str = "ELIQ";

const API_TIMEOUT_SECS: u64 = 120;
const CONFIRMED_STATUS: &str = "confirmada";

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EliqParty {
    pub cnpj: Option<String>,
    pub nome: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EliqProduct {
    pub nome: Option<String>,
    pub categoria: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EliqInfo {
    pub cliente: Option<EliqParty>,
    pub produto: Option<EliqProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EliqTransaction {
    /// Numeric or string id depending on the endpoint version
    pub id: serde_json::Value,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data_cadastro: Option<String>,
    #[serde(default)]
    pub valor_total: Option<serde_json::Value>,
    #[serde(default)]
    pub valor_taxa_cliente: Option<serde_json::Value>,
    #[serde(default)]
    pub desconto: Option<serde_json::Value>,
    #[serde(default)]
    pub quantidade: Option<serde_json::Value>,
    #[serde(default)]
    pub cliente: Option<EliqParty>,
    #[serde(default)]
    pub produto: Option<EliqProduct>,
    #[serde(default)]
    pub informacao: Option<EliqInfo>,
}

impl EliqTransaction {
    fn client_block(&self) -> Option<&EliqParty> {
        self.cliente
            .as_ref()
            .or_else(|| self.informacao.as_ref().and_then(|i| i.cliente.as_ref()))
    }

    fn product_block(&self) -> Option<&EliqProduct> {
        self.produto
            .as_ref()
            .or_else(|| self.informacao.as_ref().and_then(|i| i.produto.as_ref()))
    }
}

// ---------------------------------------------------------------------------
// Client implementation
// ---------------------------------------------------------------------------

/// ELIQ transactions API client
#[derive(Clone)]
pub struct EliqClient {
    client: Client,
    base_url: String,
    token: String,
}

impl EliqClient {
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            token,
        }
    }

    /// Build a client from `ELIQ_API_URL` / `ELIQ_API_TOKEN`
    pub fn from_env() -> ImportResult<Self> {
        let base_url = std::env::var("ELIQ_API_URL")
            .map_err(|_| ImportError::Credentials("ELIQ_API_URL not set".to_string()))?;
        let token = std::env::var("ELIQ_API_TOKEN")
            .map_err(|_| ImportError::Credentials("ELIQ_API_TOKEN not set".to_string()))?;
        Ok(Self::new(base_url, token))
    }

    /// GET transactions registered inside the inclusive date range
    pub async fn fetch_transactions(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ImportResult<Vec<EliqTransaction>> {
        let range = format!("{} - {}", start.format("%d/%m/%Y"), end.format("%d/%m/%Y"));
        debug!(url = %self.base_url, range = %range, "Fetching ELIQ transactions");

        let resp = self
            .client
            .get(&self.base_url)
            .bearer_auth(&self.token)
            .query(&[("TransacaoSearch[data_cadastro]", range.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ImportError::Timeout(API_TIMEOUT_SECS)
                } else {
                    ImportError::Http(e)
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ImportError::Api { status, body });
        }

        let transactions: Vec<EliqTransaction> = resp.json().await?;
        debug!(count = transactions.len(), "ELIQ transactions fetched");
        Ok(transactions)
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

fn doc_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => format!("ELIQ_{s}"),
        other => format!("ELIQ_{other}"),
    }
}

/// Stage confirmed transactions from an API response
pub fn stage(transactions: &[EliqTransaction]) -> StagedBatch {
    let rows_found = transactions.len();
    let mut rows_processed = 0;
    let mut staged = Vec::new();

    for tx in transactions {
        if tx.status.as_deref() != Some(CONFIRMED_STATUS) {
            continue;
        }
        rows_processed += 1;

        let Some(party) = tx.client_block() else {
            continue;
        };
        let Some(cnpj) = party.cnpj.as_deref().and_then(clean_cnpj) else {
            continue;
        };
        let Some(date) = tx.data_cadastro.as_deref().and_then(parse_datetime_iso) else {
            continue;
        };

        let revenue_gross = tx
            .valor_total
            .as_ref()
            .map(clean_json_value)
            .unwrap_or_default();
        // The reseller's cut: fee column when present, discount otherwise;
        // either may arrive negative
        let revenue_net = tx
            .valor_taxa_cliente
            .as_ref()
            .or(tx.desconto.as_ref())
            .map(clean_json_value)
            .unwrap_or_default()
            .abs();
        let volume = tx.quantidade.as_ref().map(clean_json_value);
        let product = tx.product_block();

        staged.push(StagedSale {
            raw_id: doc_id(&tx.id),
            cnpj,
            client_name: party.nome.clone().unwrap_or_else(|| "N/A".to_string()),
            date,
            revenue_gross,
            revenue_net,
            volume,
            product_name: product
                .and_then(|p| p.nome.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            product_detail: product
                .and_then(|p| p.categoria.clone())
                .unwrap_or_else(|| "N/A".to_string()),
            payment_type: String::new(),
            status: CONFIRMED_STATUS.to_string(),
        });
    }

    StagedBatch {
        source: SOURCE,
        rows_found,
        rows_processed,
        staged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse_payload(json: &str) -> Vec<EliqTransaction> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_stage_confirmed_only() {
        let payload = parse_payload(
            r#"[
                {"id": 10, "status": "confirmada", "data_cadastro": "2025-02-01 08:00:00",
                 "valor_total": "1.200,00", "valor_taxa_cliente": "-36,00", "quantidade": 400,
                 "cliente": {"cnpj": "12.345.678/0001-95", "nome": "Posto Alfa"},
                 "produto": {"nome": "Diesel S10", "categoria": "Combustível"}},
                {"id": 11, "status": "cancelada", "data_cadastro": "2025-02-01 09:00:00",
                 "valor_total": "500,00",
                 "cliente": {"cnpj": "12.345.678/0001-95", "nome": "Posto Alfa"}}
            ]"#,
        );
        let batch = stage(&payload);

        assert_eq!(batch.rows_found, 2);
        assert_eq!(batch.rows_processed, 1);
        assert_eq!(batch.staged.len(), 1);

        let sale = &batch.staged[0];
        assert_eq!(sale.raw_id, "ELIQ_10");
        assert_eq!(sale.cnpj, "12345678000195");
        assert_eq!(sale.revenue_gross, dec!(1200));
        // Negative fee becomes a positive net
        assert_eq!(sale.revenue_net, dec!(36));
        assert_eq!(sale.volume, Some(dec!(400)));
        assert_eq!(sale.product_detail, "Combustível");
    }

    #[test]
    fn test_stage_nested_client_block() {
        let payload = parse_payload(
            r#"[
                {"id": "ab-12", "status": "confirmada", "data_cadastro": "2025-02-02 10:30:00",
                 "valor_total": 800.5, "desconto": "24,00",
                 "informacao": {"cliente": {"cnpj": "98765432000110", "nome": "Posto Beta"},
                                "produto": {"nome": "Arla 32", "categoria": "Aditivo"}}}
            ]"#,
        );
        let batch = stage(&payload);

        assert_eq!(batch.staged.len(), 1);
        let sale = &batch.staged[0];
        assert_eq!(sale.raw_id, "ELIQ_ab-12");
        assert_eq!(sale.revenue_gross, dec!(800.5));
        // Falls back to the discount column when the fee is absent
        assert_eq!(sale.revenue_net, dec!(24));
        assert_eq!(sale.client_name, "Posto Beta");
    }

    #[test]
    fn test_stage_skips_missing_client_or_date() {
        let payload = parse_payload(
            r#"[
                {"id": 20, "status": "confirmada", "data_cadastro": "2025-02-03 11:00:00",
                 "valor_total": "100,00"},
                {"id": 21, "status": "confirmada",
                 "cliente": {"cnpj": "12345678000195", "nome": "Posto Alfa"},
                 "valor_total": "100,00"}
            ]"#,
        );
        let batch = stage(&payload);

        assert_eq!(batch.rows_processed, 2);
        assert!(batch.staged.is_empty());
    }
}
