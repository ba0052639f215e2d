//! Rovema Pay CSV staging
//!
//! Card-acquirer export, `;`-delimited. Gross is the transaction amount
//! (`Bruto`), net is the reseller spread; one row per installment, so the
//! document id combines sale and installment ids.

use crate::normalize::{clean_cnpj, clean_value, parse_datetime_br};
use crate::types::{StagedBatch, StagedSale};
use crate::{ImportError, ImportResult};

pub const SOURCE: &str = "Rovema Pay";

const COL_STATUS: &str = "Status";
const COL_CNPJ: &str = "CNPJ";
const COL_DATE: &str = "Venda";
const COL_GROSS: &str = "Bruto";
const COL_NET: &str = "Spread";
const COL_SALE_ID: &str = "ID Venda";
const COL_INSTALLMENT_ID: &str = "ID Parcela";
const COL_NAME: &str = "EC";
const COL_TYPE: &str = "Tipo";
const COL_BRAND: &str = "Bandeira";

const PAID_STATUSES: &[&str] = &["Pago", "Antecipado"];

/// Stage a Rovema Pay CSV export
pub fn stage(content: &str) -> ImportResult<StagedBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ImportError::MissingColumn(name.to_string()))
    };
    let idx_status = col(COL_STATUS)?;
    let idx_cnpj = col(COL_CNPJ)?;
    let idx_date = col(COL_DATE)?;
    let idx_gross = col(COL_GROSS)?;
    let idx_net = col(COL_NET)?;
    let idx_sale = col(COL_SALE_ID)?;
    let idx_installment = col(COL_INSTALLMENT_ID)?;
    let idx_name = col(COL_NAME)?;
    let idx_type = col(COL_TYPE)?;
    let idx_brand = col(COL_BRAND)?;

    let mut rows_found = 0;
    let mut rows_processed = 0;
    let mut staged = Vec::new();

    for record in reader.records() {
        let record = record?;
        rows_found += 1;

        let status = record.get(idx_status).unwrap_or("").trim();
        if !PAID_STATUSES.contains(&status) {
            continue;
        }
        rows_processed += 1;

        let Some(cnpj) = clean_cnpj(record.get(idx_cnpj).unwrap_or("")) else {
            continue;
        };
        let Some(date) = parse_datetime_br(record.get(idx_date).unwrap_or("")) else {
            continue;
        };

        let sale_id = record.get(idx_sale).unwrap_or("").trim();
        let installment_id = record.get(idx_installment).unwrap_or("").trim();

        staged.push(StagedSale {
            raw_id: format!("ROVEMA_{sale_id}_{installment_id}"),
            cnpj,
            client_name: record.get(idx_name).unwrap_or("").trim().to_string(),
            date,
            revenue_gross: clean_value(record.get(idx_gross).unwrap_or("")),
            revenue_net: clean_value(record.get(idx_net).unwrap_or("")),
            volume: None,
            product_name: record.get(idx_type).unwrap_or("").trim().to_string(),
            product_detail: record.get(idx_brand).unwrap_or("").trim().to_string(),
            payment_type: String::new(),
            status: status.to_string(),
        });
    }

    Ok(StagedBatch {
        source: SOURCE,
        rows_found,
        rows_processed,
        staged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const HEADER: &str = "ID Venda;ID Parcela;Status;CNPJ;EC;Venda;Bruto;Spread;Tipo;Bandeira";

    #[test]
    fn test_stage_splits_gross_and_spread() {
        let csv = format!(
            "{HEADER}\n\
             500;1;Pago;12.345.678/0001-95;Posto Alfa;10/01/2025 09:15:00;R$ 1.000,00;R$ 12,50;Crédito;Visa\n\
             500;2;Antecipado;12.345.678/0001-95;Posto Alfa;10/01/2025 09:15:00;R$ 1.000,00;R$ 11,00;Crédito;Visa\n\
             501;1;Estornado;12.345.678/0001-95;Posto Alfa;11/01/2025 10:00:00;R$ 500,00;R$ 6,00;Débito;Master\n"
        );
        let batch = stage(&csv).unwrap();

        assert_eq!(batch.rows_found, 3);
        assert_eq!(batch.rows_processed, 2);
        assert_eq!(batch.staged.len(), 2);

        let first = &batch.staged[0];
        // Installments of the same sale get distinct document ids
        assert_eq!(first.raw_id, "ROVEMA_500_1");
        assert_eq!(batch.staged[1].raw_id, "ROVEMA_500_2");
        assert_eq!(first.revenue_gross, dec!(1000));
        assert_eq!(first.revenue_net, dec!(12.50));
        assert_eq!(first.product_detail, "Visa");
    }

    #[test]
    fn test_stage_requires_full_timestamp() {
        let csv = format!(
            "{HEADER}\n\
             600;1;Pago;12.345.678/0001-95;Posto Alfa;10/01/2025;R$ 100,00;R$ 1,00;Crédito;Visa\n"
        );
        let batch = stage(&csv).unwrap();
        // Date-only value does not match the Rovema timestamp format
        assert_eq!(batch.rows_processed, 1);
        assert!(batch.staged.is_empty());
    }
}
