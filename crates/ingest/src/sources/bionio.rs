//! Bionio CSV staging
//!
//! Bionio exports are `;`-delimited with Portuguese headers. Gross and net
//! are the same column (the order total); only transferred or scheduled-paid
//! orders count as sales.

use crate::normalize::{clean_cnpj, clean_value, parse_date_br};
use crate::types::{StagedBatch, StagedSale};
use crate::{ImportError, ImportResult};

pub const SOURCE: &str = "Bionio";

const COL_STATUS: &str = "Status do pedido";
const COL_CNPJ: &str = "CNPJ da organização";
const COL_DATE: &str = "Data do pagamento do pedido";
const COL_TOTAL: &str = "Valor total do pedido";
const COL_ORDER: &str = "Número do pedido";
const COL_NAME: &str = "Nome fantasia";
const COL_PRODUCT: &str = "Nome do benefício";
const COL_PAYMENT_TYPE: &str = "Tipo de pagamento";

const PAID_STATUSES: &[&str] = &["Transferido", "Pago e Agendado"];

/// Stage a Bionio CSV export. Rows with an unparseable date or no CNPJ
/// digits are skipped; a malformed file or missing column fails the run.
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
    let idx_total = col(COL_TOTAL)?;
    let idx_order = col(COL_ORDER)?;
    let idx_name = col(COL_NAME)?;
    let idx_product = col(COL_PRODUCT)?;
    let idx_payment = col(COL_PAYMENT_TYPE)?;

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
        let Some(date) = parse_date_br(record.get(idx_date).unwrap_or("")) else {
            continue;
        };

        let revenue = clean_value(record.get(idx_total).unwrap_or(""));
        let order = record.get(idx_order).unwrap_or("").trim();

        staged.push(StagedSale {
            raw_id: format!("BIONIO_{order}"),
            cnpj,
            client_name: record.get(idx_name).unwrap_or("").trim().to_string(),
            date,
            // Bionio reports a single order total
            revenue_gross: revenue,
            revenue_net: revenue,
            volume: None,
            product_name: record.get(idx_product).unwrap_or("").trim().to_string(),
            product_detail: String::new(),
            payment_type: record.get(idx_payment).unwrap_or("").trim().to_string(),
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

    const HEADER: &str = "Número do pedido;Status do pedido;CNPJ da organização;\
                          Nome fantasia;Data do pagamento do pedido;\
                          Valor total do pedido;Nome do benefício;Tipo de pagamento";

    #[test]
    fn test_stage_keeps_only_paid_statuses() {
        let csv = format!(
            "{HEADER}\n\
             1001;Transferido;12.345.678/0001-95;Posto Alfa;10/01/2025;R$ 1.500,00;Combustível;Pix\n\
             1002;Cancelado;12.345.678/0001-95;Posto Alfa;11/01/2025;R$ 900,00;Combustível;Pix\n\
             1003;Pago e Agendado;98.765.432/0001-10;Posto Beta;12/01/2025;R$ 2.000,50;Manutenção;Boleto\n"
        );
        let batch = stage(&csv).unwrap();

        assert_eq!(batch.rows_found, 3);
        assert_eq!(batch.rows_processed, 2);
        assert_eq!(batch.staged.len(), 2);

        let first = &batch.staged[0];
        assert_eq!(first.raw_id, "BIONIO_1001");
        assert_eq!(first.cnpj, "12345678000195");
        assert_eq!(first.revenue_gross, dec!(1500));
        // Bionio gross == net
        assert_eq!(first.revenue_net, dec!(1500));
        assert_eq!(first.payment_type, "Pix");
    }

    #[test]
    fn test_stage_skips_bad_rows_silently() {
        let csv = format!(
            "{HEADER}\n\
             2001;Transferido;;Sem CNPJ;10/01/2025;R$ 100,00;Benefício;Pix\n\
             2002;Transferido;11.222.333/0001-44;Data Ruim;not-a-date;R$ 100,00;Benefício;Pix\n\
             2003;Transferido;11.222.333/0001-44;Posto Gama;15/01/2025;R$ 300,00;Benefício;Pix\n"
        );
        let batch = stage(&csv).unwrap();

        assert_eq!(batch.rows_processed, 3);
        assert_eq!(batch.staged.len(), 1);
        assert_eq!(batch.staged[0].raw_id, "BIONIO_2003");
    }

    #[test]
    fn test_stage_missing_column_fails() {
        let csv = "Número do pedido;Status do pedido\n1;Transferido\n";
        let err = stage(csv).unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn(_)));
    }
}
