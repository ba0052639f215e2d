//! ASTO (Logpay) source — integration paused upstream
//!
//! None of the vendor's endpoints currently return an importable record:
//! the invoice endpoint omits the client CNPJ and the analytic transactions
//! endpoint 404s. The source is kept registered so commission rules and
//! import history keep rendering; running it imports nothing.

pub const SOURCE: &str = "ASTO";

/// Human-readable explanation shown by the CLI and stored in the audit entry
pub const MAINTENANCE_NOTICE: &str = "ASTO (Logpay) integration is paused: the invoice endpoint \
does not return the client CNPJ and the analytic transactions endpoint returns 404. Ask \
ASTO/Logpay support for an analytic endpoint exposing client CNPJ, amount, and date.";
