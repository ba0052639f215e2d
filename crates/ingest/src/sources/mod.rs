//! Per-source staging: each module turns one payment processor's raw
//! export/response into a [`crate::types::StagedBatch`].

pub mod asto;
pub mod bionio;
pub mod eliq;
pub mod rovema;

pub use eliq::EliqClient;
