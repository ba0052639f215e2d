//! HTTP handlers, one module per view family

pub mod auth;
pub mod clients;
pub mod commission;
pub mod dashboard;
pub mod goals;
pub mod imports;
pub mod portfolio;
pub mod users;
