//! Repository implementations for database operations

pub mod audit;
pub mod clients;
pub mod commission;
pub mod goals;
pub mod sales;
pub mod sessions;
pub mod users;

pub use audit::*;
pub use clients::*;
pub use commission::*;
pub use goals::*;
pub use sales::*;
pub use sessions::*;
pub use users::*;
