// Application layer - validation, orchestration and caller-facing views.
// Delivery layers (the CLI here, an HTTP API elsewhere) talk only to LedgerService.

pub mod config;
pub mod error;
pub mod requests;
pub mod service;
pub mod views;

pub use config::*;
pub use error::*;
pub use requests::*;
pub use service::*;
pub use views::*;
