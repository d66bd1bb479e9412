//! Client-side orchestration and state sync for a compliance-gated privacy DeFi ledger.
//!
//! The crate drives mutating ledger operations from proof generation through
//! confirmation, keeps a local snapshot of the connected account consistent with the
//! ledger, and reports every outcome as a single short-lived notification.

pub mod client;
pub mod config;
pub mod events;
pub mod ledger;
pub mod notification;
pub mod proof;
pub mod session;
pub mod sync;
pub mod transaction;
pub mod utils;

pub use client::{ComplianceClient, ComplianceClientBuilder};
pub use config::{ClientConfig, ConfigError};
