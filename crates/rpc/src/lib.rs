//! BillPay RPC - platform orchestrator
//!
//! This crate wires the financial services together and provides the CLI binary.

pub mod commands;
pub mod config;
pub mod context;
pub mod demo;
pub mod infrastructure;

pub use config::PlatformConfig;
pub use context::AppContext;
pub use infrastructure::{FinancialInfrastructure, HealthReport, InitializationReport};
