//! Dealership back office: repair orders through bank reconciliation.
//!
//! Flow of money through the crate:
//!   repair order → receipt → deposit batch → (bank feed) → matcher
//!   → suggested matches + exceptions → manual confirmation / resolution
//!
//! `engine::DeskEngine` wires a store, a tenant and the external
//! collaborators together and hands out the services.

pub mod analytics;
pub mod bank_transaction_service;
pub mod config;
pub mod dashboard;
pub mod deposit_batch_service;
pub mod engine;
pub mod error;
pub mod event;
pub mod exception_service;
pub mod explain;
pub mod forecast;
pub mod matcher;
pub mod model;
pub mod receipt_service;
pub mod reconciliation_service;
pub mod repair_order_service;
pub mod rng;
pub mod sequence;
pub mod store;
pub mod types;
