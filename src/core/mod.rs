//! Core business logic module
//!
//! This module contains the ledger's core components:
//! - `traits` - Store, unit-of-work and clock abstractions
//! - `engine` - Balance-affecting operations with ordered row locking
//! - `account_service` - Account creation, balances and history
//! - `validation` - Request checks that run before any unit of work
//! - `ledger` - Validated request layer over the engine and the service
//! - `batch_processor` - Concurrent replay over independent account lanes
//! - `audit` - Balance invariant and entry-shape check

pub mod account_service;
pub mod audit;
pub mod batch_processor;
pub mod engine;
pub mod ledger;
pub mod traits;
pub mod validation;

pub use account_service::AccountService;
pub use audit::{audit, AuditReport, BalanceMismatch};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::{lock_in_order, TransactionEngine, WorkPhase};
pub use ledger::Ledger;
pub use traits::{Clock, LedgerStore, ManualClock, SystemClock, UnitOfWork};
