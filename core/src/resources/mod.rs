//! Typed services, one module per API resource.

pub mod account_transfers;
pub mod accounts;
pub mod ach_transfers;
pub mod cards;
pub mod entities;
pub mod shared;
pub mod simulations;
pub mod transactions;

pub use account_transfers::AccountTransferService;
pub use accounts::AccountService;
pub use ach_transfers::AchTransferService;
pub use cards::CardService;
pub use entities::EntityService;
pub use simulations::{SimulationAccountTransferService, SimulationAchTransferService, SimulationService};
pub use transactions::TransactionService;
