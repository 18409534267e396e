//! Application layer containing the back-office services.
//!
//! [`back_office::BackOffice`] is the primary entry point. It wires the
//! services in this module over the storage ports and exposes them to the
//! interfaces.

pub mod authority;
pub mod back_office;
pub mod beneficiaries;
pub mod cards;
pub mod credit;
pub mod ledger;
pub mod notifier;
pub mod overdraft;
pub mod pin;
pub mod rib;
pub mod sweep;
pub mod transfer;
pub mod users;

#[cfg(test)]
pub(crate) mod test_support;
