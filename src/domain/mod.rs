//! Domain layer: value objects, entities and the storage ports they flow
//! through.

pub mod account;
pub mod beneficiary;
pub mod card;
pub mod credit;
pub mod entry;
pub mod fee;
pub mod money;
pub mod notification;
pub mod ports;
pub mod rib;
pub mod transaction;
pub mod user;
