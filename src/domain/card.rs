use super::account::AccountId;
use super::user::{PinHash, UserId};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const CARD_PIN_LENGTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub Uuid);

impl CardId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_label(label: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("card:{label}").as_bytes()))
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A payment card attached to one account.
///
/// The card PIN is independent of the holder's personal PIN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub account_id: AccountId,
    pub holder: UserId,
    pub masked_number: String,
    pub is_virtual: bool,
    pub is_blocked: bool,
    pub pin: PinHash,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn issue(
        id: CardId,
        account_id: AccountId,
        holder: UserId,
        is_virtual: bool,
        pin: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let pin = PinHash::digest(pin, CARD_PIN_LENGTH)?;
        let last_four = id.0.as_u128() % 10_000;
        Ok(Self {
            id,
            account_id,
            holder,
            masked_number: format!("**** **** **** {last_four:04}"),
            is_virtual,
            is_blocked: false,
            pin,
            created_at,
        })
    }

    pub fn pin_matches(&self, candidate: &str) -> bool {
        self.pin.matches(candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStep {
    Requested,
    Confirmed,
    Final,
}

/// A holder's request to block a card.
///
/// Blocking is irreversible for the holder, so the request must be
/// confirmed twice before it can be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRequest {
    pub card_id: CardId,
    pub requested_by: UserId,
    step: BlockStep,
}

impl BlockRequest {
    pub fn new(card_id: CardId, requested_by: UserId) -> Self {
        Self {
            card_id,
            requested_by,
            step: BlockStep::Requested,
        }
    }

    pub fn confirm(self) -> Self {
        let step = match self.step {
            BlockStep::Requested => BlockStep::Confirmed,
            BlockStep::Confirmed | BlockStep::Final => BlockStep::Final,
        };
        Self { step, ..self }
    }

    pub fn step(&self) -> BlockStep {
        self.step
    }

    pub fn is_final(&self) -> bool {
        self.step == BlockStep::Final
    }
}
