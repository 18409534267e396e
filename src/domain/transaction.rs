use super::account::AccountId;
use super::money::{Amount, Balance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Transfer,
    Deposit,
    Withdrawal,
    Fee,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[default]
    Completed,
}

/// How a transaction looks from one viewer's set of accounts.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    Incoming,
    Outgoing,
    /// Both sides belong to the viewer.
    Internal,
    /// Neither side belongs to the viewer.
    Unrelated,
}

/// Immutable record of a completed money movement.
///
/// `amount` is always a positive magnitude; the sign shown to a user is
/// derived per viewer and never stored.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub from_account_id: Option<AccountId>,
    pub to_account_id: Option<AccountId>,
    pub amount: Amount,
    pub kind: TransactionKind,
    pub description: String,
    pub recipient_name: Option<String>,
    pub recipient_iban: Option<String>,
    pub sender_name: Option<String>,
    #[serde(default)]
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount: Amount,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            from_account_id: None,
            to_account_id: None,
            amount,
            kind,
            description: description.into(),
            recipient_name: None,
            recipient_iban: None,
            sender_name: None,
            status: TransactionStatus::Completed,
            created_at,
        }
    }

    pub fn from_account(mut self, account_id: AccountId) -> Self {
        self.from_account_id = Some(account_id);
        self
    }

    pub fn to_account(mut self, account_id: AccountId) -> Self {
        self.to_account_id = Some(account_id);
        self
    }

    pub fn touches(&self, account_id: AccountId) -> bool {
        self.from_account_id == Some(account_id) || self.to_account_id == Some(account_id)
    }

    /// Recomputes the direction from the viewer's account membership.
    pub fn direction_for(&self, viewer_accounts: &[AccountId]) -> Direction {
        let sends = self
            .from_account_id
            .is_some_and(|id| viewer_accounts.contains(&id));
        let receives = self
            .to_account_id
            .is_some_and(|id| viewer_accounts.contains(&id));
        match (sends, receives) {
            (true, true) => Direction::Internal,
            (true, false) => Direction::Outgoing,
            (false, true) => Direction::Incoming,
            (false, false) => Direction::Unrelated,
        }
    }

    /// Amount as seen by the viewer: negative when money left them.
    pub fn signed_amount_for(&self, viewer_accounts: &[AccountId]) -> Balance {
        match self.direction_for(viewer_accounts) {
            Direction::Outgoing => -Balance::from(self.amount),
            Direction::Incoming => Balance::from(self.amount),
            Direction::Internal | Direction::Unrelated => Balance::ZERO,
        }
    }

    /// Net effect of this transaction on one account's balance.
    pub fn delta_for(&self, account_id: AccountId) -> Balance {
        self.signed_amount_for(&[account_id])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn transfer(from: AccountId, to: AccountId) -> Transaction {
        Transaction::new(
            TransactionKind::Transfer,
            Amount::new(dec!(40.00)).unwrap(),
            "rent",
            Utc::now(),
        )
        .from_account(from)
        .to_account(to)
    }

    #[test]
    fn test_direction_is_relative_to_viewer() {
        let (a, b) = (AccountId::generate(), AccountId::generate());
        let tx = transfer(a, b);

        assert_eq!(tx.direction_for(&[a]), Direction::Outgoing);
        assert_eq!(tx.direction_for(&[b]), Direction::Incoming);
        assert_eq!(tx.direction_for(&[a, b]), Direction::Internal);
        assert_eq!(
            tx.direction_for(&[AccountId::generate()]),
            Direction::Unrelated
        );
    }

    #[test]
    fn test_signed_amount_for_viewer() {
        let (a, b) = (AccountId::generate(), AccountId::generate());
        let tx = transfer(a, b);

        assert_eq!(tx.signed_amount_for(&[a]), Balance::new(dec!(-40)));
        assert_eq!(tx.signed_amount_for(&[b]), Balance::new(dec!(40)));
        assert_eq!(tx.signed_amount_for(&[a, b]), Balance::ZERO);
        assert_eq!(tx.delta_for(a), Balance::new(dec!(-40)));
    }

    #[test]
    fn test_external_transfer_has_single_side() {
        let a = AccountId::generate();
        let mut tx = Transaction::new(
            TransactionKind::Transfer,
            Amount::new(dec!(12.00)).unwrap(),
            "",
            Utc::now(),
        )
        .from_account(a);
        tx.recipient_iban = Some("FR7630006000011234567890189".to_string());

        assert!(tx.touches(a));
        assert_eq!(tx.direction_for(&[a]), Direction::Outgoing);
    }
}
