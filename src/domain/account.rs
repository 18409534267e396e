use super::money::Balance;
use super::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_label(label: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("account:{label}").as_bytes()))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Account product types.
///
/// Only `Courant` (current account) may run an overdraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Courant,
    Epargne,
    Pel,
}

impl AccountKind {
    pub fn allows_overdraft(&self) -> bool {
        matches!(self, AccountKind::Courant)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Courant => "courant",
            AccountKind::Epargne => "epargne",
            AccountKind::Pel => "pel",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A monetary account held by one user.
///
/// The balance is only ever changed by a ledger commit; nothing else in the
/// crate writes it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub owner: UserId,
    pub kind: AccountKind,
    pub name: String,
    pub balance: Balance,
    /// Most negative balance allowed, stored as a non-negative magnitude.
    pub overdraft_limit: Balance,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: AccountId,
        owner: UserId,
        kind: AccountKind,
        name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            kind,
            name: name.into(),
            balance: Balance::ZERO,
            overdraft_limit: Balance::ZERO,
            created_at,
        }
    }

    /// Lowest balance this account may reach through a checked debit.
    pub fn floor(&self) -> Balance {
        -self.overdraft_limit
    }

    /// Whether debiting `amount` keeps the balance at or above the floor.
    pub fn can_debit(&self, amount: Balance) -> bool {
        self.balance - amount >= self.floor()
    }
}
