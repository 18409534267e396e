use super::account::AccountId;
use super::money::{Amount, Balance};
use super::transaction::Transaction;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One charged overdraft penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdraftFee {
    pub id: Uuid,
    pub account_id: AccountId,
    pub amount: Amount,
    pub negative_balance_days: u32,
    pub charged_at: DateTime<Utc>,
}

/// When an earlier fee suppresses a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum FeePolicy {
    /// Any fee ever charged on the account suppresses every later one.
    #[default]
    Permanent,
    /// A fee suppresses new ones for `window_days` after it was charged.
    Rolling { window_days: u32 },
}

impl FeePolicy {
    pub fn guard(&self, account_id: AccountId, now: DateTime<Utc>) -> FeeGuard {
        let since = match self {
            FeePolicy::Permanent => None,
            FeePolicy::Rolling { window_days } => {
                Some(now - Duration::days(i64::from(*window_days)))
            }
        };
        FeeGuard { account_id, since }
    }
}

/// Suppression check evaluated by the store inside the commit that would
/// insert a new fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeGuard {
    pub account_id: AccountId,
    /// `None` means any prior fee suppresses.
    pub since: Option<DateTime<Utc>>,
}

impl FeeGuard {
    pub fn suppressed_by(&self, fee: &OverdraftFee) -> bool {
        fee.account_id == self.account_id && self.since.is_none_or(|since| fee.charged_at >= since)
    }
}

/// Number of whole days the account has been continuously negative.
///
/// Walks the history backwards from the live balance, undoing each
/// transaction until the balance was last non-negative. If the history runs
/// out while still negative, the account has been negative since `opened_at`.
pub fn consecutive_negative_days(
    account_id: AccountId,
    balance: Balance,
    history: &[Transaction],
    opened_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> u32 {
    if !balance.is_negative() {
        return 0;
    }

    // Stable ascending sort keeps posting order within a timestamp, so the
    // reversed walk undoes same-instant postings last-in first.
    let mut ordered: Vec<&Transaction> = history.iter().filter(|tx| tx.touches(account_id)).collect();
    ordered.sort_by_key(|tx| tx.created_at);

    let mut running = balance;
    let mut negative_since = opened_at;
    for tx in ordered.into_iter().rev() {
        let before = running - tx.delta_for(account_id);
        if !before.is_negative() {
            negative_since = tx.created_at;
            break;
        }
        running = before;
    }

    let days = (now - negative_since).num_days().max(0);
    u32::try_from(days).unwrap_or(u32::MAX)
}
