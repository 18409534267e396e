use super::account::{Account, AccountId};
use super::credit::Credit;
use super::fee::{FeeGuard, OverdraftFee};
use super::money::{Amount, Balance};
use super::transaction::Transaction;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Precondition evaluated against the live balance inside the commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceCheck {
    /// No precondition.
    Unchecked,
    /// The resulting balance must stay at or above `-overdraft_limit`.
    WithinOverdraft,
    /// The balance before the adjustment must be below zero.
    MustBeNegative,
}

/// One signed balance adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub account_id: AccountId,
    pub delta: Balance,
    pub check: BalanceCheck,
}

impl Leg {
    pub fn debit(account_id: AccountId, amount: Amount, check: BalanceCheck) -> Self {
        Self {
            account_id,
            delta: -Balance::from(amount),
            check,
        }
    }

    pub fn credit(account_id: AccountId, amount: Amount) -> Self {
        Self {
            account_id,
            delta: amount.into(),
            check: BalanceCheck::Unchecked,
        }
    }
}

/// Overdraft fee row written by the commit, with its suppression guard.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeCharge {
    pub fee: OverdraftFee,
    pub guard: FeeGuard,
}

/// New credit state written by the commit.
///
/// `expected_next_payment` must match the stored credit, so two sweeps
/// racing on the same instalment cannot both debit it.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditAdvance {
    pub credit: Credit,
    pub expected_next_payment: NaiveDate,
}

/// A unit of work applied atomically by a `LedgerStore`.
///
/// Either every leg, the transaction record, the fee row and the credit
/// state become visible together, or nothing does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerEntry {
    pub legs: Vec<Leg>,
    pub transaction: Option<Transaction>,
    pub fee: Option<FeeCharge>,
    pub credit: Option<CreditAdvance>,
}

impl LedgerEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leg(mut self, leg: Leg) -> Self {
        self.legs.push(leg);
        self
    }

    pub fn recording(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub fn charging(mut self, fee: FeeCharge) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn advancing(mut self, credit: CreditAdvance) -> Self {
        self.credit = Some(credit);
        self
    }

    /// Computes the post-commit state of every touched account.
    ///
    /// `lookup` reads the live account inside the store's critical section.
    /// Nothing is written here; the store persists the returned accounts only
    /// if every check passed.
    pub fn settle<F>(&self, mut lookup: F) -> Result<Vec<Account>>
    where
        F: FnMut(AccountId) -> Result<Option<Account>>,
    {
        let mut touched: HashMap<AccountId, Account> = HashMap::new();
        let mut order: Vec<AccountId> = Vec::new();

        for leg in &self.legs {
            if !touched.contains_key(&leg.account_id) {
                let account =
                    lookup(leg.account_id)?.ok_or(LedgerError::AccountNotFound(leg.account_id))?;
                touched.insert(leg.account_id, account);
                order.push(leg.account_id);
            }
            let account = touched
                .get_mut(&leg.account_id)
                .ok_or(LedgerError::AccountNotFound(leg.account_id))?;

            match leg.check {
                BalanceCheck::Unchecked => {}
                BalanceCheck::WithinOverdraft => {
                    if leg.delta.is_negative() && !account.can_debit(-leg.delta) {
                        return Err(LedgerError::InsufficientFunds {
                            account_id: account.id,
                            balance: account.balance.value(),
                            requested: (-leg.delta).value(),
                            overdraft_limit: account.overdraft_limit.value(),
                        });
                    }
                }
                BalanceCheck::MustBeNegative => {
                    if !account.balance.is_negative() {
                        return Err(LedgerError::BalanceNotNegative(account.id));
                    }
                }
            }
            account.balance += leg.delta;
        }

        Ok(order
            .into_iter()
            .filter_map(|id| touched.remove(&id))
            .collect())
    }
}
