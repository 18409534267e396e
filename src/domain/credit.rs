use super::account::AccountId;
use super::money::{Amount, Balance};
use super::user::UserId;
use crate::error::LedgerError;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditId(pub Uuid);

impl CreditId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_label(label: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("credit:{label}").as_bytes()))
    }
}

impl fmt::Display for CreditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Last calendar day of the given month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Due date for `payment_day` in the given month, clamped to the month's
/// last day (a 31st falls on the 30th in April and the 28th/29th in February).
pub fn due_date_in(year: i32, month: u32, payment_day: u32) -> Option<NaiveDate> {
    let day = payment_day.min(last_day_of_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Due date in the calendar month after `date`'s month.
///
/// Only the month of `date` is used, so a clamped date never drags the next
/// due date earlier than `payment_day`.
pub fn following_due_date(date: NaiveDate, payment_day: u32) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    due_date_in(year, month, payment_day)
}

/// Terms supplied when an advisor opens a credit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditTerms {
    pub name: String,
    pub total_amount: Amount,
    pub monthly_amount: Amount,
    pub interest_rate: Decimal,
    pub duration_months: u32,
    pub payment_day: u32,
}

impl CreditTerms {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "credit name must not be empty".to_string(),
            ));
        }
        if self.duration_months == 0 {
            return Err(LedgerError::ValidationError(
                "credit duration must be at least one month".to_string(),
            ));
        }
        if !(1..=31).contains(&self.payment_day) {
            return Err(LedgerError::ValidationError(format!(
                "payment day {} is outside 1..=31",
                self.payment_day
            )));
        }
        if self.interest_rate < Decimal::ZERO {
            return Err(LedgerError::ValidationError(
                "interest rate must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// An amortizing obligation debited monthly from one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credit {
    pub id: CreditId,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub name: String,
    pub total_amount: Amount,
    pub monthly_amount: Amount,
    pub remaining_amount: Balance,
    pub interest_rate: Decimal,
    pub duration_months: u32,
    pub remaining_months: u32,
    pub payment_day: u32,
    pub next_payment_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Credit {
    /// Opens a credit; the first instalment falls one month after creation.
    pub fn open(
        id: CreditId,
        user_id: UserId,
        account_id: AccountId,
        terms: CreditTerms,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        terms.validate()?;
        let next_payment_date = following_due_date(created_at.date_naive(), terms.payment_day)
            .ok_or_else(|| LedgerError::ValidationError("unrepresentable due date".to_string()))?;
        Ok(Self {
            id,
            user_id,
            account_id,
            name: terms.name,
            total_amount: terms.total_amount,
            monthly_amount: terms.monthly_amount,
            remaining_amount: terms.total_amount.into(),
            interest_rate: terms.interest_rate,
            duration_months: terms.duration_months,
            remaining_months: terms.duration_months,
            payment_day: terms.payment_day,
            next_payment_date,
            is_active: true,
            created_at,
        })
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.is_active && self.next_payment_date <= today
    }

    /// State after one scheduled instalment has been debited.
    pub fn advanced(&self) -> Result<Self, LedgerError> {
        let mut next = self.clone();
        next.remaining_months = self.remaining_months.saturating_sub(1);
        let remaining = self.remaining_amount - self.monthly_amount.into();
        next.remaining_amount = if remaining.is_negative() {
            Balance::ZERO
        } else {
            remaining
        };
        next.next_payment_date = following_due_date(self.next_payment_date, self.payment_day)
            .ok_or_else(|| LedgerError::ValidationError("unrepresentable due date".to_string()))?;
        if next.remaining_months == 0 {
            next.is_active = false;
        }
        Ok(next)
    }

    /// Applies an advisor's administrative correction verbatim.
    pub fn overridden(&self, patch: &CreditOverride) -> Result<Self, LedgerError> {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name = name.clone();
        }
        if let Some(total) = patch.total_amount {
            next.total_amount = total;
        }
        if let Some(monthly) = patch.monthly_amount {
            next.monthly_amount = monthly;
        }
        if let Some(remaining) = patch.remaining_amount {
            next.remaining_amount = remaining;
        }
        if let Some(months) = patch.remaining_months {
            next.remaining_months = months;
        }
        if let Some(rate) = patch.interest_rate {
            next.interest_rate = rate;
        }
        if let Some(day) = patch.payment_day {
            if !(1..=31).contains(&day) {
                return Err(LedgerError::ValidationError(format!(
                    "payment day {day} is outside 1..=31"
                )));
            }
            next.payment_day = day;
        }
        if let Some(date) = patch.next_payment_date {
            next.next_payment_date = date;
        }
        if let Some(active) = patch.is_active {
            next.is_active = active;
        }
        Ok(next)
    }
}

/// Fields an advisor may overwrite directly, bypassing the amortization
/// schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreditOverride {
    pub name: Option<String>,
    pub total_amount: Option<Amount>,
    pub monthly_amount: Option<Amount>,
    pub remaining_amount: Option<Balance>,
    pub remaining_months: Option<u32>,
    pub interest_rate: Option<Decimal>,
    pub payment_day: Option<u32>,
    pub next_payment_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}
