use super::user::UserId;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Strips whitespace and upper-cases an IBAN, then checks its ISO 7064
/// mod-97 checksum.
pub fn normalize_iban(raw: &str) -> Result<String, LedgerError> {
    let iban: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let well_formed = (15..=34).contains(&iban.len())
        && iban.chars().all(|c| c.is_ascii_alphanumeric())
        && iban[..2].chars().all(|c| c.is_ascii_alphabetic())
        && iban[2..4].chars().all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(LedgerError::InvalidIban(raw.to_string()));
    }

    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    let mut remainder: u32 = 0;
    for c in rearranged {
        // to_digit(36) maps 0-9 to themselves and A-Z to 10-35
        let value = c.to_digit(36).ok_or_else(|| LedgerError::InvalidIban(raw.to_string()))?;
        remainder = if value < 10 {
            (remainder * 10 + value) % 97
        } else {
            (remainder * 100 + value) % 97
        };
    }
    if remainder != 1 {
        return Err(LedgerError::InvalidIban(raw.to_string()));
    }
    Ok(iban)
}

/// Full field set of a bank identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RibFields {
    pub iban: String,
    pub bank_code: String,
    pub branch_code: String,
    pub account_number: String,
    pub rib_key: String,
    pub bic: String,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RibPatch {
    pub iban: Option<String>,
    pub bank_code: Option<String>,
    pub branch_code: Option<String>,
    pub account_number: Option<String>,
    pub rib_key: Option<String>,
    pub bic: Option<String>,
}

/// The one bank identity record a user may hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRib {
    pub user_id: UserId,
    pub iban: String,
    pub bank_code: String,
    pub branch_code: String,
    pub account_number: String,
    pub rib_key: String,
    pub bic: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRib {
    pub fn new(user_id: UserId, fields: RibFields, now: DateTime<Utc>) -> Result<Self, LedgerError> {
        Ok(Self {
            user_id,
            iban: normalize_iban(&fields.iban)?,
            bank_code: fields.bank_code,
            branch_code: fields.branch_code,
            account_number: fields.account_number,
            rib_key: fields.rib_key,
            bic: fields.bic.to_ascii_uppercase(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the patched record; the receiver is left as it was.
    pub fn patched(&self, patch: RibPatch, now: DateTime<Utc>) -> Result<Self, LedgerError> {
        let iban = match patch.iban {
            Some(iban) => normalize_iban(&iban)?,
            None => self.iban.clone(),
        };
        Ok(Self {
            user_id: self.user_id,
            iban,
            bank_code: patch.bank_code.unwrap_or_else(|| self.bank_code.clone()),
            branch_code: patch.branch_code.unwrap_or_else(|| self.branch_code.clone()),
            account_number: patch
                .account_number
                .unwrap_or_else(|| self.account_number.clone()),
            rib_key: patch.rib_key.unwrap_or_else(|| self.rib_key.clone()),
            bic: patch
                .bic
                .map(|bic| bic.to_ascii_uppercase())
                .unwrap_or_else(|| self.bic.clone()),
            created_at: self.created_at,
            updated_at: now,
        })
    }
}
