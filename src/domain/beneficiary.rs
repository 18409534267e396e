use super::rib::normalize_iban;
use super::user::UserId;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeneficiaryId(pub Uuid);

impl BeneficiaryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_label(label: &str) -> Self {
        Self(Uuid::new_v5(
            &Uuid::NAMESPACE_OID,
            format!("beneficiary:{label}").as_bytes(),
        ))
    }
}

impl fmt::Display for BeneficiaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A payee saved by a client for later transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub id: BeneficiaryId,
    pub owner: UserId,
    pub name: String,
    pub iban: String,
    /// Payee banks with us; informational only.
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

impl Beneficiary {
    pub fn new(
        id: BeneficiaryId,
        owner: UserId,
        name: impl Into<String>,
        iban: &str,
        is_internal: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "beneficiary name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            owner,
            name,
            iban: normalize_iban(iban)?,
            is_internal,
            created_at,
        })
    }
}
