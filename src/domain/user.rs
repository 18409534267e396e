use crate::error::LedgerError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of the personal PIN that gates every money movement.
pub const PIN_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a stable id from an external label (journal references).
    pub fn from_label(label: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("user:{label}").as_bytes()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Advisor,
}

/// An argon2id PHC string of a PIN. The salt is random and embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinHash(String);

impl PinHash {
    /// Hashes `pin` after checking it is exactly `digits` ASCII digits.
    pub fn digest(pin: &str, digits: usize) -> Result<Self, LedgerError> {
        if pin.len() != digits || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidPinFormat(format!(
                "PIN must be exactly {digits} digits"
            )));
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| LedgerError::PinHashing(e.to_string()))?;
        Ok(Self(hash.to_string()))
    }

    /// Constant-time check of `candidate`. An unparsable stored hash never
    /// matches.
    pub fn matches(&self, candidate: &str) -> bool {
        match PasswordHash::new(&self.0) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// An authenticated identity of the back office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    /// Assigned advisor; always `None` for advisors.
    pub advisor_id: Option<UserId>,
    pub is_approved: bool,
    pub pin: Option<PinHash>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Advisors are approved on creation.
    pub fn advisor(id: UserId, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Advisor,
            advisor_id: None,
            is_approved: true,
            pin: None,
            created_at,
        }
    }

    pub fn client(
        id: UserId,
        name: impl Into<String>,
        advisor_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            role: Role::Client,
            advisor_id: Some(advisor_id),
            is_approved: false,
            pin: None,
            created_at,
        }
    }

    pub fn is_advisor(&self) -> bool {
        self.role == Role::Advisor
    }

    pub fn set_pin(&mut self, pin: &str) -> Result<(), LedgerError> {
        self.pin = Some(PinHash::digest(pin, PIN_LENGTH)?);
        Ok(())
    }

    /// Whether `self` may act on behalf of `client` as its advisor.
    pub fn advises(&self, client: &User) -> bool {
        self.is_advisor() && client.advisor_id == Some(self.id)
    }
}
