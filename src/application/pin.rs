use super::authority::Authority;
use crate::domain::user::{User, UserId};
use crate::error::{LedgerError, Result};
use tracing::debug;

/// Checks a candidate PIN against the stored hash.
///
/// Stateless: there is no retry counter and no lockout. Callers that need
/// rate limiting must add it around this verifier.
#[derive(Clone)]
pub struct PinVerifier {
    authority: Authority,
}

impl PinVerifier {
    pub fn new(authority: Authority) -> Self {
        Self { authority }
    }

    /// Returns whether `candidate` matches the user's PIN.
    ///
    /// Fails with `PinNotSet` when the user never configured one, since such
    /// a user cannot authorize anything.
    pub async fn verify(&self, user_id: UserId, candidate: &str) -> Result<bool> {
        let user = self.authority.user(user_id).await?;
        Self::check(&user, candidate)
    }

    /// The PIN gate: resolves the user, or fails with `InvalidPin`.
    pub async fn authorize(&self, user_id: UserId, candidate: &str) -> Result<User> {
        let user = self.authority.user(user_id).await?;
        if Self::check(&user, candidate)? {
            Ok(user)
        } else {
            debug!(user = %user_id, "PIN rejected");
            Err(LedgerError::InvalidPin)
        }
    }

    fn check(user: &User, candidate: &str) -> Result<bool> {
        let hash = user.pin.as_ref().ok_or(LedgerError::PinNotSet(user.id))?;
        Ok(hash.matches(candidate))
    }
}
