use super::authority::Authority;
use super::pin::PinVerifier;
use crate::domain::ports::DirectoryStoreRef;
use crate::domain::user::{User, UserId};
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use tracing::{debug, info};

/// Registration, approval and PIN setup.
#[derive(Clone)]
pub struct UserRegistry {
    directory: DirectoryStoreRef,
    authority: Authority,
    pins: PinVerifier,
    clock: ClockRef,
}

impl UserRegistry {
    pub fn new(
        directory: DirectoryStoreRef,
        authority: Authority,
        pins: PinVerifier,
        clock: ClockRef,
    ) -> Self {
        Self {
            directory,
            authority,
            pins,
            clock,
        }
    }

    pub async fn register_advisor(&self, name: &str) -> Result<User> {
        self.register_advisor_with_id(UserId::generate(), name)
            .await
    }

    pub async fn register_advisor_with_id(&self, id: UserId, name: &str) -> Result<User> {
        let user = User::advisor(id, name, self.clock.now());
        self.insert(user).await
    }

    /// Clients start unapproved until their advisor approves them.
    pub async fn register_client(&self, advisor_id: UserId, name: &str) -> Result<User> {
        self.register_client_with_id(UserId::generate(), advisor_id, name)
            .await
    }

    pub async fn register_client_with_id(
        &self,
        id: UserId,
        advisor_id: UserId,
        name: &str,
    ) -> Result<User> {
        let advisor = self.authority.user(advisor_id).await?;
        if !advisor.is_advisor() {
            return Err(LedgerError::ValidationError(format!(
                "user {advisor_id} is not an advisor"
            )));
        }
        let user = User::client(id, name, advisor_id, self.clock.now());
        self.insert(user).await
    }

    pub async fn approve(&self, actor: UserId, client_id: UserId) -> Result<User> {
        let mut client = self.authority.advisor_of(actor, client_id).await?;
        client.is_approved = true;
        self.directory.save_user(client.clone()).await?;
        info!(client = %client.id, advisor = %actor, "client approved");
        Ok(client)
    }

    /// Sets or replaces a user's 6-digit PIN.
    ///
    /// `actor` must be the user or the user's advisor. Replacing an existing
    /// PIN also requires `current_pin`, which goes through the PIN gate.
    pub async fn set_pin(
        &self,
        actor: UserId,
        user_id: UserId,
        current_pin: Option<&str>,
        pin: &str,
    ) -> Result<()> {
        let mut user = if actor == user_id {
            self.authority.user(user_id).await?
        } else {
            self.authority.advisor_of(actor, user_id).await?
        };
        if user.pin.is_some() {
            let Some(current) = current_pin else {
                debug!(user = %user_id, "PIN change without the current PIN");
                return Err(LedgerError::InvalidPin);
            };
            user = self.pins.authorize(user_id, current).await?;
        }
        user.set_pin(pin)?;
        self.directory.save_user(user).await?;
        info!(user = %user_id, "PIN updated");
        Ok(())
    }

    pub async fn get(&self, user_id: UserId) -> Result<User> {
        self.authority.user(user_id).await
    }

    async fn insert(&self, user: User) -> Result<User> {
        if name_is_blank(&user.name) {
            return Err(LedgerError::ValidationError(
                "user name must not be empty".to_string(),
            ));
        }
        if self.directory.get_user(user.id).await?.is_some() {
            return Err(LedgerError::ValidationError(format!(
                "user {} already exists",
                user.id
            )));
        }
        self.directory.save_user(user.clone()).await?;
        info!(user = %user.id, role = ?user.role, "user registered");
        Ok(user)
    }
}

fn name_is_blank(name: &str) -> bool {
    name.trim().is_empty()
}
