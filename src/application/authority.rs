use crate::domain::account::{Account, AccountId};
use crate::domain::ports::{DirectoryStoreRef, LedgerStoreRef};
use crate::domain::user::{User, UserId};
use crate::error::{LedgerError, Result};

/// Resolves request-scoped identities and checks who may act on whose behalf.
#[derive(Clone)]
pub struct Authority {
    directory: DirectoryStoreRef,
    ledger: LedgerStoreRef,
}

impl Authority {
    pub fn new(directory: DirectoryStoreRef, ledger: LedgerStoreRef) -> Self {
        Self { directory, ledger }
    }

    pub async fn user(&self, user_id: UserId) -> Result<User> {
        self.directory
            .get_user(user_id)
            .await?
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    pub async fn account(&self, account_id: AccountId) -> Result<Account> {
        self.ledger
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Loads `actor` and `client`, failing unless `actor` is the advisor
    /// assigned to `client`. Returns the client.
    pub async fn advisor_of(&self, actor: UserId, client: UserId) -> Result<User> {
        let advisor = self.user(actor).await?;
        let client = self.user(client).await?;
        if !advisor.advises(&client) {
            return Err(LedgerError::Forbidden(format!(
                "user {} is not the advisor of {}",
                advisor.id, client.id
            )));
        }
        Ok(client)
    }

    /// Like [`Authority::advisor_of`], for the owner of an account.
    pub async fn advisor_of_account(
        &self,
        actor: UserId,
        account_id: AccountId,
    ) -> Result<(User, Account)> {
        let account = self.account(account_id).await?;
        let owner = self.advisor_of(actor, account.owner).await?;
        Ok((owner, account))
    }

    /// Succeeds for the account owner or the owner's advisor.
    pub async fn may_view(&self, viewer: UserId, account: &Account) -> Result<()> {
        if viewer == account.owner {
            return Ok(());
        }
        self.advisor_of(viewer, account.owner).await.map(|_| ())
    }
}
