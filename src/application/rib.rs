use super::authority::Authority;
use crate::domain::ports::DirectoryStoreRef;
use crate::domain::rib::{RibFields, RibPatch, UserRib};
use crate::domain::user::UserId;
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use tracing::info;

/// One bank identity record per user, with globally unique IBANs.
///
/// The registry does not look at account types; keeping savings accounts
/// out of RIB issuance is up to the advisor-facing caller.
#[derive(Clone)]
pub struct RibRegistry {
    directory: DirectoryStoreRef,
    authority: Authority,
    clock: ClockRef,
}

impl RibRegistry {
    pub fn new(directory: DirectoryStoreRef, authority: Authority, clock: ClockRef) -> Self {
        Self {
            directory,
            authority,
            clock,
        }
    }

    /// Create-or-replace with a full field set.
    pub async fn put(&self, actor: UserId, user_id: UserId, fields: RibFields) -> Result<UserRib> {
        self.authority.advisor_of(actor, user_id).await?;
        let now = self.clock.now();
        match self.directory.get_rib(user_id).await? {
            Some(existing) => {
                let mut rib = UserRib::new(user_id, fields, now)?;
                rib.created_at = existing.created_at;
                self.directory.replace_rib(rib.clone()).await?;
                info!(user = %user_id, iban = %rib.iban, "RIB replaced");
                Ok(rib)
            }
            None => {
                let rib = UserRib::new(user_id, fields, now)?;
                self.directory.insert_rib(rib.clone()).await?;
                info!(user = %user_id, iban = %rib.iban, "RIB created");
                Ok(rib)
            }
        }
    }

    /// Fails with `DuplicateRib` if the user already has one.
    pub async fn create(
        &self,
        actor: UserId,
        user_id: UserId,
        fields: RibFields,
    ) -> Result<UserRib> {
        self.authority.advisor_of(actor, user_id).await?;
        let rib = UserRib::new(user_id, fields, self.clock.now())?;
        self.directory.insert_rib(rib.clone()).await?;
        info!(user = %user_id, iban = %rib.iban, "RIB created");
        Ok(rib)
    }

    pub async fn update(&self, actor: UserId, user_id: UserId, patch: RibPatch) -> Result<UserRib> {
        self.authority.advisor_of(actor, user_id).await?;
        let current = self.get(user_id).await?;
        let rib = current.patched(patch, self.clock.now())?;
        self.directory.replace_rib(rib.clone()).await?;
        info!(user = %user_id, iban = %rib.iban, "RIB updated");
        Ok(rib)
    }

    pub async fn delete(&self, actor: UserId, user_id: UserId) -> Result<UserRib> {
        self.authority.advisor_of(actor, user_id).await?;
        let rib = self
            .directory
            .delete_rib(user_id)
            .await?
            .ok_or(LedgerError::RibNotFound(user_id))?;
        info!(user = %user_id, "RIB deleted");
        Ok(rib)
    }

    pub async fn get(&self, user_id: UserId) -> Result<UserRib> {
        self.directory
            .get_rib(user_id)
            .await?
            .ok_or(LedgerError::RibNotFound(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Fixture;

    fn fields(iban: &str) -> RibFields {
        RibFields {
            iban: iban.to_string(),
            bank_code: "30006".to_string(),
            branch_code: "00001".to_string(),
            account_number: "12345678901".to_string(),
            rib_key: "89".to_string(),
            bic: "agrifrpp".to_string(),
        }
    }

    const IBAN_A: &str = "FR7630006000011234567890189";
    const IBAN_B: &str = "FR1420041010050500013M02606";

    #[tokio::test]
    async fn test_one_rib_per_user() {
        let fx = Fixture::new().await;
        let ribs = fx.office.ribs();

        let rib = ribs.create(fx.advisor, fx.client, fields(IBAN_A)).await.unwrap();
        assert_eq!(rib.bic, "AGRIFRPP");
        assert!(matches!(
            ribs.create(fx.advisor, fx.client, fields(IBAN_B)).await,
            Err(LedgerError::DuplicateRib(_))
        ));
        assert_eq!(ribs.get(fx.client).await.unwrap().iban, IBAN_A);
    }

    #[tokio::test]
    async fn test_iban_unique_across_users() {
        let fx = Fixture::new().await;
        let ribs = fx.office.ribs();
        let other = fx.approved_client("Bruno").await;

        ribs.put(fx.advisor, fx.client, fields(IBAN_A)).await.unwrap();
        assert!(matches!(
            ribs.put(fx.advisor, other, fields("fr76 3000 6000 0112 3456 7890 189"))
                .await,
            Err(LedgerError::DuplicateIban(_))
        ));

        ribs.put(fx.advisor, other, fields(IBAN_B)).await.unwrap();
        assert!(matches!(
            ribs.update(
                fx.advisor,
                other,
                RibPatch {
                    iban: Some(IBAN_A.to_string()),
                    ..RibPatch::default()
                }
            )
            .await,
            Err(LedgerError::DuplicateIban(_))
        ));
    }

    #[tokio::test]
    async fn test_put_replaces_and_delete() {
        let fx = Fixture::new().await;
        let ribs = fx.office.ribs();

        let first = ribs.put(fx.advisor, fx.client, fields(IBAN_A)).await.unwrap();
        let second = ribs.put(fx.advisor, fx.client, fields(IBAN_B)).await.unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(ribs.get(fx.client).await.unwrap().iban, IBAN_B);

        let patched = ribs
            .update(
                fx.advisor,
                fx.client,
                RibPatch {
                    rib_key: Some("06".to_string()),
                    ..RibPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.rib_key, "06");
        assert_eq!(patched.iban, IBAN_B);

        ribs.delete(fx.advisor, fx.client).await.unwrap();
        assert!(matches!(
            ribs.get(fx.client).await,
            Err(LedgerError::RibNotFound(_))
        ));
        // The freed IBAN can be reused.
        ribs.create(fx.advisor, fx.client, fields(IBAN_A)).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_iban_and_authority() {
        let fx = Fixture::new().await;
        let ribs = fx.office.ribs();
        assert!(matches!(
            ribs.put(fx.advisor, fx.client, fields("FR7630006000011234567890188"))
                .await,
            Err(LedgerError::InvalidIban(_))
        ));
        assert!(matches!(
            ribs.put(fx.client, fx.client, fields(IBAN_A)).await,
            Err(LedgerError::Forbidden(_))
        ));
    }
}
