use super::authority::Authority;
use crate::domain::beneficiary::{Beneficiary, BeneficiaryId};
use crate::domain::ports::DirectoryStoreRef;
use crate::domain::rib::normalize_iban;
use crate::domain::user::UserId;
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use tracing::info;

/// A client's saved payees.
#[derive(Clone)]
pub struct BeneficiaryBook {
    directory: DirectoryStoreRef,
    authority: Authority,
    clock: ClockRef,
}

impl BeneficiaryBook {
    pub fn new(directory: DirectoryStoreRef, authority: Authority, clock: ClockRef) -> Self {
        Self {
            directory,
            authority,
            clock,
        }
    }

    pub async fn add(&self, owner: UserId, name: &str, iban: &str) -> Result<Beneficiary> {
        self.add_with_id(BeneficiaryId::generate(), owner, name, iban)
            .await
    }

    /// Saves a payee. It is flagged internal when the IBAN belongs to one of
    /// our registered RIBs.
    pub async fn add_with_id(
        &self,
        id: BeneficiaryId,
        owner: UserId,
        name: &str,
        iban: &str,
    ) -> Result<Beneficiary> {
        self.authority.user(owner).await?;
        let normalized = normalize_iban(iban)?;
        let is_internal = self.directory.find_rib_by_iban(&normalized).await?.is_some();
        let beneficiary =
            Beneficiary::new(id, owner, name, &normalized, is_internal, self.clock.now())?;
        self.directory.save_beneficiary(beneficiary.clone()).await?;
        info!(owner = %owner, beneficiary = %beneficiary.id, is_internal, "beneficiary saved");
        Ok(beneficiary)
    }

    pub async fn remove(&self, owner: UserId, id: BeneficiaryId) -> Result<Beneficiary> {
        self.get(owner, id).await?;
        let removed = self
            .directory
            .delete_beneficiary(id)
            .await?
            .ok_or_else(|| LedgerError::BeneficiaryNotFound(id.to_string()))?;
        info!(owner = %owner, beneficiary = %id, "beneficiary removed");
        Ok(removed)
    }

    /// Another user's payee is reported as not found.
    pub async fn get(&self, owner: UserId, id: BeneficiaryId) -> Result<Beneficiary> {
        self.directory
            .get_beneficiary(id)
            .await?
            .filter(|b| b.owner == owner)
            .ok_or_else(|| LedgerError::BeneficiaryNotFound(id.to_string()))
    }

    pub async fn list(&self, owner: UserId) -> Result<Vec<Beneficiary>> {
        self.directory.beneficiaries_of(owner).await
    }
}
