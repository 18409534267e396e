use super::account::{Account, AccountId};
use super::beneficiary::{Beneficiary, BeneficiaryId};
use super::card::{Card, CardId};
use super::credit::{Credit, CreditId};
use super::entry::LedgerEntry;
use super::fee::OverdraftFee;
use super::money::Balance;
use super::notification::Notification;
use super::rib::UserRib;
use super::transaction::{Transaction, TransactionId};
use super::user::{User, UserId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Accounts, transactions, credits and overdraft fees.
///
/// Balances change only through [`LedgerStore::commit`], which implementations
/// must apply atomically and serialize against concurrent commits.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Inserts a new account, refusing a `courant` account beyond
    /// `max_current_accounts` for the same owner.
    async fn insert_account(&self, account: Account, max_current_accounts: usize) -> Result<()>;
    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>>;
    async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>>;
    async fn all_accounts(&self) -> Result<Vec<Account>>;
    async fn set_overdraft_limit(&self, account_id: AccountId, limit: Balance) -> Result<Account>;
    /// Removes the account only if its balance is exactly zero.
    async fn delete_account(&self, account_id: AccountId) -> Result<Account>;

    /// Applies a ledger entry atomically and returns the touched accounts.
    async fn commit(&self, entry: LedgerEntry) -> Result<Vec<Account>>;

    async fn get_transaction(&self, tx_id: TransactionId) -> Result<Option<Transaction>>;
    async fn transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>>;
    async fn fees_for(&self, account_id: AccountId) -> Result<Vec<OverdraftFee>>;

    async fn save_credit(&self, credit: Credit) -> Result<()>;
    /// Overwrites a credit only if the stored record still equals `expected`,
    /// serialized with `commit`. Fails with `WriteConflict` otherwise.
    async fn replace_credit(&self, expected: &Credit, credit: Credit) -> Result<()>;
    async fn get_credit(&self, credit_id: CreditId) -> Result<Option<Credit>>;
    async fn credits_for(&self, account_id: AccountId) -> Result<Vec<Credit>>;
    async fn all_credits(&self) -> Result<Vec<Credit>>;
    async fn delete_credit(&self, credit_id: CreditId) -> Result<Option<Credit>>;
}

/// Users and the records hanging off them: RIBs, cards, beneficiaries.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn save_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// Fails with `DuplicateRib` or `DuplicateIban`.
    async fn insert_rib(&self, rib: UserRib) -> Result<()>;
    /// Replaces the user's existing RIB; fails with `RibNotFound` or
    /// `DuplicateIban` (another user's IBAN).
    async fn replace_rib(&self, rib: UserRib) -> Result<()>;
    async fn get_rib(&self, user_id: UserId) -> Result<Option<UserRib>>;
    async fn find_rib_by_iban(&self, iban: &str) -> Result<Option<UserRib>>;
    async fn delete_rib(&self, user_id: UserId) -> Result<Option<UserRib>>;

    async fn save_card(&self, card: Card) -> Result<()>;
    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>>;
    async fn cards_for(&self, account_id: AccountId) -> Result<Vec<Card>>;

    async fn save_beneficiary(&self, beneficiary: Beneficiary) -> Result<()>;
    async fn get_beneficiary(&self, beneficiary_id: BeneficiaryId) -> Result<Option<Beneficiary>>;
    async fn beneficiaries_of(&self, owner: UserId) -> Result<Vec<Beneficiary>>;
    async fn delete_beneficiary(&self, beneficiary_id: BeneficiaryId)
    -> Result<Option<Beneficiary>>;
}

/// Persists notification records for display surfaces.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, notification: Notification) -> Result<()>;
    async fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>>;
    /// Returns `false` if no such notification belongs to the user.
    async fn mark_read(&self, user_id: UserId, notification_id: Uuid) -> Result<bool>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type DirectoryStoreRef = Arc<dyn DirectoryStore>;
pub type NotificationSinkRef = Arc<dyn NotificationSink>;
