use crate::domain::account::{Account, AccountId, AccountKind};
use crate::domain::beneficiary::{Beneficiary, BeneficiaryId};
use crate::domain::card::{Card, CardId};
use crate::domain::credit::{Credit, CreditId};
use crate::domain::entry::LedgerEntry;
use crate::domain::fee::OverdraftFee;
use crate::domain::money::Balance;
use crate::domain::notification::Notification;
use crate::domain::ports::{DirectoryStore, LedgerStore, NotificationSink};
use crate::domain::rib::UserRib;
use crate::domain::transaction::{Transaction, TransactionId};
use crate::domain::user::{User, UserId};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct LedgerTables {
    accounts: HashMap<AccountId, Account>,
    transactions: Vec<Transaction>,
    fees: Vec<OverdraftFee>,
    credits: HashMap<CreditId, Credit>,
}

/// A thread-safe in-memory ledger.
///
/// All tables sit behind a single `RwLock`, so a commit holds the write lock
/// from its balance checks to its last insert and concurrent commits
/// serialize. Ideal for tests and single-process runs where persistence is
/// not required.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    tables: Arc<RwLock<LedgerTables>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_account(&self, account: Account, max_current_accounts: usize) -> Result<()> {
        let mut tables = self.tables.write().await;
        if account.kind == AccountKind::Courant {
            let held = tables
                .accounts
                .values()
                .filter(|a| a.owner == account.owner && a.kind == AccountKind::Courant)
                .count();
            if held >= max_current_accounts {
                return Err(LedgerError::LimitExceeded {
                    owner: account.owner,
                    kind: AccountKind::Courant,
                    limit: max_current_accounts,
                });
            }
        }
        tables.accounts.insert(account.id, account);
        Ok(())
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&account_id).cloned())
    }

    async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables
            .accounts
            .values()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let tables = self.tables.read().await;
        let mut accounts: Vec<Account> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(accounts)
    }

    async fn set_overdraft_limit(&self, account_id: AccountId, limit: Balance) -> Result<Account> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        account.overdraft_limit = limit;
        Ok(account.clone())
    }

    async fn delete_account(&self, account_id: AccountId) -> Result<Account> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .get(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        if !account.balance.is_zero() {
            return Err(LedgerError::NonZeroBalance {
                account_id,
                balance: account.balance.value(),
            });
        }
        tables
            .accounts
            .remove(&account_id)
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    async fn commit(&self, entry: LedgerEntry) -> Result<Vec<Account>> {
        let mut tables = self.tables.write().await;

        let settled = entry.settle(|id| Ok(tables.accounts.get(&id).cloned()))?;

        if let Some(charge) = &entry.fee
            && tables.fees.iter().any(|fee| charge.guard.suppressed_by(fee))
        {
            return Err(LedgerError::FeeAlreadyCharged(charge.guard.account_id));
        }

        if let Some(advance) = &entry.credit {
            let stored = tables
                .credits
                .get(&advance.credit.id)
                .ok_or_else(|| LedgerError::CreditNotFound(advance.credit.id.to_string()))?;
            if stored.next_payment_date != advance.expected_next_payment {
                return Err(LedgerError::WriteConflict(format!(
                    "credit {} was advanced concurrently",
                    advance.credit.id
                )));
            }
        }

        // Every check passed; apply all writes under the same lock.
        for account in &settled {
            tables.accounts.insert(account.id, account.clone());
        }
        if let Some(tx) = entry.transaction {
            tables.transactions.push(tx);
        }
        if let Some(charge) = entry.fee {
            tables.fees.push(charge.fee);
        }
        if let Some(advance) = entry.credit {
            tables.credits.insert(advance.credit.id, advance.credit);
        }
        Ok(settled)
    }

    async fn get_transaction(&self, tx_id: TransactionId) -> Result<Option<Transaction>> {
        let tables = self.tables.read().await;
        Ok(tables.transactions.iter().find(|tx| tx.id == tx_id).cloned())
    }

    async fn transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let tables = self.tables.read().await;
        let mut history: Vec<Transaction> = tables
            .transactions
            .iter()
            .filter(|tx| tx.touches(account_id))
            .cloned()
            .collect();
        history.sort_by_key(|tx| tx.created_at);
        Ok(history)
    }

    async fn fees_for(&self, account_id: AccountId) -> Result<Vec<OverdraftFee>> {
        let tables = self.tables.read().await;
        Ok(tables
            .fees
            .iter()
            .filter(|fee| fee.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn save_credit(&self, credit: Credit) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.credits.insert(credit.id, credit);
        Ok(())
    }

    async fn replace_credit(&self, expected: &Credit, credit: Credit) -> Result<()> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .credits
            .get(&expected.id)
            .ok_or_else(|| LedgerError::CreditNotFound(expected.id.to_string()))?;
        if stored != expected {
            return Err(LedgerError::WriteConflict(format!(
                "credit {} changed concurrently",
                expected.id
            )));
        }
        tables.credits.insert(credit.id, credit);
        Ok(())
    }

    async fn get_credit(&self, credit_id: CreditId) -> Result<Option<Credit>> {
        let tables = self.tables.read().await;
        Ok(tables.credits.get(&credit_id).cloned())
    }

    async fn credits_for(&self, account_id: AccountId) -> Result<Vec<Credit>> {
        let tables = self.tables.read().await;
        let mut credits: Vec<Credit> = tables
            .credits
            .values()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect();
        credits.sort_by_key(|c| c.created_at);
        Ok(credits)
    }

    async fn all_credits(&self) -> Result<Vec<Credit>> {
        let tables = self.tables.read().await;
        let mut credits: Vec<Credit> = tables.credits.values().cloned().collect();
        credits.sort_by_key(|c| c.created_at);
        Ok(credits)
    }

    async fn delete_credit(&self, credit_id: CreditId) -> Result<Option<Credit>> {
        let mut tables = self.tables.write().await;
        Ok(tables.credits.remove(&credit_id))
    }
}

#[derive(Default)]
struct DirectoryTables {
    users: HashMap<UserId, User>,
    ribs: HashMap<UserId, UserRib>,
    cards: HashMap<CardId, Card>,
    beneficiaries: HashMap<BeneficiaryId, Beneficiary>,
}

/// A thread-safe in-memory store for users and their satellite records.
#[derive(Default, Clone)]
pub struct InMemoryDirectoryStore {
    tables: Arc<RwLock<DirectoryTables>>,
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn save_user(&self, user: User) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).cloned())
    }

    async fn insert_rib(&self, rib: UserRib) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.ribs.contains_key(&rib.user_id) {
            return Err(LedgerError::DuplicateRib(rib.user_id));
        }
        if tables.ribs.values().any(|r| r.iban == rib.iban) {
            return Err(LedgerError::DuplicateIban(rib.iban));
        }
        tables.ribs.insert(rib.user_id, rib);
        Ok(())
    }

    async fn replace_rib(&self, rib: UserRib) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.ribs.contains_key(&rib.user_id) {
            return Err(LedgerError::RibNotFound(rib.user_id));
        }
        if tables
            .ribs
            .values()
            .any(|r| r.iban == rib.iban && r.user_id != rib.user_id)
        {
            return Err(LedgerError::DuplicateIban(rib.iban));
        }
        tables.ribs.insert(rib.user_id, rib);
        Ok(())
    }

    async fn get_rib(&self, user_id: UserId) -> Result<Option<UserRib>> {
        let tables = self.tables.read().await;
        Ok(tables.ribs.get(&user_id).cloned())
    }

    async fn find_rib_by_iban(&self, iban: &str) -> Result<Option<UserRib>> {
        let tables = self.tables.read().await;
        Ok(tables.ribs.values().find(|r| r.iban == iban).cloned())
    }

    async fn delete_rib(&self, user_id: UserId) -> Result<Option<UserRib>> {
        let mut tables = self.tables.write().await;
        Ok(tables.ribs.remove(&user_id))
    }

    async fn save_card(&self, card: Card) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.cards.insert(card.id, card);
        Ok(())
    }

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>> {
        let tables = self.tables.read().await;
        Ok(tables.cards.get(&card_id).cloned())
    }

    async fn cards_for(&self, account_id: AccountId) -> Result<Vec<Card>> {
        let tables = self.tables.read().await;
        let mut cards: Vec<Card> = tables
            .cards
            .values()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.created_at);
        Ok(cards)
    }

    async fn save_beneficiary(&self, beneficiary: Beneficiary) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.beneficiaries.insert(beneficiary.id, beneficiary);
        Ok(())
    }

    async fn get_beneficiary(&self, beneficiary_id: BeneficiaryId) -> Result<Option<Beneficiary>> {
        let tables = self.tables.read().await;
        Ok(tables.beneficiaries.get(&beneficiary_id).cloned())
    }

    async fn beneficiaries_of(&self, owner: UserId) -> Result<Vec<Beneficiary>> {
        let tables = self.tables.read().await;
        let mut beneficiaries: Vec<Beneficiary> = tables
            .beneficiaries
            .values()
            .filter(|b| b.owner == owner)
            .cloned()
            .collect();
        beneficiaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(beneficiaries)
    }

    async fn delete_beneficiary(
        &self,
        beneficiary_id: BeneficiaryId,
    ) -> Result<Option<Beneficiary>> {
        let mut tables = self.tables.write().await;
        Ok(tables.beneficiaries.remove(&beneficiary_id))
    }
}

/// Keeps emitted notifications in memory, oldest first.
#[derive(Default, Clone)]
pub struct InMemoryNotificationSink {
    notifications: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn emit(&self, notification: Notification) -> Result<()> {
        let mut notifications = self.notifications.write().await;
        notifications.push(notification);
        Ok(())
    }

    async fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, user_id: UserId, notification_id: Uuid) -> Result<bool> {
        let mut notifications = self.notifications.write().await;
        match notifications
            .iter_mut()
            .find(|n| n.id == notification_id && n.user_id == user_id)
        {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credit::CreditTerms;
    use crate::domain::entry::{BalanceCheck, CreditAdvance, Leg};
    use crate::domain::money::Amount;
    use crate::domain::rib::RibFields;
    use crate::domain::transaction::TransactionKind;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(owner: UserId, kind: AccountKind) -> Account {
        Account::new(AccountId::generate(), owner, kind, "Compte", Utc::now())
    }

    fn rib(user_id: UserId, iban: &str) -> UserRib {
        UserRib::new(
            user_id,
            RibFields {
                iban: iban.to_string(),
                bank_code: "30006".to_string(),
                branch_code: "00001".to_string(),
                account_number: "12345678901".to_string(),
                rib_key: "89".to_string(),
                bic: "AGRIFRPP".to_string(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_account_store() {
        let store = InMemoryLedgerStore::new();
        let owner = UserId::generate();
        let account = account(owner, AccountKind::Courant);

        store.insert_account(account.clone(), 2).await.unwrap();
        let retrieved = store.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(retrieved, account);
        assert_eq!(store.accounts_of(owner).await.unwrap().len(), 1);

        assert!(
            store
                .get_account(AccountId::generate())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_current_account_limit() {
        let store = InMemoryLedgerStore::new();
        let owner = UserId::generate();
        store
            .insert_account(account(owner, AccountKind::Courant), 2)
            .await
            .unwrap();
        store
            .insert_account(account(owner, AccountKind::Courant), 2)
            .await
            .unwrap();
        store
            .insert_account(account(owner, AccountKind::Epargne), 2)
            .await
            .unwrap();

        let third = store
            .insert_account(account(owner, AccountKind::Courant), 2)
            .await;
        assert!(matches!(third, Err(LedgerError::LimitExceeded { .. })));
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = InMemoryLedgerStore::new();
        let owner = UserId::generate();
        let from = account(owner, AccountKind::Courant);
        let to = account(owner, AccountKind::Epargne);
        store.insert_account(from.clone(), 2).await.unwrap();
        store.insert_account(to.clone(), 2).await.unwrap();

        let amount = Amount::new(dec!(10)).unwrap();
        let tx = Transaction::new(TransactionKind::Transfer, amount, "", Utc::now())
            .from_account(from.id)
            .to_account(to.id);
        let entry = LedgerEntry::new()
            .leg(Leg::debit(from.id, amount, BalanceCheck::WithinOverdraft))
            .leg(Leg::credit(to.id, amount))
            .recording(tx);

        let result = store.commit(entry).await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert!(store.transactions_for(from.id).await.unwrap().is_empty());
        assert_eq!(
            store.get_account(to.id).await.unwrap().unwrap().balance,
            Balance::ZERO
        );
    }

    #[tokio::test]
    async fn test_replace_credit_detects_interleaved_advance() {
        let store = InMemoryLedgerStore::new();
        let owner = UserId::generate();
        let courant = account(owner, AccountKind::Courant);
        store.insert_account(courant.clone(), 2).await.unwrap();
        let seen = Credit::open(
            CreditId::generate(),
            owner,
            courant.id,
            CreditTerms {
                name: "Auto".to_string(),
                total_amount: Amount::new(dec!(1200)).unwrap(),
                monthly_amount: Amount::new(dec!(100)).unwrap(),
                interest_rate: dec!(3),
                duration_months: 12,
                payment_day: 15,
            },
            Utc::now(),
        )
        .unwrap();
        store.save_credit(seen.clone()).await.unwrap();

        // An instalment lands after the override read the credit.
        let advanced = seen.advanced().unwrap();
        store
            .commit(
                LedgerEntry::new()
                    .leg(Leg::debit(
                        courant.id,
                        seen.monthly_amount,
                        BalanceCheck::Unchecked,
                    ))
                    .advancing(CreditAdvance {
                        credit: advanced.clone(),
                        expected_next_payment: seen.next_payment_date,
                    }),
            )
            .await
            .unwrap();

        let mut stale = seen.clone();
        stale.name = "Voiture".to_string();
        assert!(matches!(
            store.replace_credit(&seen, stale).await,
            Err(LedgerError::WriteConflict(_))
        ));
        assert_eq!(store.get_credit(seen.id).await.unwrap().unwrap(), advanced);

        let mut fresh = advanced.clone();
        fresh.name = "Voiture".to_string();
        store.replace_credit(&advanced, fresh.clone()).await.unwrap();
        assert_eq!(store.get_credit(seen.id).await.unwrap().unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_delete_requires_zero_balance() {
        let store = InMemoryLedgerStore::new();
        let account = account(UserId::generate(), AccountKind::Courant);
        store.insert_account(account.clone(), 2).await.unwrap();
        store
            .commit(LedgerEntry::new().leg(Leg::credit(account.id, Amount::new(dec!(1)).unwrap())))
            .await
            .unwrap();

        let result = store.delete_account(account.id).await;
        assert!(matches!(result, Err(LedgerError::NonZeroBalance { .. })));
    }

    #[tokio::test]
    async fn test_rib_uniqueness() {
        let store = InMemoryDirectoryStore::new();
        let (alice, bruno) = (UserId::generate(), UserId::generate());

        store
            .insert_rib(rib(alice, "FR7630006000011234567890189"))
            .await
            .unwrap();
        assert!(matches!(
            store.insert_rib(rib(alice, "DE89370400440532013000")).await,
            Err(LedgerError::DuplicateRib(_))
        ));
        assert!(matches!(
            store
                .insert_rib(rib(bruno, "FR7630006000011234567890189"))
                .await,
            Err(LedgerError::DuplicateIban(_))
        ));

        // Replacing with one's own IBAN is fine.
        store
            .replace_rib(rib(alice, "FR7630006000011234567890189"))
            .await
            .unwrap();
        assert!(matches!(
            store.replace_rib(rib(bruno, "DE89370400440532013000")).await,
            Err(LedgerError::RibNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_notification_mark_read() {
        let sink = InMemoryNotificationSink::new();
        let user = UserId::generate();
        let notification = Notification::new(
            user,
            crate::domain::notification::NotificationKind::Deposit,
            "Deposit of 10.00",
            Utc::now(),
        );
        let id = notification.id;
        sink.emit(notification).await.unwrap();

        assert!(!sink.mark_read(UserId::generate(), id).await.unwrap());
        assert!(sink.mark_read(user, id).await.unwrap());
        assert!(sink.notifications_for(user).await.unwrap()[0].is_read);
    }
}
