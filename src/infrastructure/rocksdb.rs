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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for transaction records, keyed by transaction id.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Index: account id ++ timestamp ++ transaction id -> transaction id.
pub const CF_ACCOUNT_TRANSACTIONS: &str = "account_transactions";
/// Column Family for overdraft fee rows, keyed by account id ++ fee id.
pub const CF_FEES: &str = "overdraft_fees";
pub const CF_CREDITS: &str = "credits";
pub const CF_USERS: &str = "users";
pub const CF_RIBS: &str = "user_ribs";
pub const CF_CARDS: &str = "cards";
pub const CF_BENEFICIARIES: &str = "beneficiaries";
/// Column Family for notifications, keyed by user id ++ notification id.
pub const CF_NOTIFICATIONS: &str = "notifications";

const COLUMN_FAMILIES: [&str; 10] = [
    CF_ACCOUNTS,
    CF_TRANSACTIONS,
    CF_ACCOUNT_TRANSACTIONS,
    CF_FEES,
    CF_CREDITS,
    CF_USERS,
    CF_RIBS,
    CF_CARDS,
    CF_BENEFICIARIES,
    CF_NOTIFICATIONS,
];

fn compound_key(prefix: &Uuid, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + suffix.len());
    key.extend_from_slice(prefix.as_bytes());
    key.extend_from_slice(suffix);
    key
}

/// A persistent store implementation using RocksDB.
///
/// Each table lives in its own Column Family. A ledger commit is validated
/// under `commit_lock` and written as a single `WriteBatch`, so either every
/// row of the entry lands or none does.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
    directory_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
            directory_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::storage(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_pinned_cf(cf, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn batch_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        let cf = self.cf(cf_name)?;
        batch.put_cf(cf, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn delete_key(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.delete_cf(cf, key)?;
        Ok(())
    }

    fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn scan_prefix<T, F>(&self, cf_name: &str, prefix: &[u8], mut decode: F) -> Result<Vec<T>>
    where
        F: FnMut(&[u8]) -> Result<T>,
    {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn read_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        self.get_json(CF_ACCOUNTS, account_id.0.as_bytes())
    }

    fn read_fees(&self, account_id: AccountId) -> Result<Vec<OverdraftFee>> {
        self.scan_prefix(CF_FEES, account_id.0.as_bytes(), |value| {
            Ok(serde_json::from_slice(value)?)
        })
    }

    fn transaction_index_key(account_id: AccountId, tx: &Transaction) -> Vec<u8> {
        let mut suffix = Vec::with_capacity(24);
        suffix.extend_from_slice(&tx.created_at.timestamp_micros().to_be_bytes());
        suffix.extend_from_slice(tx.id.0.as_bytes());
        compound_key(&account_id.0, &suffix)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn insert_account(&self, account: Account, max_current_accounts: usize) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        if account.kind == AccountKind::Courant {
            let held = self
                .scan_json::<Account>(CF_ACCOUNTS)?
                .into_iter()
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
        self.put_json(CF_ACCOUNTS, account.id.0.as_bytes(), &account)
    }

    async fn get_account(&self, account_id: AccountId) -> Result<Option<Account>> {
        self.read_account(account_id)
    }

    async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .scan_json::<Account>(CF_ACCOUNTS)?
            .into_iter()
            .filter(|a| a.owner == owner)
            .collect();
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    async fn all_accounts(&self) -> Result<Vec<Account>> {
        let mut accounts: Vec<Account> = self.scan_json(CF_ACCOUNTS)?;
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(accounts)
    }

    async fn set_overdraft_limit(&self, account_id: AccountId, limit: Balance) -> Result<Account> {
        let _guard = self.commit_lock.lock().await;
        let mut account = self
            .read_account(account_id)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        account.overdraft_limit = limit;
        self.put_json(CF_ACCOUNTS, account_id.0.as_bytes(), &account)?;
        Ok(account)
    }

    async fn delete_account(&self, account_id: AccountId) -> Result<Account> {
        let _guard = self.commit_lock.lock().await;
        let account = self
            .read_account(account_id)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        if !account.balance.is_zero() {
            return Err(LedgerError::NonZeroBalance {
                account_id,
                balance: account.balance.value(),
            });
        }
        self.delete_key(CF_ACCOUNTS, account_id.0.as_bytes())?;
        Ok(account)
    }

    async fn commit(&self, entry: LedgerEntry) -> Result<Vec<Account>> {
        let _guard = self.commit_lock.lock().await;

        let settled = entry.settle(|id| self.read_account(id))?;

        if let Some(charge) = &entry.fee
            && self
                .read_fees(charge.guard.account_id)?
                .iter()
                .any(|fee| charge.guard.suppressed_by(fee))
        {
            return Err(LedgerError::FeeAlreadyCharged(charge.guard.account_id));
        }

        if let Some(advance) = &entry.credit {
            let stored: Credit = self
                .get_json(CF_CREDITS, advance.credit.id.0.as_bytes())?
                .ok_or_else(|| LedgerError::CreditNotFound(advance.credit.id.to_string()))?;
            if stored.next_payment_date != advance.expected_next_payment {
                return Err(LedgerError::WriteConflict(format!(
                    "credit {} was advanced concurrently",
                    advance.credit.id
                )));
            }
        }

        let mut batch = WriteBatch::default();
        for account in &settled {
            self.batch_json(&mut batch, CF_ACCOUNTS, account.id.0.as_bytes(), account)?;
        }
        if let Some(tx) = &entry.transaction {
            self.batch_json(&mut batch, CF_TRANSACTIONS, tx.id.0.as_bytes(), tx)?;
            let index = self.cf(CF_ACCOUNT_TRANSACTIONS)?;
            for account_id in [tx.from_account_id, tx.to_account_id].into_iter().flatten() {
                batch.put_cf(
                    index,
                    Self::transaction_index_key(account_id, tx),
                    tx.id.0.as_bytes(),
                );
            }
        }
        if let Some(charge) = &entry.fee {
            let key = compound_key(&charge.fee.account_id.0, charge.fee.id.as_bytes());
            self.batch_json(&mut batch, CF_FEES, &key, &charge.fee)?;
        }
        if let Some(advance) = &entry.credit {
            self.batch_json(
                &mut batch,
                CF_CREDITS,
                advance.credit.id.0.as_bytes(),
                &advance.credit,
            )?;
        }
        self.db.write(batch)?;

        Ok(settled)
    }

    async fn get_transaction(&self, tx_id: TransactionId) -> Result<Option<Transaction>> {
        self.get_json(CF_TRANSACTIONS, tx_id.0.as_bytes())
    }

    async fn transactions_for(&self, account_id: AccountId) -> Result<Vec<Transaction>> {
        let ids = self.scan_prefix(CF_ACCOUNT_TRANSACTIONS, account_id.0.as_bytes(), |value| {
            Uuid::from_slice(value).map_err(|e| LedgerError::Storage(Box::new(e)))
        })?;
        let mut history = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(tx) = self.get_json(CF_TRANSACTIONS, id.as_bytes())? {
                history.push(tx);
            }
        }
        Ok(history)
    }

    async fn fees_for(&self, account_id: AccountId) -> Result<Vec<OverdraftFee>> {
        self.read_fees(account_id)
    }

    async fn save_credit(&self, credit: Credit) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        self.put_json(CF_CREDITS, credit.id.0.as_bytes(), &credit)
    }

    async fn replace_credit(&self, expected: &Credit, credit: Credit) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        let stored: Credit = self
            .get_json(CF_CREDITS, expected.id.0.as_bytes())?
            .ok_or_else(|| LedgerError::CreditNotFound(expected.id.to_string()))?;
        if &stored != expected {
            return Err(LedgerError::WriteConflict(format!(
                "credit {} changed concurrently",
                expected.id
            )));
        }
        self.put_json(CF_CREDITS, credit.id.0.as_bytes(), &credit)
    }

    async fn get_credit(&self, credit_id: CreditId) -> Result<Option<Credit>> {
        self.get_json(CF_CREDITS, credit_id.0.as_bytes())
    }

    async fn credits_for(&self, account_id: AccountId) -> Result<Vec<Credit>> {
        let mut credits: Vec<Credit> = self
            .scan_json::<Credit>(CF_CREDITS)?
            .into_iter()
            .filter(|c| c.account_id == account_id)
            .collect();
        credits.sort_by_key(|c| c.created_at);
        Ok(credits)
    }

    async fn all_credits(&self) -> Result<Vec<Credit>> {
        let mut credits: Vec<Credit> = self.scan_json(CF_CREDITS)?;
        credits.sort_by_key(|c| c.created_at);
        Ok(credits)
    }

    async fn delete_credit(&self, credit_id: CreditId) -> Result<Option<Credit>> {
        let _guard = self.commit_lock.lock().await;
        let credit: Option<Credit> = self.get_json(CF_CREDITS, credit_id.0.as_bytes())?;
        if credit.is_some() {
            self.delete_key(CF_CREDITS, credit_id.0.as_bytes())?;
        }
        Ok(credit)
    }
}

#[async_trait]
impl DirectoryStore for RocksDBStore {
    async fn save_user(&self, user: User) -> Result<()> {
        self.put_json(CF_USERS, user.id.0.as_bytes(), &user)
    }

    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        self.get_json(CF_USERS, user_id.0.as_bytes())
    }

    async fn insert_rib(&self, rib: UserRib) -> Result<()> {
        let _guard = self.directory_lock.lock().await;
        let existing: Vec<UserRib> = self.scan_json(CF_RIBS)?;
        if existing.iter().any(|r| r.user_id == rib.user_id) {
            return Err(LedgerError::DuplicateRib(rib.user_id));
        }
        if existing.iter().any(|r| r.iban == rib.iban) {
            return Err(LedgerError::DuplicateIban(rib.iban));
        }
        self.put_json(CF_RIBS, rib.user_id.0.as_bytes(), &rib)
    }

    async fn replace_rib(&self, rib: UserRib) -> Result<()> {
        let _guard = self.directory_lock.lock().await;
        let existing: Vec<UserRib> = self.scan_json(CF_RIBS)?;
        if !existing.iter().any(|r| r.user_id == rib.user_id) {
            return Err(LedgerError::RibNotFound(rib.user_id));
        }
        if existing
            .iter()
            .any(|r| r.iban == rib.iban && r.user_id != rib.user_id)
        {
            return Err(LedgerError::DuplicateIban(rib.iban));
        }
        self.put_json(CF_RIBS, rib.user_id.0.as_bytes(), &rib)
    }

    async fn get_rib(&self, user_id: UserId) -> Result<Option<UserRib>> {
        self.get_json(CF_RIBS, user_id.0.as_bytes())
    }

    async fn find_rib_by_iban(&self, iban: &str) -> Result<Option<UserRib>> {
        Ok(self
            .scan_json::<UserRib>(CF_RIBS)?
            .into_iter()
            .find(|r| r.iban == iban))
    }

    async fn delete_rib(&self, user_id: UserId) -> Result<Option<UserRib>> {
        let _guard = self.directory_lock.lock().await;
        let rib: Option<UserRib> = self.get_json(CF_RIBS, user_id.0.as_bytes())?;
        if rib.is_some() {
            self.delete_key(CF_RIBS, user_id.0.as_bytes())?;
        }
        Ok(rib)
    }

    async fn save_card(&self, card: Card) -> Result<()> {
        self.put_json(CF_CARDS, card.id.0.as_bytes(), &card)
    }

    async fn get_card(&self, card_id: CardId) -> Result<Option<Card>> {
        self.get_json(CF_CARDS, card_id.0.as_bytes())
    }

    async fn cards_for(&self, account_id: AccountId) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = self
            .scan_json::<Card>(CF_CARDS)?
            .into_iter()
            .filter(|c| c.account_id == account_id)
            .collect();
        cards.sort_by_key(|c| c.created_at);
        Ok(cards)
    }

    async fn save_beneficiary(&self, beneficiary: Beneficiary) -> Result<()> {
        self.put_json(CF_BENEFICIARIES, beneficiary.id.0.as_bytes(), &beneficiary)
    }

    async fn get_beneficiary(&self, beneficiary_id: BeneficiaryId) -> Result<Option<Beneficiary>> {
        self.get_json(CF_BENEFICIARIES, beneficiary_id.0.as_bytes())
    }

    async fn beneficiaries_of(&self, owner: UserId) -> Result<Vec<Beneficiary>> {
        let mut beneficiaries: Vec<Beneficiary> = self
            .scan_json::<Beneficiary>(CF_BENEFICIARIES)?
            .into_iter()
            .filter(|b| b.owner == owner)
            .collect();
        beneficiaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(beneficiaries)
    }

    async fn delete_beneficiary(
        &self,
        beneficiary_id: BeneficiaryId,
    ) -> Result<Option<Beneficiary>> {
        let beneficiary: Option<Beneficiary> =
            self.get_json(CF_BENEFICIARIES, beneficiary_id.0.as_bytes())?;
        if beneficiary.is_some() {
            self.delete_key(CF_BENEFICIARIES, beneficiary_id.0.as_bytes())?;
        }
        Ok(beneficiary)
    }
}

#[async_trait]
impl NotificationSink for RocksDBStore {
    async fn emit(&self, notification: Notification) -> Result<()> {
        let key = compound_key(&notification.user_id.0, notification.id.as_bytes());
        self.put_json(CF_NOTIFICATIONS, &key, &notification)
    }

    async fn notifications_for(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let mut notifications = self.scan_prefix(CF_NOTIFICATIONS, user_id.0.as_bytes(), |value| {
            Ok(serde_json::from_slice::<Notification>(value)?)
        })?;
        notifications.sort_by_key(|n| n.created_at);
        Ok(notifications)
    }

    async fn mark_read(&self, user_id: UserId, notification_id: Uuid) -> Result<bool> {
        let key = compound_key(&user_id.0, notification_id.as_bytes());
        match self.get_json::<Notification>(CF_NOTIFICATIONS, &key)? {
            Some(mut notification) => {
                notification.is_read = true;
                self.put_json(CF_NOTIFICATIONS, &key, &notification)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
