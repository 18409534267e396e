use super::authority::Authority;
use super::notifier::Notifier;
use crate::domain::account::{Account, AccountId, AccountKind};
use crate::domain::entry::{BalanceCheck, LedgerEntry, Leg};
use crate::domain::money::{Amount, Balance, MONEY_SCALE};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transaction::{Direction, Transaction, TransactionKind};
use crate::domain::user::UserId;
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use rust_decimal::Decimal;
use tracing::info;

/// Owns account balances.
///
/// Every balance change in the crate ends in [`LedgerStore::commit`]; this
/// service exposes the single-account postings on top of it.
///
/// [`LedgerStore::commit`]: crate::domain::ports::LedgerStore::commit
#[derive(Clone)]
pub struct AccountLedger {
    store: LedgerStoreRef,
    authority: Authority,
    notifier: Notifier,
    clock: ClockRef,
    max_current_accounts: usize,
}

impl AccountLedger {
    pub fn new(
        store: LedgerStoreRef,
        authority: Authority,
        notifier: Notifier,
        clock: ClockRef,
        max_current_accounts: usize,
    ) -> Self {
        Self {
            store,
            authority,
            notifier,
            clock,
            max_current_accounts,
        }
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account> {
        self.authority.account(account_id).await
    }

    pub async fn get_balance(&self, account_id: AccountId) -> Result<Balance> {
        Ok(self.get_account(account_id).await?.balance)
    }

    pub async fn accounts_of(&self, owner: UserId) -> Result<Vec<Account>> {
        self.store.accounts_of(owner).await
    }

    pub async fn all_accounts(&self) -> Result<Vec<Account>> {
        self.store.all_accounts().await
    }

    /// Raw signed adjustment without a transaction record.
    ///
    /// Goes through the same commit as every posting, so it serializes with
    /// concurrent transfers. No overdraft check is applied.
    pub async fn adjust_balance(&self, account_id: AccountId, delta: Balance) -> Result<Balance> {
        let entry = LedgerEntry::new().leg(Leg {
            account_id,
            delta,
            check: BalanceCheck::Unchecked,
        });
        let settled = self.store.commit(entry).await?;
        let balance = settled
            .first()
            .map(|account| account.balance)
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        info!(account = %account_id, %delta, %balance, "balance adjusted");
        Ok(balance)
    }

    /// Opens an account on behalf of a client. `actor` must be the client's
    /// advisor.
    pub async fn create_account(
        &self,
        actor: UserId,
        owner: UserId,
        kind: AccountKind,
        name: &str,
    ) -> Result<Account> {
        self.create_account_with_id(AccountId::generate(), actor, owner, kind, name)
            .await
    }

    pub async fn create_account_with_id(
        &self,
        id: AccountId,
        actor: UserId,
        owner: UserId,
        kind: AccountKind,
        name: &str,
    ) -> Result<Account> {
        self.authority.advisor_of(actor, owner).await?;
        if name.trim().is_empty() {
            return Err(LedgerError::ValidationError(
                "account name must not be empty".to_string(),
            ));
        }
        if self.store.get_account(id).await?.is_some() {
            return Err(LedgerError::ValidationError(format!(
                "account {id} already exists"
            )));
        }

        let account = Account::new(id, owner, kind, name, self.clock.now());
        self.store
            .insert_account(account.clone(), self.max_current_accounts)
            .await?;
        info!(account = %account.id, %owner, kind = %kind, "account opened");
        Ok(account)
    }

    /// Closes an account whose balance is exactly zero.
    pub async fn delete_account(&self, actor: UserId, account_id: AccountId) -> Result<Account> {
        self.authority.advisor_of_account(actor, account_id).await?;
        let account = self.store.delete_account(account_id).await?;
        info!(account = %account_id, "account closed");
        Ok(account)
    }

    /// Sets how far below zero a `courant` account may go. Other account kinds
    /// only accept a zero limit.
    pub async fn set_overdraft_limit(
        &self,
        actor: UserId,
        account_id: AccountId,
        limit: Decimal,
    ) -> Result<Account> {
        let (_, account) = self.authority.advisor_of_account(actor, account_id).await?;
        if limit < Decimal::ZERO || limit.normalize().scale() > MONEY_SCALE {
            return Err(LedgerError::ValidationError(format!(
                "overdraft limit {limit} must be a non-negative amount in cents"
            )));
        }
        if !limit.is_zero() && !account.kind.allows_overdraft() {
            return Err(LedgerError::ValidationError(format!(
                "{} accounts cannot be overdrawn",
                account.kind
            )));
        }
        let account = self
            .store
            .set_overdraft_limit(account_id, Balance::new(limit))
            .await?;
        info!(account = %account_id, limit = %account.overdraft_limit, "overdraft limit set");
        Ok(account)
    }

    /// Advisor-initiated cash-in.
    pub async fn deposit(
        &self,
        actor: UserId,
        account_id: AccountId,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let (owner, _) = self.authority.advisor_of_account(actor, account_id).await?;
        let tx = Transaction::new(
            TransactionKind::Deposit,
            amount,
            description,
            self.clock.now(),
        )
        .to_account(account_id);
        let entry = LedgerEntry::new()
            .leg(Leg::credit(account_id, amount))
            .recording(tx.clone());
        self.store.commit(entry).await?;
        info!(account = %account_id, %amount, tx = %tx.id, "deposit posted");

        self.notifier
            .publish([Notification::new(
                owner.id,
                NotificationKind::Deposit,
                format!("Deposit of {amount} credited"),
                tx.created_at,
            )
            .for_transaction(tx.id)])
            .await;
        Ok(tx)
    }

    /// Advisor-initiated cash-out, bounded by the overdraft limit.
    pub async fn withdraw(
        &self,
        actor: UserId,
        account_id: AccountId,
        amount: Amount,
        description: &str,
    ) -> Result<Transaction> {
        let (owner, _) = self.authority.advisor_of_account(actor, account_id).await?;
        let tx = Transaction::new(
            TransactionKind::Withdrawal,
            amount,
            description,
            self.clock.now(),
        )
        .from_account(account_id);
        let entry = LedgerEntry::new()
            .leg(Leg::debit(account_id, amount, BalanceCheck::WithinOverdraft))
            .recording(tx.clone());
        self.store.commit(entry).await?;
        info!(account = %account_id, %amount, tx = %tx.id, "withdrawal posted");

        self.notifier
            .publish([Notification::new(
                owner.id,
                NotificationKind::Withdrawal,
                format!("Withdrawal of {amount} debited"),
                tx.created_at,
            )
            .for_transaction(tx.id)])
            .await;
        Ok(tx)
    }

    /// Account history, newest first, each entry with its direction as seen
    /// by the account holder.
    pub async fn history(
        &self,
        viewer: UserId,
        account_id: AccountId,
    ) -> Result<Vec<(Transaction, Direction)>> {
        let account = self.get_account(account_id).await?;
        self.authority.may_view(viewer, &account).await?;

        let holder_accounts: Vec<AccountId> = self
            .store
            .accounts_of(account.owner)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();

        let mut history = self.store.transactions_for(account_id).await?;
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(history
            .into_iter()
            .map(|tx| {
                let direction = tx.direction_for(&holder_accounts);
                (tx, direction)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::application::test_support::Fixture;
    use crate::domain::account::AccountKind;
    use crate::domain::money::{Amount, Balance};
    use crate::domain::transaction::{Direction, TransactionKind};
    use crate::error::LedgerError;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_current_account_limit() {
        let fx = Fixture::new().await;
        let ledger = fx.office.ledger();

        ledger
            .create_account(fx.advisor, fx.client, AccountKind::Courant, "Second")
            .await
            .unwrap();
        let third = ledger
            .create_account(fx.advisor, fx.client, AccountKind::Courant, "Third")
            .await;
        assert!(matches!(
            third,
            Err(LedgerError::LimitExceeded { limit: 2, .. })
        ));

        // Savings accounts are not capped.
        ledger
            .create_account(fx.advisor, fx.client, AccountKind::Epargne, "Livret A")
            .await
            .unwrap();
        assert_eq!(ledger.accounts_of(fx.client).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_only_assigned_advisor_opens_accounts() {
        let fx = Fixture::new().await;
        let other = fx.office.users().register_advisor("Paul").await.unwrap();

        let result = fx
            .office
            .ledger()
            .create_account(other.id, fx.client, AccountKind::Pel, "PEL")
            .await;
        assert!(matches!(result, Err(LedgerError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_guard() {
        let fx = Fixture::new().await;
        let ledger = fx.office.ledger();
        fx.fund(fx.courant, dec!(0.01)).await;

        assert!(matches!(
            ledger.delete_account(fx.advisor, fx.courant).await,
            Err(LedgerError::NonZeroBalance { .. })
        ));

        ledger
            .withdraw(fx.advisor, fx.courant, Amount::new(dec!(0.01)).unwrap(), "")
            .await
            .unwrap();
        ledger.delete_account(fx.advisor, fx.courant).await.unwrap();
        assert!(matches!(
            ledger.get_balance(fx.courant).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_withdrawal_respects_overdraft() {
        let fx = Fixture::new().await;
        let ledger = fx.office.ledger();
        fx.fund(fx.courant, dec!(100)).await;
        ledger
            .set_overdraft_limit(fx.advisor, fx.courant, dec!(50))
            .await
            .unwrap();

        let too_much = ledger
            .withdraw(fx.advisor, fx.courant, Amount::new(dec!(150.01)).unwrap(), "")
            .await;
        assert!(matches!(too_much, Err(LedgerError::InsufficientFunds { .. })));

        ledger
            .withdraw(fx.advisor, fx.courant, Amount::new(dec!(150)).unwrap(), "")
            .await
            .unwrap();
        assert_eq!(
            ledger.get_balance(fx.courant).await.unwrap(),
            Balance::new(dec!(-50))
        );
    }

    #[tokio::test]
    async fn test_overdraft_only_on_current_accounts() {
        let fx = Fixture::new().await;
        let savings = fx.open(fx.client, AccountKind::Epargne, "Livret").await;

        let result = fx
            .office
            .ledger()
            .set_overdraft_limit(fx.advisor, savings, dec!(10))
            .await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_adjust_balance_is_unchecked() {
        let fx = Fixture::new().await;
        let ledger = fx.office.ledger();

        let balance = ledger
            .adjust_balance(fx.courant, Balance::new(dec!(-12.5)))
            .await
            .unwrap();
        assert_eq!(balance, Balance::new(dec!(-12.50)));
        assert!(ledger.history(fx.client, fx.courant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_directions() {
        let fx = Fixture::new().await;
        fx.fund(fx.courant, dec!(80)).await;
        fx.office
            .ledger()
            .withdraw(fx.advisor, fx.courant, Amount::new(dec!(30)).unwrap(), "ATM")
            .await
            .unwrap();

        let history = fx.office.ledger().history(fx.client, fx.courant).await.unwrap();
        assert_eq!(history.len(), 2);
        let kinds: Vec<(TransactionKind, Direction)> =
            history.iter().map(|(tx, d)| (tx.kind, *d)).collect();
        assert!(kinds.contains(&(TransactionKind::Withdrawal, Direction::Outgoing)));
        assert!(kinds.contains(&(TransactionKind::Deposit, Direction::Incoming)));

        let stranger = fx.approved_client("Zoe").await;
        assert!(matches!(
            fx.office.ledger().history(stranger, fx.courant).await,
            Err(LedgerError::Forbidden(_))
        ));
    }
}
