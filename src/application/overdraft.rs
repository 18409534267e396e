use super::notifier::Notifier;
use super::sweep::SweepReport;
use crate::domain::account::AccountId;
use crate::domain::entry::{BalanceCheck, FeeCharge, LedgerEntry, Leg};
use crate::domain::fee::{FeePolicy, OverdraftFee, consecutive_negative_days};
use crate::domain::money::Amount;
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transaction::{Transaction, TransactionKind};
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Charges a flat penalty on accounts with a negative balance.
///
/// Whether an earlier fee suppresses a new one depends on the
/// [`FeePolicy`]. The suppression check is repeated inside the commit, so
/// two concurrent checks on the same account charge at most once.
#[derive(Clone)]
pub struct OverdraftFeeEngine {
    store: LedgerStoreRef,
    notifier: Notifier,
    clock: ClockRef,
    fee: Amount,
    policy: FeePolicy,
}

impl OverdraftFeeEngine {
    pub fn new(
        store: LedgerStoreRef,
        notifier: Notifier,
        clock: ClockRef,
        fee: Amount,
        policy: FeePolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            fee,
            policy,
        }
    }

    pub fn policy(&self) -> FeePolicy {
        self.policy
    }

    /// Charges the account if it is negative and not already penalized.
    ///
    /// Returns the fee that was charged, or `None` when nothing was due.
    pub async fn check(&self, account_id: AccountId) -> Result<Option<OverdraftFee>> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        if !account.balance.is_negative() {
            return Ok(None);
        }

        let now = self.clock.now();
        let guard = self.policy.guard(account_id, now);
        if self
            .store
            .fees_for(account_id)
            .await?
            .iter()
            .any(|fee| guard.suppressed_by(fee))
        {
            debug!(account = %account_id, "overdraft fee suppressed by an earlier fee");
            return Ok(None);
        }

        let history = self.store.transactions_for(account_id).await?;
        let negative_days =
            consecutive_negative_days(account_id, account.balance, &history, account.created_at, now);

        let tx = Transaction::new(TransactionKind::Fee, self.fee, "Overdraft fee", now)
            .from_account(account_id);
        let fee = OverdraftFee {
            id: Uuid::new_v4(),
            account_id,
            amount: self.fee,
            negative_balance_days: negative_days,
            charged_at: now,
        };
        let entry = LedgerEntry::new()
            .leg(Leg::debit(account_id, self.fee, BalanceCheck::MustBeNegative))
            .recording(tx.clone())
            .charging(FeeCharge {
                fee: fee.clone(),
                guard,
            });

        match self.store.commit(entry).await {
            Ok(_) => {}
            // Lost a race: another check charged first, or a credit landed.
            Err(LedgerError::FeeAlreadyCharged(_) | LedgerError::BalanceNotNegative(_)) => {
                debug!(account = %account_id, "overdraft fee no longer due at commit");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        info!(
            account = %account_id,
            amount = %self.fee,
            negative_days,
            tx = %tx.id,
            "overdraft fee charged"
        );
        self.notifier
            .publish([Notification::new(
                account.owner,
                NotificationKind::OverdraftFee,
                format!(
                    "Overdraft fee of {} charged on {} after {} day(s) below zero",
                    self.fee, account.name, negative_days
                ),
                now,
            )
            .for_transaction(tx.id)])
            .await;
        Ok(Some(fee))
    }

    /// Checks every account. A failing account is logged and skipped.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for account in self.store.all_accounts().await? {
            match self.check(account.id).await {
                Ok(Some(_)) => report.processed += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!(account = %account.id, error = %e, "overdraft check skipped");
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }

    pub async fn fees_for(&self, account_id: AccountId) -> Result<Vec<OverdraftFee>> {
        self.store.fees_for(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use crate::application::test_support::Fixture;
    use crate::config::EngineConfig;
    use crate::domain::fee::FeePolicy;
    use crate::domain::notification::NotificationKind;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_no_fee_on_non_negative_balance() {
        let fx = Fixture::new().await;
        assert!(fx.office.fees().check(fx.courant).await.unwrap().is_none());
        assert!(fx.office.fees().fees_for(fx.courant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fee_charged_once() {
        let fx = Fixture::new().await;
        fx.overdraw(fx.courant, dec!(20)).await;
        fx.clock.set(fx.clock_now() + Duration::days(3));

        let fee = fx.office.fees().check(fx.courant).await.unwrap().unwrap();
        assert_eq!(fee.amount.value(), dec!(5.00));
        assert_eq!(fee.negative_balance_days, 3);
        assert_eq!(fx.balance(fx.courant).await, dec!(-25.00));

        let report = fx.office.fees().sweep().await.unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(fx.office.fees().fees_for(fx.courant).await.unwrap().len(), 1);
        assert_eq!(fx.balance(fx.courant).await, dec!(-25.00));

        let notes = fx.office.notifications().list(fx.client).await.unwrap();
        assert!(notes.iter().any(|n| n.kind == NotificationKind::OverdraftFee));
    }

    #[tokio::test]
    async fn test_permanent_policy_survives_recovery() {
        let fx = Fixture::new().await;
        fx.overdraw(fx.courant, dec!(20)).await;
        fx.office.fees().check(fx.courant).await.unwrap().unwrap();

        fx.fund(fx.courant, dec!(100)).await;
        fx.overdraw(fx.courant, dec!(100)).await;
        assert!(fx.office.fees().check(fx.courant).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rolling_policy_recharges_after_window() {
        let config = EngineConfig {
            fee_policy: FeePolicy::Rolling { window_days: 30 },
            ..EngineConfig::default()
        };
        let fx = Fixture::with_config(config).await;
        fx.overdraw(fx.courant, dec!(20)).await;
        fx.office.fees().check(fx.courant).await.unwrap().unwrap();

        fx.clock.set(fx.clock_now() + Duration::days(10));
        assert!(fx.office.fees().check(fx.courant).await.unwrap().is_none());

        fx.clock.set(fx.clock_now() + Duration::days(25));
        assert!(fx.office.fees().check(fx.courant).await.unwrap().is_some());
        assert_eq!(fx.balance(fx.courant).await, dec!(-30.00));
    }

    #[tokio::test]
    async fn test_concurrent_checks_charge_once() {
        let fx = Fixture::new().await;
        fx.overdraw(fx.courant, dec!(20)).await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let fees = fx.office.fees().clone();
            let account = fx.courant;
            handles.push(tokio::spawn(async move { fees.check(account).await }));
        }
        let mut charged = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                charged += 1;
            }
        }
        assert_eq!(charged, 1);
        assert_eq!(fx.balance(fx.courant).await, dec!(-25.00));
    }
}
