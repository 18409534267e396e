use super::authority::Authority;
use super::notifier::Notifier;
use super::sweep::SweepReport;
use crate::domain::account::AccountId;
use crate::domain::credit::{Credit, CreditId, CreditOverride, CreditTerms};
use crate::domain::entry::{BalanceCheck, CreditAdvance, LedgerEntry, Leg};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transaction::{Transaction, TransactionKind};
use crate::domain::user::UserId;
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use chrono::NaiveDate;
use tracing::{info, warn};

/// Amortization state of credits and their monthly debits.
#[derive(Clone)]
pub struct CreditScheduler {
    store: LedgerStoreRef,
    authority: Authority,
    notifier: Notifier,
    clock: ClockRef,
}

impl CreditScheduler {
    pub fn new(
        store: LedgerStoreRef,
        authority: Authority,
        notifier: Notifier,
        clock: ClockRef,
    ) -> Self {
        Self {
            store,
            authority,
            notifier,
            clock,
        }
    }

    pub async fn open(
        &self,
        actor: UserId,
        user_id: UserId,
        account_id: AccountId,
        terms: CreditTerms,
    ) -> Result<Credit> {
        self.open_with_id(CreditId::generate(), actor, user_id, account_id, terms)
            .await
    }

    /// Opens a credit against one of the client's accounts. The first due
    /// date is one month after today, clamped to the month's last day.
    pub async fn open_with_id(
        &self,
        id: CreditId,
        actor: UserId,
        user_id: UserId,
        account_id: AccountId,
        terms: CreditTerms,
    ) -> Result<Credit> {
        self.authority.advisor_of(actor, user_id).await?;
        let account = self.authority.account(account_id).await?;
        if account.owner != user_id {
            return Err(LedgerError::Forbidden(format!(
                "account {account_id} does not belong to user {user_id}"
            )));
        }
        if self.store.get_credit(id).await?.is_some() {
            return Err(LedgerError::ValidationError(format!(
                "credit {id} already exists"
            )));
        }

        let credit = Credit::open(id, user_id, account_id, terms, self.clock.now())?;
        self.store.save_credit(credit.clone()).await?;
        info!(
            credit = %credit.id,
            account = %account_id,
            total = %credit.total_amount,
            next_payment = %credit.next_payment_date,
            "credit opened"
        );
        Ok(credit)
    }

    pub async fn get(&self, credit_id: CreditId) -> Result<Credit> {
        self.store
            .get_credit(credit_id)
            .await?
            .ok_or_else(|| LedgerError::CreditNotFound(credit_id.to_string()))
    }

    pub async fn list(&self, account_id: AccountId) -> Result<Vec<Credit>> {
        self.store.credits_for(account_id).await
    }

    /// Debits one instalment now, whatever the due date.
    pub async fn advance(&self, credit_id: CreditId) -> Result<Credit> {
        let credit = self.get(credit_id).await?;
        self.advance_credit(&credit).await
    }

    /// Debits every instalment due on or before `today`.
    ///
    /// A credit that missed several cycles is caught up one posting at a
    /// time. A failing credit is logged and skipped; its later cycles wait
    /// for the next sweep.
    pub async fn sweep(&self, today: NaiveDate) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        for mut credit in self.store.all_credits().await? {
            while credit.is_due(today) {
                match self.advance_credit(&credit).await {
                    Ok(next) => {
                        report.processed += 1;
                        credit = next;
                    }
                    Err(e) => {
                        warn!(
                            credit = %credit.id,
                            account = %credit.account_id,
                            due = %credit.next_payment_date,
                            error = %e,
                            "credit instalment skipped"
                        );
                        report.skipped += 1;
                        break;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Administrative correction, applied verbatim and without any
    /// amortization check. Never debits the account.
    ///
    /// Fails with `WriteConflict` if an instalment was posted between the
    /// read and the write.
    pub async fn override_terms(
        &self,
        actor: UserId,
        credit_id: CreditId,
        patch: CreditOverride,
    ) -> Result<Credit> {
        let credit = self.get(credit_id).await?;
        self.authority.advisor_of(actor, credit.user_id).await?;
        let updated = credit.overridden(&patch)?;
        self.store.replace_credit(&credit, updated.clone()).await?;
        info!(credit = %credit_id, advisor = %actor, "credit overridden");
        Ok(updated)
    }

    pub async fn delete(&self, actor: UserId, credit_id: CreditId) -> Result<Credit> {
        let credit = self.get(credit_id).await?;
        self.authority.advisor_of(actor, credit.user_id).await?;
        let deleted = self
            .store
            .delete_credit(credit_id)
            .await?
            .ok_or_else(|| LedgerError::CreditNotFound(credit_id.to_string()))?;
        info!(credit = %credit_id, advisor = %actor, "credit deleted");
        Ok(deleted)
    }

    async fn advance_credit(&self, credit: &Credit) -> Result<Credit> {
        if !credit.is_active {
            return Err(LedgerError::ValidationError(format!(
                "credit {} is no longer active",
                credit.id
            )));
        }
        let next = credit.advanced()?;
        let tx = Transaction::new(
            TransactionKind::Withdrawal,
            credit.monthly_amount,
            format!("Credit instalment: {}", credit.name),
            self.clock.now(),
        )
        .from_account(credit.account_id);

        let entry = LedgerEntry::new()
            .leg(Leg::debit(
                credit.account_id,
                credit.monthly_amount,
                BalanceCheck::WithinOverdraft,
            ))
            .recording(tx.clone())
            .advancing(CreditAdvance {
                credit: next.clone(),
                expected_next_payment: credit.next_payment_date,
            });
        self.store.commit(entry).await?;

        info!(
            credit = %credit.id,
            account = %credit.account_id,
            amount = %credit.monthly_amount,
            remaining_months = next.remaining_months,
            next_payment = %next.next_payment_date,
            active = next.is_active,
            "credit instalment debited"
        );
        self.notifier
            .publish([Notification::new(
                credit.user_id,
                NotificationKind::CreditInstalment,
                format!(
                    "Instalment of {} debited for credit {}",
                    credit.monthly_amount, credit.name
                ),
                tx.created_at,
            )
            .for_transaction(tx.id)])
            .await;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::Fixture;
    use crate::domain::money::{Amount, Balance};
    use rust_decimal_macros::dec;

    fn terms(payment_day: u32) -> CreditTerms {
        CreditTerms {
            name: "Auto".to_string(),
            total_amount: Amount::new(dec!(1200)).unwrap(),
            monthly_amount: Amount::new(dec!(100)).unwrap(),
            interest_rate: dec!(3.5),
            duration_months: 12,
            payment_day,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_open_and_advance() {
        let fx = Fixture::new().await;
        fx.fund(fx.courant, dec!(500)).await;
        let scheduler = fx.office.credits();

        let credit = scheduler
            .open(fx.advisor, fx.client, fx.courant, terms(15))
            .await
            .unwrap();
        assert_eq!(credit.next_payment_date, date(2024, 2, 15));
        assert_eq!(credit.remaining_amount, Balance::new(dec!(1200)));

        let next = scheduler.advance(credit.id).await.unwrap();
        assert_eq!(next.remaining_amount, Balance::new(dec!(1100)));
        assert_eq!(next.remaining_months, 11);
        assert_eq!(next.next_payment_date, date(2024, 3, 15));
        assert_eq!(fx.balance(fx.courant).await, dec!(400.00));
        assert_eq!(scheduler.get(credit.id).await.unwrap(), next);
    }

    #[tokio::test]
    async fn test_sweep_catches_up_missed_cycles() {
        let fx = Fixture::new().await;
        fx.fund(fx.courant, dec!(1000)).await;
        let scheduler = fx.office.credits();
        let credit = scheduler
            .open(fx.advisor, fx.client, fx.courant, terms(31))
            .await
            .unwrap();
        assert_eq!(credit.next_payment_date, date(2024, 2, 29));

        let report = scheduler.sweep(date(2024, 4, 30)).await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.skipped, 0);

        let credit = scheduler.get(credit.id).await.unwrap();
        assert_eq!(credit.remaining_months, 9);
        assert_eq!(credit.next_payment_date, date(2024, 5, 31));
        assert_eq!(fx.balance(fx.courant).await, dec!(700.00));

        let again = scheduler.sweep(date(2024, 4, 30)).await.unwrap();
        assert_eq!(again.processed, 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_unfunded_account() {
        let fx = Fixture::new().await;
        let scheduler = fx.office.credits();
        let credit = scheduler
            .open(fx.advisor, fx.client, fx.courant, terms(15))
            .await
            .unwrap();

        let report = scheduler.sweep(date(2024, 2, 15)).await.unwrap();
        assert_eq!(report, SweepReport { processed: 0, skipped: 1 });
        let unchanged = scheduler.get(credit.id).await.unwrap();
        assert_eq!(unchanged.remaining_months, 12);
        assert_eq!(unchanged.next_payment_date, date(2024, 2, 15));
    }

    #[tokio::test]
    async fn test_last_instalment_deactivates() {
        let fx = Fixture::new().await;
        fx.fund(fx.courant, dec!(300)).await;
        let scheduler = fx.office.credits();
        let credit = scheduler
            .open(
                fx.advisor,
                fx.client,
                fx.courant,
                CreditTerms {
                    duration_months: 2,
                    ..terms(1)
                },
            )
            .await
            .unwrap();

        scheduler.advance(credit.id).await.unwrap();
        let last = scheduler.advance(credit.id).await.unwrap();
        assert!(!last.is_active);
        assert!(matches!(
            scheduler.advance(credit.id).await,
            Err(LedgerError::ValidationError(_))
        ));
        assert_eq!(fx.balance(fx.courant).await, dec!(100.00));
    }

    #[tokio::test]
    async fn test_override_and_delete() {
        let fx = Fixture::new().await;
        let scheduler = fx.office.credits();
        let credit = scheduler
            .open(fx.advisor, fx.client, fx.courant, terms(15))
            .await
            .unwrap();

        let patched = scheduler
            .override_terms(
                fx.advisor,
                credit.id,
                CreditOverride {
                    remaining_amount: Some(Balance::new(dec!(50))),
                    next_payment_date: Some(date(2024, 6, 1)),
                    ..CreditOverride::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.remaining_amount, Balance::new(dec!(50)));
        assert_eq!(patched.next_payment_date, date(2024, 6, 1));
        assert_eq!(fx.balance(fx.courant).await, dec!(0.00));

        assert!(matches!(
            scheduler.delete(fx.client, credit.id).await,
            Err(LedgerError::Forbidden(_))
        ));
        scheduler.delete(fx.advisor, credit.id).await.unwrap();
        assert!(scheduler.list(fx.courant).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_override_keeps_posted_instalment() {
        let fx = Fixture::new().await;
        fx.fund(fx.courant, dec!(500)).await;
        let scheduler = fx.office.credits();
        let credit = scheduler
            .open(fx.advisor, fx.client, fx.courant, terms(15))
            .await
            .unwrap();
        scheduler.advance(credit.id).await.unwrap();

        let patched = scheduler
            .override_terms(
                fx.advisor,
                credit.id,
                CreditOverride {
                    name: Some("Voiture".to_string()),
                    ..CreditOverride::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(patched.name, "Voiture");
        assert_eq!(patched.remaining_months, 11);
        assert_eq!(patched.next_payment_date, date(2024, 3, 15));
        assert_eq!(fx.balance(fx.courant).await, dec!(400.00));
    }

    #[tokio::test]
    async fn test_open_on_foreign_account() {
        let fx = Fixture::new().await;
        let other = fx.approved_client("Bruno").await;
        let result = fx
            .office
            .credits()
            .open(fx.advisor, other, fx.courant, terms(15))
            .await;
        assert!(matches!(result, Err(LedgerError::Forbidden(_))));
    }
}
