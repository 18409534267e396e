use super::back_office::BackOffice;
use crate::config::EngineConfig;
use crate::domain::account::{AccountId, AccountKind};
use crate::domain::money::Amount;
use crate::domain::user::UserId;
use crate::infrastructure::clock::{Clock, FixedClock};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

pub(crate) const CLIENT_PIN: &str = "123456";

/// An in-memory back office with one advisor, one approved client holding
/// a PIN, and that client's empty current account. The clock starts on
/// 2024-01-10 09:00 UTC.
pub(crate) struct Fixture {
    pub office: BackOffice,
    pub clock: FixedClock,
    pub advisor: UserId,
    pub client: UserId,
    pub courant: AccountId,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        let office = BackOffice::in_memory(Arc::new(clock.clone()), &config).unwrap();
        let advisor = office.users().register_advisor("Claire").await.unwrap().id;

        let mut fx = Self {
            office,
            clock,
            advisor,
            client: advisor,
            courant: AccountId::generate(),
        };
        fx.client = fx.approved_client("Alice").await;
        fx.courant = fx.open(fx.client, AccountKind::Courant, "Compte courant").await;
        fx
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn approved_client(&self, name: &str) -> UserId {
        let users = self.office.users();
        let client = users.register_client(self.advisor, name).await.unwrap();
        users.approve(self.advisor, client.id).await.unwrap();
        users.set_pin(client.id, client.id, None, CLIENT_PIN).await.unwrap();
        client.id
    }

    pub async fn open(&self, owner: UserId, kind: AccountKind, name: &str) -> AccountId {
        self.office
            .ledger()
            .create_account(self.advisor, owner, kind, name)
            .await
            .unwrap()
            .id
    }

    pub async fn fund(&self, account: AccountId, amount: Decimal) {
        self.office
            .ledger()
            .deposit(self.advisor, account, Amount::new(amount).unwrap(), "funding")
            .await
            .unwrap();
    }

    /// Withdraws `amount` under a generous overdraft limit.
    pub async fn overdraw(&self, account: AccountId, amount: Decimal) {
        let ledger = self.office.ledger();
        ledger
            .set_overdraft_limit(self.advisor, account, Decimal::new(100_000, 0))
            .await
            .unwrap();
        ledger
            .withdraw(self.advisor, account, Amount::new(amount).unwrap(), "cash")
            .await
            .unwrap();
    }

    pub async fn balance(&self, account: AccountId) -> Decimal {
        self.office.ledger().get_balance(account).await.unwrap().value()
    }
}
