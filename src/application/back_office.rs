use super::authority::Authority;
use super::beneficiaries::BeneficiaryBook;
use super::cards::CardDesk;
use super::credit::CreditScheduler;
use super::ledger::AccountLedger;
use super::notifier::Notifier;
use super::overdraft::OverdraftFeeEngine;
use super::pin::PinVerifier;
use super::rib::RibRegistry;
use super::sweep::Sweeper;
use super::transfer::TransferEngine;
use super::users::UserRegistry;
use crate::config::EngineConfig;
use crate::domain::account::{Account, AccountId};
use crate::domain::money::Balance;
use crate::domain::ports::{DirectoryStoreRef, LedgerStoreRef, NotificationSinkRef};
use crate::error::Result;
use crate::infrastructure::clock::ClockRef;
use crate::infrastructure::in_memory::{
    InMemoryDirectoryStore, InMemoryLedgerStore, InMemoryNotificationSink,
};
use std::sync::Arc;
use tracing::warn;

/// The main entry point of the back office.
///
/// `BackOffice` owns the storage backends and hands out the services built
/// on them. Services are cheap to clone and share the same stores, so a
/// clone can be moved into a spawned task.
#[derive(Clone)]
pub struct BackOffice {
    users: UserRegistry,
    pins: PinVerifier,
    ledger: AccountLedger,
    transfers: TransferEngine,
    credits: CreditScheduler,
    fees: OverdraftFeeEngine,
    ribs: RibRegistry,
    cards: CardDesk,
    beneficiaries: BeneficiaryBook,
    notifier: Notifier,
    sweeper: Sweeper,
}

impl BackOffice {
    /// Wires every service over the given stores.
    ///
    /// Fails if `config` is invalid.
    pub fn new(
        store: LedgerStoreRef,
        directory: DirectoryStoreRef,
        sink: NotificationSinkRef,
        clock: ClockRef,
        config: &EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let authority = Authority::new(directory.clone(), store.clone());
        let notifier = Notifier::new(sink);
        let pins = PinVerifier::new(authority.clone());

        let users = UserRegistry::new(
            directory.clone(),
            authority.clone(),
            pins.clone(),
            clock.clone(),
        );
        let ledger = AccountLedger::new(
            store.clone(),
            authority.clone(),
            notifier.clone(),
            clock.clone(),
            config.max_current_accounts,
        );
        let transfers = TransferEngine::new(
            store.clone(),
            directory.clone(),
            authority.clone(),
            pins.clone(),
            notifier.clone(),
            clock.clone(),
        );
        let credits = CreditScheduler::new(
            store.clone(),
            authority.clone(),
            notifier.clone(),
            clock.clone(),
        );
        let fees = OverdraftFeeEngine::new(
            store,
            notifier.clone(),
            clock.clone(),
            config.overdraft_fee()?,
            config.fee_policy,
        );
        let ribs = RibRegistry::new(directory.clone(), authority.clone(), clock.clone());
        let cards = CardDesk::new(
            directory.clone(),
            authority.clone(),
            notifier.clone(),
            clock.clone(),
        );
        let beneficiaries = BeneficiaryBook::new(directory, authority, clock.clone());
        let sweeper = Sweeper::new(
            credits.clone(),
            fees.clone(),
            clock,
            config.sweep_interval(),
        );

        Ok(Self {
            users,
            pins,
            ledger,
            transfers,
            credits,
            fees,
            ribs,
            cards,
            beneficiaries,
            notifier,
            sweeper,
        })
    }

    /// A back office over fresh in-memory stores.
    pub fn in_memory(clock: ClockRef, config: &EngineConfig) -> Result<Self> {
        Self::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryDirectoryStore::new()),
            Arc::new(InMemoryNotificationSink::new()),
            clock,
            config,
        )
    }

    pub fn users(&self) -> &UserRegistry {
        &self.users
    }

    pub fn pins(&self) -> &PinVerifier {
        &self.pins
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn transfers(&self) -> &TransferEngine {
        &self.transfers
    }

    pub fn credits(&self) -> &CreditScheduler {
        &self.credits
    }

    pub fn fees(&self) -> &OverdraftFeeEngine {
        &self.fees
    }

    pub fn ribs(&self) -> &RibRegistry {
        &self.ribs
    }

    pub fn cards(&self) -> &CardDesk {
        &self.cards
    }

    pub fn beneficiaries(&self) -> &BeneficiaryBook {
        &self.beneficiaries
    }

    pub fn notifications(&self) -> &Notifier {
        &self.notifier
    }

    pub fn sweeper(&self) -> Sweeper {
        self.sweeper.clone()
    }

    /// Balance as displayed to a user.
    ///
    /// Reading a balance is also when the overdraft fee is evaluated. A
    /// failing fee check is logged and does not hide the balance.
    pub async fn balance(&self, account_id: AccountId) -> Result<Balance> {
        if let Err(e) = self.fees.check(account_id).await {
            warn!(account = %account_id, error = %e, "overdraft check on read failed");
        }
        self.ledger.get_balance(account_id).await
    }

    /// Final state of every account, for the statement.
    pub async fn statement(&self) -> Result<Vec<Account>> {
        self.ledger.all_accounts().await
    }
}
