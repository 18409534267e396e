//! Client-initiated money movement.
//!
//! A request moves through `Draft -> PinPending -> Authorized -> Posted`.
//! Each state is its own type, so a transfer cannot reach the ledger without
//! having passed validation and the PIN gate first. Any rejection before
//! [`TransferEngine::post`] leaves every balance untouched.

use super::authority::Authority;
use super::notifier::Notifier;
use super::pin::PinVerifier;
use crate::domain::account::{Account, AccountId};
use crate::domain::beneficiary::BeneficiaryId;
use crate::domain::entry::{BalanceCheck, LedgerEntry, Leg};
use crate::domain::money::{Amount, Balance};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::{DirectoryStoreRef, LedgerStoreRef};
use crate::domain::rib::normalize_iban;
use crate::domain::transaction::{Direction, Transaction, TransactionKind};
use crate::domain::user::{User, UserId};
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A transfer as submitted by the caller (the `Draft` state).
///
/// When several destinations are given, `to_account_id` wins over
/// `beneficiary_id`, which wins over `recipient_iban`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub user_id: UserId,
    pub from_account_id: AccountId,
    #[serde(default)]
    pub to_account_id: Option<AccountId>,
    #[serde(default)]
    pub recipient_iban: Option<String>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub beneficiary_id: Option<BeneficiaryId>,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub pin: String,
}

/// Where the money goes, once the draft is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Internal(AccountId),
    External { iban: String, name: Option<String> },
    Beneficiary(BeneficiaryId),
}

/// Validated draft waiting for the PIN gate.
#[derive(Debug, Clone)]
pub struct PinPending {
    user_id: UserId,
    pin: String,
    from: AccountId,
    destination: Destination,
    amount: Amount,
    description: String,
}

impl TryFrom<TransferRequest> for PinPending {
    type Error = LedgerError;

    /// The validation gate. Pure: no store is consulted.
    fn try_from(request: TransferRequest) -> Result<Self> {
        let amount = Amount::new(request.amount)?;

        let destination = if let Some(to) = request.to_account_id {
            if to == request.from_account_id {
                return Err(LedgerError::SelfTransferToSameAccount(to));
            }
            Destination::Internal(to)
        } else if let Some(beneficiary) = request.beneficiary_id {
            Destination::Beneficiary(beneficiary)
        } else if let Some(iban) = request.recipient_iban.as_deref() {
            Destination::External {
                iban: normalize_iban(iban)?,
                name: request.recipient_name.clone(),
            }
        } else {
            return Err(LedgerError::MissingDestination);
        };

        Ok(Self {
            user_id: request.user_id,
            pin: request.pin,
            from: request.from_account_id,
            destination,
            amount,
            description: request.description.unwrap_or_default(),
        })
    }
}

impl PinPending {
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

#[derive(Debug, Clone)]
enum Counterparty {
    Internal { account: Account, holder: User },
    External { iban: String, name: Option<String> },
}

/// PIN accepted, sender approved and owning the source account.
#[derive(Debug, Clone)]
pub struct Authorized {
    sender: User,
    from: Account,
    counterparty: Counterparty,
    amount: Amount,
    description: String,
}

/// The committed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct Posted {
    pub transaction: Transaction,
    pub from_balance: Balance,
}

#[derive(Clone)]
pub struct TransferEngine {
    store: LedgerStoreRef,
    directory: DirectoryStoreRef,
    authority: Authority,
    pins: PinVerifier,
    notifier: Notifier,
    clock: ClockRef,
}

impl TransferEngine {
    pub fn new(
        store: LedgerStoreRef,
        directory: DirectoryStoreRef,
        authority: Authority,
        pins: PinVerifier,
        notifier: Notifier,
        clock: ClockRef,
    ) -> Self {
        Self {
            store,
            directory,
            authority,
            pins,
            notifier,
            clock,
        }
    }

    /// Runs a draft through every gate and posts it.
    pub async fn submit(&self, request: TransferRequest) -> Result<Posted> {
        let pending = PinPending::try_from(request).inspect_err(|e| {
            debug!(error = %e, "transfer rejected by validation");
        })?;
        let authorized = self.authorize(pending).await?;
        self.post(authorized).await
    }

    /// The PIN gate, then approval and ownership checks, then resolution of
    /// the destination. Reads only.
    pub async fn authorize(&self, pending: PinPending) -> Result<Authorized> {
        let sender = self.pins.authorize(pending.user_id, &pending.pin).await?;

        if !sender.is_approved {
            debug!(user = %sender.id, "transfer rejected: client not approved");
            return Err(LedgerError::Forbidden(format!(
                "user {} is not approved to move money",
                sender.id
            )));
        }

        let from = self.authority.account(pending.from).await?;
        if from.owner != sender.id {
            debug!(user = %sender.id, account = %from.id, "transfer rejected: not the owner");
            return Err(LedgerError::Forbidden(format!(
                "account {} does not belong to user {}",
                from.id, sender.id
            )));
        }

        let counterparty = match pending.destination {
            Destination::Internal(to) => {
                let account = self.authority.account(to).await?;
                let holder = self.authority.user(account.owner).await?;
                Counterparty::Internal { account, holder }
            }
            Destination::External { iban, name } => Counterparty::External { iban, name },
            Destination::Beneficiary(beneficiary_id) => {
                let beneficiary = self
                    .directory
                    .get_beneficiary(beneficiary_id)
                    .await?
                    .filter(|b| b.owner == sender.id)
                    .ok_or_else(|| LedgerError::BeneficiaryNotFound(beneficiary_id.to_string()))?;
                Counterparty::External {
                    iban: beneficiary.iban,
                    name: Some(beneficiary.name),
                }
            }
        };

        Ok(Authorized {
            sender,
            from,
            counterparty,
            amount: pending.amount,
            description: pending.description,
        })
    }

    /// Debit, optional credit and transaction record in one commit. The funds
    /// check runs inside that commit against the live balance.
    pub async fn post(&self, authorized: Authorized) -> Result<Posted> {
        let Authorized {
            sender,
            from,
            counterparty,
            amount,
            description,
        } = authorized;

        let mut tx = Transaction::new(
            TransactionKind::Transfer,
            amount,
            description,
            self.clock.now(),
        )
        .from_account(from.id);
        tx.sender_name = Some(sender.name.clone());

        let mut entry =
            LedgerEntry::new().leg(Leg::debit(from.id, amount, BalanceCheck::WithinOverdraft));
        let recipient = match &counterparty {
            Counterparty::Internal { account, holder } => {
                tx.to_account_id = Some(account.id);
                tx.recipient_name = Some(holder.name.clone());
                entry = entry.leg(Leg::credit(account.id, amount));
                Some(holder.id)
            }
            Counterparty::External { iban, name } => {
                tx.recipient_iban = Some(iban.clone());
                tx.recipient_name = name.clone();
                None
            }
        };

        let settled = self
            .store
            .commit(entry.recording(tx.clone()))
            .await
            .inspect_err(|e| {
                debug!(account = %from.id, %amount, error = %e, "transfer rejected at commit");
            })?;
        let from_balance = settled
            .iter()
            .find(|a| a.id == from.id)
            .map(|a| a.balance)
            .ok_or(LedgerError::AccountNotFound(from.id))?;

        info!(
            tx = %tx.id,
            from = %from.id,
            to = ?tx.to_account_id,
            iban = ?tx.recipient_iban,
            %amount,
            "transfer posted"
        );

        self.notify(&tx, sender.id, recipient).await;
        Ok(Posted {
            transaction: tx,
            from_balance,
        })
    }

    /// One notification per party, each derived from that party's own
    /// account membership.
    async fn notify(&self, tx: &Transaction, sender: UserId, recipient: Option<UserId>) {
        let mut parties = vec![sender];
        if let Some(recipient) = recipient
            && recipient != sender
        {
            parties.push(recipient);
        }

        let mut notifications = Vec::with_capacity(parties.len());
        for party in parties {
            let accounts: Vec<AccountId> = match self.store.accounts_of(party).await {
                Ok(accounts) => accounts.into_iter().map(|a| a.id).collect(),
                Err(e) => {
                    debug!(user = %party, error = %e, "cannot resolve accounts for notification");
                    continue;
                }
            };
            let counterpart = |name: &Option<String>, iban: &Option<String>| {
                name.clone()
                    .or_else(|| iban.clone())
                    .unwrap_or_else(|| "an external account".to_string())
            };
            let (kind, message) = match tx.direction_for(&accounts) {
                Direction::Outgoing => (
                    NotificationKind::TransferSent,
                    format!(
                        "Transfer of {} sent to {}",
                        tx.amount,
                        counterpart(&tx.recipient_name, &tx.recipient_iban)
                    ),
                ),
                Direction::Incoming => (
                    NotificationKind::TransferReceived,
                    format!(
                        "Transfer of {} received from {}",
                        tx.amount,
                        counterpart(&tx.sender_name, &None)
                    ),
                ),
                Direction::Internal => (
                    NotificationKind::InternalTransfer,
                    format!("Transfer of {} between your accounts", tx.amount),
                ),
                Direction::Unrelated => continue,
            };
            notifications.push(
                Notification::new(party, kind, message, tx.created_at).for_transaction(tx.id),
            );
        }
        self.notifier.publish(notifications).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{CLIENT_PIN, Fixture};
    use crate::domain::account::AccountKind;
    use rust_decimal_macros::dec;

    fn request(fx: &Fixture, to: Option<AccountId>, amount: Decimal) -> TransferRequest {
        TransferRequest {
            user_id: fx.client,
            from_account_id: fx.courant,
            to_account_id: to,
            recipient_iban: None,
            recipient_name: None,
            beneficiary_id: None,
            amount,
            description: None,
            pin: CLIENT_PIN.to_string(),
        }
    }

    #[test]
    fn test_validation_gate() {
        let from = AccountId::generate();
        let base = TransferRequest {
            user_id: UserId::generate(),
            from_account_id: from,
            to_account_id: None,
            recipient_iban: None,
            recipient_name: None,
            beneficiary_id: None,
            amount: dec!(10),
            description: None,
            pin: "000000".to_string(),
        };

        assert!(matches!(
            PinPending::try_from(TransferRequest {
                amount: dec!(0),
                to_account_id: Some(AccountId::generate()),
                ..base.clone()
            }),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            PinPending::try_from(base.clone()),
            Err(LedgerError::MissingDestination)
        ));
        assert!(matches!(
            PinPending::try_from(TransferRequest {
                to_account_id: Some(from),
                ..base.clone()
            }),
            Err(LedgerError::SelfTransferToSameAccount(_))
        ));
        assert!(matches!(
            PinPending::try_from(TransferRequest {
                recipient_iban: Some("FR76 3000 6000 0112 3456 7890 188".to_string()),
                ..base.clone()
            }),
            Err(LedgerError::InvalidIban(_))
        ));

        let both = PinPending::try_from(TransferRequest {
            to_account_id: Some(AccountId::generate()),
            recipient_iban: Some("FR7630006000011234567890189".to_string()),
            ..base
        })
        .unwrap();
        assert!(matches!(both.destination(), Destination::Internal(_)));
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let fx = Fixture::new().await;
        let other = fx.approved_client("Bruno").await;
        let to = fx.open(other, AccountKind::Courant, "Courant").await;
        fx.fund(fx.courant, dec!(100)).await;
        fx.fund(to, dec!(20)).await;

        let result = fx
            .office
            .transfers()
            .submit(request(&fx, Some(to), dec!(150)))
            .await;
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(fx.balance(fx.courant).await, dec!(100.00));
        assert_eq!(fx.balance(to).await, dec!(20.00));
        assert_eq!(fx.office.ledger().history(fx.client, fx.courant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_overdraft_transfer_and_conservation() {
        let fx = Fixture::new().await;
        let other = fx.approved_client("Bruno").await;
        let to = fx.open(other, AccountKind::Courant, "Courant").await;
        fx.fund(fx.courant, dec!(100)).await;
        fx.office
            .ledger()
            .set_overdraft_limit(fx.advisor, fx.courant, dec!(50))
            .await
            .unwrap();

        let posted = fx
            .office
            .transfers()
            .submit(request(&fx, Some(to), dec!(130)))
            .await
            .unwrap();
        assert_eq!(posted.from_balance, Balance::new(dec!(-30)));
        assert_eq!(fx.balance(fx.courant).await, dec!(-30.00));
        assert_eq!(fx.balance(to).await, dec!(130.00));
        assert_eq!(posted.transaction.recipient_name.as_deref(), Some("Bruno"));

        let sent = fx.office.notifications().list(fx.client).await.unwrap();
        assert!(sent.iter().any(|n| n.kind == NotificationKind::TransferSent));
        let received = fx.office.notifications().list(other).await.unwrap();
        assert!(received
            .iter()
            .any(|n| n.kind == NotificationKind::TransferReceived));
    }

    #[tokio::test]
    async fn test_wrong_pin_changes_nothing() {
        let fx = Fixture::new().await;
        let savings = fx.open(fx.client, AccountKind::Epargne, "Livret").await;
        fx.fund(fx.courant, dec!(100)).await;

        let mut bad = request(&fx, Some(savings), dec!(10));
        bad.pin = "999999".to_string();
        assert!(matches!(
            fx.office.transfers().submit(bad).await,
            Err(LedgerError::InvalidPin)
        ));
        assert_eq!(fx.balance(fx.courant).await, dec!(100.00));
        assert_eq!(fx.balance(savings).await, dec!(0.00));
    }

    #[tokio::test]
    async fn test_internal_transfer_between_own_accounts() {
        let fx = Fixture::new().await;
        let savings = fx.open(fx.client, AccountKind::Epargne, "Livret").await;
        fx.fund(fx.courant, dec!(100)).await;

        fx.office
            .transfers()
            .submit(request(&fx, Some(savings), dec!(40)))
            .await
            .unwrap();

        let notes = fx.office.notifications().list(fx.client).await.unwrap();
        let transfers: Vec<_> = notes
            .iter()
            .filter(|n| n.transaction_id.is_some() && n.kind != NotificationKind::Deposit)
            .collect();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].kind, NotificationKind::InternalTransfer);
    }

    #[tokio::test]
    async fn test_external_and_beneficiary_transfers() {
        let fx = Fixture::new().await;
        fx.fund(fx.courant, dec!(100)).await;

        let mut external = request(&fx, None, dec!(25));
        external.recipient_iban = Some("de89 3704 0044 0532 0130 00".to_string());
        let posted = fx.office.transfers().submit(external).await.unwrap();
        assert_eq!(
            posted.transaction.recipient_iban.as_deref(),
            Some("DE89370400440532013000")
        );
        assert_eq!(posted.transaction.to_account_id, None);

        let payee = fx
            .office
            .beneficiaries()
            .add(fx.client, "Landlord", "GB82WEST12345698765432")
            .await
            .unwrap();
        let mut saved = request(&fx, None, dec!(25));
        saved.beneficiary_id = Some(payee.id);
        let posted = fx.office.transfers().submit(saved).await.unwrap();
        assert_eq!(posted.transaction.recipient_name.as_deref(), Some("Landlord"));
        assert_eq!(fx.balance(fx.courant).await, dec!(50.00));
    }

    #[tokio::test]
    async fn test_unapproved_client_and_foreign_account() {
        let fx = Fixture::new().await;
        let users = fx.office.users();
        let pending = users.register_client(fx.advisor, "Nina").await.unwrap();
        users.set_pin(pending.id, pending.id, None, CLIENT_PIN).await.unwrap();
        let nina_account = fx.open(pending.id, AccountKind::Courant, "Courant").await;

        let mut req = request(&fx, Some(fx.courant), dec!(1));
        req.user_id = pending.id;
        req.from_account_id = nina_account;
        assert!(matches!(
            fx.office.transfers().submit(req).await,
            Err(LedgerError::Forbidden(_))
        ));

        let mut foreign = request(&fx, Some(fx.courant), dec!(1));
        foreign.from_account_id = nina_account;
        assert!(matches!(
            fx.office.transfers().submit(foreign).await,
            Err(LedgerError::Forbidden(_))
        ));
    }
}
