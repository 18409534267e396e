use super::authority::Authority;
use super::notifier::Notifier;
use crate::domain::account::AccountId;
use crate::domain::card::{BlockRequest, Card, CardId};
use crate::domain::notification::{Notification, NotificationKind};
use crate::domain::ports::DirectoryStoreRef;
use crate::domain::user::UserId;
use crate::error::{LedgerError, Result};
use crate::infrastructure::clock::ClockRef;
use tracing::info;

/// Card issuance and the blocked flag.
#[derive(Clone)]
pub struct CardDesk {
    directory: DirectoryStoreRef,
    authority: Authority,
    notifier: Notifier,
    clock: ClockRef,
}

impl CardDesk {
    pub fn new(
        directory: DirectoryStoreRef,
        authority: Authority,
        notifier: Notifier,
        clock: ClockRef,
    ) -> Self {
        Self {
            directory,
            authority,
            notifier,
            clock,
        }
    }

    pub async fn issue(
        &self,
        actor: UserId,
        account_id: AccountId,
        is_virtual: bool,
        pin: &str,
    ) -> Result<Card> {
        self.issue_with_id(CardId::generate(), actor, account_id, is_virtual, pin)
            .await
    }

    /// Issues a card for the account holder. `actor` must be their advisor.
    pub async fn issue_with_id(
        &self,
        id: CardId,
        actor: UserId,
        account_id: AccountId,
        is_virtual: bool,
        pin: &str,
    ) -> Result<Card> {
        let (holder, account) = self.authority.advisor_of_account(actor, account_id).await?;
        if self.directory.get_card(id).await?.is_some() {
            return Err(LedgerError::ValidationError(format!("card {id} already exists")));
        }
        let card = Card::issue(id, account.id, holder.id, is_virtual, pin, self.clock.now())?;
        self.directory.save_card(card.clone()).await?;
        info!(card = %card.id, account = %account_id, is_virtual, "card issued");
        Ok(card)
    }

    pub async fn get(&self, card_id: CardId) -> Result<Card> {
        self.directory
            .get_card(card_id)
            .await?
            .ok_or_else(|| LedgerError::CardNotFound(card_id.to_string()))
    }

    pub async fn cards_for(&self, account_id: AccountId) -> Result<Vec<Card>> {
        self.directory.cards_for(account_id).await
    }

    /// First step of the holder's blocking flow.
    pub async fn request_block(&self, actor: UserId, card_id: CardId) -> Result<BlockRequest> {
        let card = self.get(card_id).await?;
        if card.holder != actor {
            return Err(LedgerError::Forbidden(format!(
                "card {card_id} is not held by user {actor}"
            )));
        }
        Ok(BlockRequest::new(card_id, actor))
    }

    /// Executes a block request that was confirmed twice.
    pub async fn block(&self, request: BlockRequest) -> Result<Card> {
        if !request.is_final() {
            return Err(LedgerError::ValidationError(format!(
                "blocking card {} must be confirmed twice (currently {:?})",
                request.card_id,
                request.step()
            )));
        }
        let mut card = self.get(request.card_id).await?;
        if card.holder != request.requested_by {
            return Err(LedgerError::Forbidden(format!(
                "card {} is not held by user {}",
                card.id, request.requested_by
            )));
        }
        if card.is_blocked {
            return Ok(card);
        }

        card.is_blocked = true;
        self.directory.save_card(card.clone()).await?;
        info!(card = %card.id, "card blocked");
        self.notifier
            .publish([Notification::new(
                card.holder,
                NotificationKind::CardBlocked,
                format!("Card {} has been blocked", card.masked_number),
                self.clock.now(),
            )])
            .await;
        Ok(card)
    }

    /// Only the holder's advisor may lift a block.
    pub async fn unblock(&self, actor: UserId, card_id: CardId) -> Result<Card> {
        let mut card = self.get(card_id).await?;
        self.authority.advisor_of(actor, card.holder).await?;
        if !card.is_blocked {
            return Ok(card);
        }

        card.is_blocked = false;
        self.directory.save_card(card.clone()).await?;
        info!(card = %card.id, advisor = %actor, "card unblocked");
        self.notifier
            .publish([Notification::new(
                card.holder,
                NotificationKind::CardUnblocked,
                format!("Card {} has been unblocked", card.masked_number),
                self.clock.now(),
            )])
            .await;
        Ok(card)
    }

    /// A blocked card never accepts its PIN.
    pub async fn verify_pin(&self, card_id: CardId, candidate: &str) -> Result<bool> {
        let card = self.get(card_id).await?;
        Ok(!card.is_blocked && card.pin_matches(candidate))
    }
}

#[cfg(test)]
mod tests {
    use crate::application::test_support::Fixture;
    use crate::domain::card::BlockStep;
    use crate::domain::notification::NotificationKind;
    use crate::error::LedgerError;

    #[tokio::test]
    async fn test_three_step_block_and_advisor_unblock() {
        let fx = Fixture::new().await;
        let cards = fx.office.cards();
        let card = cards.issue(fx.advisor, fx.courant, false, "4321").await.unwrap();
        assert!(card.masked_number.starts_with("**** **** **** "));
        assert!(cards.verify_pin(card.id, "4321").await.unwrap());

        let request = cards.request_block(fx.client, card.id).await.unwrap();
        assert!(matches!(
            cards.block(request).await,
            Err(LedgerError::ValidationError(_))
        ));
        let request = request.confirm();
        assert_eq!(request.step(), BlockStep::Confirmed);
        assert!(cards.block(request).await.is_err());

        let blocked = cards.block(request.confirm()).await.unwrap();
        assert!(blocked.is_blocked);
        assert!(!cards.verify_pin(card.id, "4321").await.unwrap());

        assert!(matches!(
            cards.unblock(fx.client, card.id).await,
            Err(LedgerError::Forbidden(_))
        ));
        let unblocked = cards.unblock(fx.advisor, card.id).await.unwrap();
        assert!(!unblocked.is_blocked);

        let kinds: Vec<NotificationKind> = fx
            .office
            .notifications()
            .list(fx.client)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert!(kinds.contains(&NotificationKind::CardBlocked));
        assert!(kinds.contains(&NotificationKind::CardUnblocked));
    }

    #[tokio::test]
    async fn test_only_holder_requests_block() {
        let fx = Fixture::new().await;
        let cards = fx.office.cards();
        let card = cards.issue(fx.advisor, fx.courant, true, "0000").await.unwrap();

        let stranger = fx.approved_client("Bruno").await;
        assert!(matches!(
            cards.request_block(stranger, card.id).await,
            Err(LedgerError::Forbidden(_))
        ));
        assert!(matches!(
            cards.issue(fx.advisor, fx.courant, true, "12345").await,
            Err(LedgerError::InvalidPinFormat(_))
        ));
    }
}
