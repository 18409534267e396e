use super::command::Command;
use crate::application::back_office::BackOffice;
use crate::application::transfer::TransferRequest;
use crate::domain::account::AccountId;
use crate::domain::beneficiary::BeneficiaryId;
use crate::domain::card::{BlockRequest, CardId};
use crate::domain::credit::CreditId;
use crate::domain::money::Amount;
use crate::domain::user::UserId;
use crate::error::Result;
use crate::infrastructure::clock::FixedClock;
use chrono::NaiveTime;
use tracing::debug;

/// Applies journal commands to a back office driven by a settable clock.
pub struct JournalInterpreter {
    office: BackOffice,
    clock: FixedClock,
}

impl JournalInterpreter {
    /// `clock` must be the clock `office` was built with, so that
    /// `set_date` moves the business date the services see.
    pub fn new(office: BackOffice, clock: FixedClock) -> Self {
        Self { office, clock }
    }

    pub fn office(&self) -> &BackOffice {
        &self.office
    }

    pub async fn apply(&self, command: Command) -> Result<()> {
        let office = &self.office;
        match command {
            Command::RegisterAdvisor { id, name } => {
                office
                    .users()
                    .register_advisor_with_id(UserId::from_label(&id), &name)
                    .await?;
            }
            Command::RegisterClient { id, advisor, name } => {
                office
                    .users()
                    .register_client_with_id(
                        UserId::from_label(&id),
                        UserId::from_label(&advisor),
                        &name,
                    )
                    .await?;
            }
            Command::ApproveClient { advisor, client } => {
                office
                    .users()
                    .approve(UserId::from_label(&advisor), UserId::from_label(&client))
                    .await?;
            }
            Command::SetPin {
                user,
                by,
                current_pin,
                pin,
            } => {
                let actor = UserId::from_label(by.as_deref().unwrap_or(&user));
                office
                    .users()
                    .set_pin(
                        actor,
                        UserId::from_label(&user),
                        current_pin.as_deref(),
                        &pin,
                    )
                    .await?;
            }
            Command::OpenAccount {
                advisor,
                owner,
                id,
                kind,
                name,
            } => {
                office
                    .ledger()
                    .create_account_with_id(
                        AccountId::from_label(&id),
                        UserId::from_label(&advisor),
                        UserId::from_label(&owner),
                        kind,
                        &name,
                    )
                    .await?;
            }
            Command::CloseAccount { advisor, account } => {
                office
                    .ledger()
                    .delete_account(UserId::from_label(&advisor), AccountId::from_label(&account))
                    .await?;
            }
            Command::SetOverdraftLimit {
                advisor,
                account,
                limit,
            } => {
                office
                    .ledger()
                    .set_overdraft_limit(
                        UserId::from_label(&advisor),
                        AccountId::from_label(&account),
                        limit,
                    )
                    .await?;
            }
            Command::Deposit {
                advisor,
                account,
                amount,
                description,
            } => {
                office
                    .ledger()
                    .deposit(
                        UserId::from_label(&advisor),
                        AccountId::from_label(&account),
                        Amount::new(amount)?,
                        description.as_deref().unwrap_or("Deposit"),
                    )
                    .await?;
            }
            Command::Withdraw {
                advisor,
                account,
                amount,
                description,
            } => {
                office
                    .ledger()
                    .withdraw(
                        UserId::from_label(&advisor),
                        AccountId::from_label(&account),
                        Amount::new(amount)?,
                        description.as_deref().unwrap_or("Withdrawal"),
                    )
                    .await?;
            }
            Command::Transfer {
                user,
                from,
                to,
                iban,
                recipient_name,
                beneficiary,
                amount,
                description,
                pin,
            } => {
                let request = TransferRequest {
                    user_id: UserId::from_label(&user),
                    from_account_id: AccountId::from_label(&from),
                    to_account_id: to.as_deref().map(AccountId::from_label),
                    recipient_iban: iban,
                    recipient_name,
                    beneficiary_id: beneficiary.as_deref().map(BeneficiaryId::from_label),
                    amount,
                    description,
                    pin,
                };
                office.transfers().submit(request).await?;
            }
            Command::PutRib { advisor, user, rib } => {
                office
                    .ribs()
                    .put(UserId::from_label(&advisor), UserId::from_label(&user), rib)
                    .await?;
            }
            Command::UpdateRib {
                advisor,
                user,
                patch,
            } => {
                office
                    .ribs()
                    .update(UserId::from_label(&advisor), UserId::from_label(&user), patch)
                    .await?;
            }
            Command::DeleteRib { advisor, user } => {
                office
                    .ribs()
                    .delete(UserId::from_label(&advisor), UserId::from_label(&user))
                    .await?;
            }
            Command::OpenCredit {
                advisor,
                user,
                account,
                id,
                terms,
            } => {
                office
                    .credits()
                    .open_with_id(
                        CreditId::from_label(&id),
                        UserId::from_label(&advisor),
                        UserId::from_label(&user),
                        AccountId::from_label(&account),
                        terms,
                    )
                    .await?;
            }
            Command::AdvanceCredit { credit } => {
                office.credits().advance(CreditId::from_label(&credit)).await?;
            }
            Command::OverrideCredit {
                advisor,
                credit,
                patch,
            } => {
                office
                    .credits()
                    .override_terms(
                        UserId::from_label(&advisor),
                        CreditId::from_label(&credit),
                        patch,
                    )
                    .await?;
            }
            Command::DeleteCredit { advisor, credit } => {
                office
                    .credits()
                    .delete(UserId::from_label(&advisor), CreditId::from_label(&credit))
                    .await?;
            }
            Command::IssueCard {
                advisor,
                account,
                id,
                is_virtual,
                pin,
            } => {
                office
                    .cards()
                    .issue_with_id(
                        CardId::from_label(&id),
                        UserId::from_label(&advisor),
                        AccountId::from_label(&account),
                        is_virtual,
                        &pin,
                    )
                    .await?;
            }
            Command::BlockCard {
                user,
                card,
                confirmations,
            } => {
                let mut request: BlockRequest = office
                    .cards()
                    .request_block(UserId::from_label(&user), CardId::from_label(&card))
                    .await?;
                for _ in 0..confirmations {
                    request = request.confirm();
                }
                office.cards().block(request).await?;
            }
            Command::UnblockCard { advisor, card } => {
                office
                    .cards()
                    .unblock(UserId::from_label(&advisor), CardId::from_label(&card))
                    .await?;
            }
            Command::AddBeneficiary {
                user,
                id,
                name,
                iban,
            } => {
                office
                    .beneficiaries()
                    .add_with_id(
                        BeneficiaryId::from_label(&id),
                        UserId::from_label(&user),
                        &name,
                        &iban,
                    )
                    .await?;
            }
            Command::RemoveBeneficiary { user, beneficiary } => {
                office
                    .beneficiaries()
                    .remove(
                        UserId::from_label(&user),
                        BeneficiaryId::from_label(&beneficiary),
                    )
                    .await?;
            }
            Command::SetDate { date } => {
                self.clock.set(date.and_time(NaiveTime::MIN).and_utc());
                debug!(%date, "business date moved");
            }
            Command::Sweep => {
                office.sweeper().run_once().await?;
            }
            Command::CheckOverdraft { account } => {
                office.balance(AccountId::from_label(&account)).await?;
            }
        }
        Ok(())
    }
}
