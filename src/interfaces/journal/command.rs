use crate::domain::account::AccountKind;
use crate::domain::credit::{CreditOverride, CreditTerms};
use crate::domain::rib::{RibFields, RibPatch};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

/// One line of the command journal.
///
/// Entities are referred to by free-form labels (`"alice"`,
/// `"alice-courant"`), mapped to stable ids when the command is applied.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    RegisterAdvisor {
        id: String,
        name: String,
    },
    RegisterClient {
        id: String,
        advisor: String,
        name: String,
    },
    ApproveClient {
        advisor: String,
        client: String,
    },
    /// `by` defaults to `user`. Changing an existing PIN needs
    /// `current_pin`.
    SetPin {
        user: String,
        #[serde(default)]
        by: Option<String>,
        #[serde(default)]
        current_pin: Option<String>,
        pin: String,
    },
    OpenAccount {
        advisor: String,
        owner: String,
        id: String,
        kind: AccountKind,
        name: String,
    },
    CloseAccount {
        advisor: String,
        account: String,
    },
    SetOverdraftLimit {
        advisor: String,
        account: String,
        limit: Decimal,
    },
    Deposit {
        advisor: String,
        account: String,
        amount: Decimal,
        #[serde(default)]
        description: Option<String>,
    },
    Withdraw {
        advisor: String,
        account: String,
        amount: Decimal,
        #[serde(default)]
        description: Option<String>,
    },
    Transfer {
        user: String,
        from: String,
        #[serde(default)]
        to: Option<String>,
        #[serde(default)]
        iban: Option<String>,
        #[serde(default)]
        recipient_name: Option<String>,
        #[serde(default)]
        beneficiary: Option<String>,
        amount: Decimal,
        #[serde(default)]
        description: Option<String>,
        pin: String,
    },
    PutRib {
        advisor: String,
        user: String,
        rib: RibFields,
    },
    UpdateRib {
        advisor: String,
        user: String,
        patch: RibPatch,
    },
    DeleteRib {
        advisor: String,
        user: String,
    },
    OpenCredit {
        advisor: String,
        user: String,
        account: String,
        id: String,
        terms: CreditTerms,
    },
    AdvanceCredit {
        credit: String,
    },
    OverrideCredit {
        advisor: String,
        credit: String,
        patch: CreditOverride,
    },
    DeleteCredit {
        advisor: String,
        credit: String,
    },
    IssueCard {
        advisor: String,
        account: String,
        id: String,
        #[serde(default)]
        is_virtual: bool,
        pin: String,
    },
    /// `confirmations` is the number of times the holder confirmed the
    /// request; two are needed.
    BlockCard {
        user: String,
        card: String,
        #[serde(default)]
        confirmations: u8,
    },
    UnblockCard {
        advisor: String,
        card: String,
    },
    AddBeneficiary {
        user: String,
        id: String,
        name: String,
        iban: String,
    },
    RemoveBeneficiary {
        user: String,
        beneficiary: String,
    },
    /// Moves the business clock to midnight UTC of `date`.
    SetDate {
        date: NaiveDate,
    },
    Sweep,
    CheckOverdraft {
        account: String,
    },
}
