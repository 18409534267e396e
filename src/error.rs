use crate::domain::account::{AccountId, AccountKind};
use crate::domain::user::UserId;
use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

/// Where a failure sits in the back-office error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected before any state change because the request itself is malformed.
    Validation,
    /// Rejected because the caller is not allowed to perform the operation.
    Authorization,
    /// Rejected because of the current state of a stored resource.
    Resource,
    /// The store failed; the whole unit of work was aborted and may be retried.
    Persistence,
}

#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    #[diagnostic(
        code(ledger::invalid_amount),
        help("amounts must be positive with at most two decimal places")
    )]
    InvalidAmount(String),

    #[error("Transfer has no destination")]
    #[diagnostic(
        code(ledger::missing_destination),
        help("provide a destination account, a recipient IBAN or a beneficiary")
    )]
    MissingDestination,

    #[error("Cannot transfer from account {0} to itself")]
    #[diagnostic(code(ledger::self_transfer))]
    SelfTransferToSameAccount(AccountId),

    #[error("Incorrect PIN")]
    #[diagnostic(code(ledger::invalid_pin))]
    InvalidPin,

    #[error("No PIN is set for user {0}")]
    #[diagnostic(
        code(ledger::pin_not_set),
        help("a PIN must be configured before any money movement")
    )]
    PinNotSet(UserId),

    #[error("Invalid PIN format: {0}")]
    #[diagnostic(code(ledger::invalid_pin_format))]
    InvalidPinFormat(String),

    #[error("PIN hashing failed: {0}")]
    #[diagnostic(code(ledger::pin_hashing))]
    PinHashing(String),

    #[error(
        "Insufficient funds on account {account_id}: balance {balance}, requested {requested}, overdraft limit {overdraft_limit}"
    )]
    #[diagnostic(code(ledger::insufficient_funds))]
    InsufficientFunds {
        account_id: AccountId,
        balance: Decimal,
        requested: Decimal,
        overdraft_limit: Decimal,
    },

    #[error("Account not found: {0}")]
    #[diagnostic(code(ledger::account_not_found))]
    AccountNotFound(AccountId),

    #[error("User not found: {0}")]
    #[diagnostic(code(ledger::user_not_found))]
    UserNotFound(UserId),

    #[error("Credit not found: {0}")]
    #[diagnostic(code(ledger::credit_not_found))]
    CreditNotFound(String),

    #[error("Card not found: {0}")]
    #[diagnostic(code(ledger::card_not_found))]
    CardNotFound(String),

    #[error("Beneficiary not found: {0}")]
    #[diagnostic(code(ledger::beneficiary_not_found))]
    BeneficiaryNotFound(String),

    #[error("No RIB registered for user {0}")]
    #[diagnostic(code(ledger::rib_not_found))]
    RibNotFound(UserId),

    #[error("User {0} already has a RIB")]
    #[diagnostic(
        code(ledger::duplicate_rib),
        help("update or delete the existing RIB instead")
    )]
    DuplicateRib(UserId),

    #[error("IBAN {0} is already registered")]
    #[diagnostic(code(ledger::duplicate_iban))]
    DuplicateIban(String),

    #[error("Invalid IBAN: {0}")]
    #[diagnostic(code(ledger::invalid_iban))]
    InvalidIban(String),

    #[error("Account {account_id} still holds {balance}")]
    #[diagnostic(
        code(ledger::non_zero_balance),
        help("only accounts with a balance of exactly 0.00 can be closed")
    )]
    NonZeroBalance {
        account_id: AccountId,
        balance: Decimal,
    },

    #[error("User {owner} already holds {limit} {kind} accounts")]
    #[diagnostic(code(ledger::limit_exceeded))]
    LimitExceeded {
        owner: UserId,
        kind: AccountKind,
        limit: usize,
    },

    #[error("Balance of account {0} is not negative")]
    #[diagnostic(code(ledger::balance_not_negative))]
    BalanceNotNegative(AccountId),

    #[error("Overdraft fee already charged for account {0}")]
    #[diagnostic(code(ledger::fee_already_charged))]
    FeeAlreadyCharged(AccountId),

    #[error("Forbidden: {0}")]
    #[diagnostic(code(ledger::forbidden))]
    Forbidden(String),

    #[error("Validation error: {0}")]
    #[diagnostic(code(ledger::validation))]
    ValidationError(String),

    #[error("Write conflict: {0}")]
    #[diagnostic(
        code(ledger::write_conflict),
        help("the record changed concurrently; retry the whole operation")
    )]
    WriteConflict(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(ledger::io))]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    #[diagnostic(code(ledger::csv))]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(ledger::serialization))]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    #[diagnostic(code(ledger::storage))]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        LedgerError::Storage(Box::new(e))
    }
}

impl LedgerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::InvalidAmount(_)
            | LedgerError::MissingDestination
            | LedgerError::SelfTransferToSameAccount(_)
            | LedgerError::InvalidPinFormat(_)
            | LedgerError::InvalidIban(_)
            | LedgerError::ValidationError(_) => ErrorCategory::Validation,
            LedgerError::InvalidPin
            | LedgerError::PinNotSet(_)
            | LedgerError::PinHashing(_)
            | LedgerError::Forbidden(_) => ErrorCategory::Authorization,
            LedgerError::InsufficientFunds { .. }
            | LedgerError::AccountNotFound(_)
            | LedgerError::UserNotFound(_)
            | LedgerError::CreditNotFound(_)
            | LedgerError::CardNotFound(_)
            | LedgerError::BeneficiaryNotFound(_)
            | LedgerError::RibNotFound(_)
            | LedgerError::DuplicateRib(_)
            | LedgerError::DuplicateIban(_)
            | LedgerError::NonZeroBalance { .. }
            | LedgerError::LimitExceeded { .. }
            | LedgerError::BalanceNotNegative(_)
            | LedgerError::FeeAlreadyCharged(_) => ErrorCategory::Resource,
            LedgerError::WriteConflict(_)
            | LedgerError::Io(_)
            | LedgerError::Csv(_)
            | LedgerError::Serialization(_)
            | LedgerError::Storage(_) => ErrorCategory::Persistence,
        }
    }

    /// Persistence failures abort the whole unit of work, so the caller may
    /// resubmit the operation from the start.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Persistence
    }

    pub fn storage(message: impl Into<String>) -> Self {
        let message: String = message.into();
        LedgerError::Storage(message.into())
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
