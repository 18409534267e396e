use crate::domain::account::{Account, AccountId, AccountKind};
use crate::domain::money::Balance;
use crate::domain::user::UserId;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow<'a> {
    account: AccountId,
    owner: UserId,
    #[serde(rename = "type")]
    kind: AccountKind,
    name: &'a str,
    balance: Balance,
    overdraft_limit: Balance,
}

impl<'a> From<&'a Account> for AccountRow<'a> {
    fn from(account: &'a Account) -> Self {
        Self {
            account: account.id,
            owner: account.owner,
            kind: account.kind,
            name: &account.name,
            balance: account.balance,
            overdraft_limit: account.overdraft_limit,
        }
    }
}

/// Writes the account statement as CSV.
///
/// Monetary columns always carry two decimal places.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_accounts(&mut self, accounts: impl IntoIterator<Item = Account>) -> Result<()> {
        let mut wrote_any = false;
        for account in accounts {
            self.writer.serialize(AccountRow::from(&account))?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer.write_record([
                "account",
                "owner",
                "type",
                "name",
                "balance",
                "overdraft_limit",
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
