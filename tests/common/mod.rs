#![allow(dead_code)]

use bank_ledger::domain::account::AccountId;
use bank_ledger::domain::user::UserId;
use std::io::{Error, Write};
use tempfile::NamedTempFile;

/// An advisor, one approved client with PIN `123456`, and the client's
/// current and savings accounts, the former funded with 100.
pub const SETUP: &[&str] = &[
    r#"{"op":"register_advisor","id":"claire","name":"Claire"}"#,
    r#"{"op":"register_client","id":"alice","advisor":"claire","name":"Alice"}"#,
    r#"{"op":"approve_client","advisor":"claire","client":"alice"}"#,
    r#"{"op":"set_pin","user":"alice","pin":"123456"}"#,
    r#"{"op":"open_account","advisor":"claire","owner":"alice","id":"alice-courant","kind":"courant","name":"Compte courant"}"#,
    r#"{"op":"open_account","advisor":"claire","owner":"alice","id":"alice-livret","kind":"epargne","name":"Livret A"}"#,
    r#"{"op":"deposit","advisor":"claire","account":"alice-courant","amount":"100"}"#,
];

pub fn write_journal(lines: &[&str]) -> Result<NamedTempFile, Error> {
    let mut file = NamedTempFile::new()?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(file)
}

pub fn with_setup<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    SETUP.iter().copied().chain(lines.iter().copied()).collect()
}

/// Expected statement row for a labelled account.
pub fn row(account: &str, owner: &str, kind: &str, name: &str, balance: &str, limit: &str) -> String {
    format!(
        "{},{},{kind},{name},{balance},{limit}",
        AccountId::from_label(account),
        UserId::from_label(owner)
    )
}
