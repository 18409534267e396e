use bank_ledger::application::back_office::BackOffice;
use bank_ledger::config::{Cli, EngineConfig};
use bank_ledger::infrastructure::clock::{ClockRef, FixedClock};
use bank_ledger::interfaces::csv::account_writer::AccountWriter;
use bank_ledger::interfaces::journal::interpreter::JournalInterpreter;
use bank_ledger::interfaces::journal::reader::JournalReader;
use bank_ledger::telemetry;
use chrono::{NaiveTime, Utc};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::sync::Arc;

#[cfg(feature = "storage-rocksdb")]
fn build_office(cli: &Cli, clock: ClockRef, config: &EngineConfig) -> Result<BackOffice> {
    use bank_ledger::infrastructure::rocksdb::RocksDBStore;

    match &cli.db_path {
        Some(db_path) => {
            let store = Arc::new(RocksDBStore::open(db_path)?);
            Ok(BackOffice::new(
                store.clone(),
                store.clone(),
                store,
                clock,
                config,
            )?)
        }
        None => Ok(BackOffice::in_memory(clock, config)?),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_office(cli: &Cli, clock: ClockRef, config: &EngineConfig) -> Result<BackOffice> {
    if cli.db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(BackOffice::in_memory(clock, config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let config = cli.engine_config();
    let start = match cli.today {
        Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
        None => Utc::now(),
    };
    let clock = FixedClock::new(start);
    let office = build_office(&cli, Arc::new(clock.clone()), &config)?;
    let interpreter = JournalInterpreter::new(office, clock);

    // Replay the journal
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = JournalReader::new(BufReader::new(file));
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = interpreter.apply(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Output final state
    let accounts = interpreter.office().statement().await?;
    let stdout = io::stdout();
    let mut writer = AccountWriter::new(stdout.lock());
    writer.write_accounts(accounts)?;

    Ok(())
}
