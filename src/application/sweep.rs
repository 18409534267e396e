//! Periodic credit and overdraft sweep.
//!
//! The `Sweeper` runs as a background task, debiting due credit instalments
//! and charging overdraft fees on every tick.

use super::credit::CreditScheduler;
use super::overdraft::OverdraftFeeEngine;
use crate::error::Result;
use crate::infrastructure::clock::ClockRef;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Outcome of one pass over a set of accounts or credits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Postings made.
    pub processed: usize,
    /// Items logged and skipped after a failure.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub credits: SweepReport,
    pub fees: SweepReport,
}

/// Background task running both sweeps.
#[derive(Clone)]
pub struct Sweeper {
    credits: CreditScheduler,
    fees: OverdraftFeeEngine,
    clock: ClockRef,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        credits: CreditScheduler,
        fees: OverdraftFeeEngine,
        clock: ClockRef,
        interval: Duration,
    ) -> Self {
        Self {
            credits,
            fees,
            clock,
            interval,
        }
    }

    /// Set custom sweep interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the sweeper as a background task.
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                match self.run_once().await {
                    Ok(summary) if summary != SweepSummary::default() => {
                        info!(
                            instalments = summary.credits.processed,
                            instalments_skipped = summary.credits.skipped,
                            fees = summary.fees.processed,
                            fees_skipped = summary.fees.skipped,
                            "sweep completed"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "sweep failed");
                    }
                }
            }
        })
    }

    /// Credits first, so an instalment that drives an account negative is
    /// seen by the fee check of the same pass.
    pub async fn run_once(&self) -> Result<SweepSummary> {
        let today = self.clock.now().date_naive();
        let credits = self.credits.sweep(today).await?;
        let fees = self.fees.sweep().await?;
        Ok(SweepSummary { credits, fees })
    }
}
