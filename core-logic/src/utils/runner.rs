use crate::config::SchedulerConfig;
use crate::traits::{AccountProcessor, RoundOutcome};
use crate::utils::account_manager::Account;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

/// Splits `len` items into contiguous batches of at most `width` items.
pub fn partition(len: usize, width: usize) -> Vec<Range<usize>> {
    let width = width.max(1);
    (0..len)
        .step_by(width)
        .map(|start| start..(start + width).min(len))
        .collect()
}

/// Tally of one full sweep over the account list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub earliest_farming_end: Option<DateTime<Utc>>,
}

impl CycleSummary {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    fn record(&mut self, outcome: &RoundOutcome) {
        match outcome {
            RoundOutcome::Completed { farming_end } => {
                self.completed += 1;
                if let Some(end) = farming_end {
                    self.earliest_farming_end = Some(match self.earliest_farming_end {
                        Some(current) => current.min(*end),
                        None => *end,
                    });
                }
            }
            RoundOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Runs every account through an [`AccountProcessor`] in fixed-size
/// concurrent batches, one batch at a time, forever.
pub struct BatchScheduler {
    processor: Arc<dyn AccountProcessor>,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(processor: Arc<dyn AccountProcessor>, config: SchedulerConfig) -> Self {
        Self { processor, config }
    }

    /// Effective batch width for `accounts` accounts, clamped to `1..=accounts`.
    pub fn width(&self, accounts: usize) -> usize {
        self.config.concurrency.clamp(1, accounts.max(1))
    }

    /// Runs one sweep. Each batch is joined before the next one starts.
    /// Cancellation aborts the in-flight batch and returns what was tallied.
    pub async fn run_cycle(&self, accounts: &[Account], cancel: &CancellationToken) -> CycleSummary {
        let mut summary = CycleSummary::default();
        let batches = partition(accounts.len(), self.width(accounts.len()));
        let total_batches = batches.len();

        for (batch_no, range) in batches.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            info!(
                "Batch {}/{}: processing accounts {}-{}",
                batch_no + 1,
                total_batches,
                range.start + 1,
                range.end
            );
            self.run_batch(&accounts[range], &mut summary, cancel).await;
        }

        summary
    }

    async fn run_batch(
        &self,
        batch: &[Account],
        summary: &mut CycleSummary,
        cancel: &CancellationToken,
    ) {
        let mut units: Vec<(String, JoinHandle<Result<RoundOutcome>>)> =
            Vec::with_capacity(batch.len());

        for account in batch {
            let label = account.label();
            let span = tracing::info_span!("account", id = %label);
            let processor = Arc::clone(&self.processor);
            let account = account.clone();

            let handle = tokio::spawn(
                async move { processor.process(&account).await }.instrument(span),
            );
            units.push((label, handle));
        }

        let aborts: Vec<_> = units.iter().map(|(_, h)| h.abort_handle()).collect();

        tokio::select! {
            _ = Self::join_units(units, summary) => {}
            _ = cancel.cancelled() => {
                warn!("Cancellation requested, aborting {} in-flight accounts", aborts.len());
                for handle in aborts {
                    handle.abort();
                }
            }
        }
    }

    async fn join_units(
        units: Vec<(String, JoinHandle<Result<RoundOutcome>>)>,
        summary: &mut CycleSummary,
    ) {
        for (label, handle) in units {
            match handle.await {
                Ok(Ok(outcome)) => {
                    if let RoundOutcome::Skipped { reason } = &outcome {
                        warn!("Account {} skipped this round: {}", label, reason);
                    }
                    summary.record(&outcome);
                }
                Ok(Err(e)) => {
                    error!("Account {} FAILED: {:#}", label, e);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!("Account {} worker panicked or was aborted: {}", label, e);
                    summary.failed += 1;
                }
            }
        }
    }

    /// Sweeps the account list until `cancel` fires or `max_cycles` is
    /// reached, waiting between sweeps as the cycle policy dictates.
    pub async fn run_forever(&self, accounts: Vec<Account>, cancel: CancellationToken) -> Result<()> {
        if accounts.is_empty() {
            warn!("No accounts to process.");
            return Ok(());
        }

        Self::listen_for_shutdown(cancel.clone());

        info!(
            "Starting scheduler: {} accounts, {} per batch, cycle policy {:?}",
            accounts.len(),
            self.width(accounts.len()),
            self.config.cycle
        );

        let mut cycle: u64 = 0;
        loop {
            cycle += 1;
            let start_time = Instant::now();
            let summary = self.run_cycle(&accounts, &cancel).await;

            info!(
                "Cycle {} complete in {:.1}s | Completed: {} | Skipped: {} | Failed: {}",
                cycle,
                start_time.elapsed().as_secs_f64(),
                summary.completed,
                summary.skipped,
                summary.failed
            );

            if cancel.is_cancelled() {
                break;
            }
            if self.config.max_cycles.is_some_and(|max| cycle >= max) {
                info!("Reached configured limit of {} cycles.", cycle);
                break;
            }

            let delay = self
                .config
                .cycle
                .next_delay(summary.earliest_farming_end, Utc::now());
            if !delay.is_zero() {
                info!("Waiting {}s before the next cycle...", delay.as_secs());
            }

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => break,
            }
        }

        // Releases the Ctrl+C listener when the loop ended on its own.
        cancel.cancel();
        info!("🛑 Shutdown Complete.");
        Ok(())
    }

    fn listen_for_shutdown(token: CancellationToken) {
        tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => match res {
                    Ok(()) => {
                        info!("🛑 Received Ctrl+C. Initiating graceful shutdown...");
                        token.cancel();
                    }
                    Err(err) => {
                        error!("Unable to listen for shutdown signal: {}", err);
                    }
                },
                _ = token.cancelled() => {}
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_exact_multiple() {
        assert_eq!(partition(6, 3), vec![0..3, 3..6]);
    }

    #[test]
    fn test_partition_remainder() {
        assert_eq!(partition(7, 3), vec![0..3, 3..6, 6..7]);
    }

    #[test]
    fn test_partition_zero_width_treated_as_one() {
        assert_eq!(partition(2, 0), vec![0..1, 1..2]);
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition(0, 4).is_empty());
    }
}
