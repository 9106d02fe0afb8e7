use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use core_logic::{
    partition, Account, AccountProcessor, BatchScheduler, CyclePolicy, RoundOutcome,
    SchedulerConfig,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Start(usize),
    End(usize),
}

#[derive(Default)]
struct RecordingProcessor {
    events: Mutex<Vec<Event>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    panic_on: Option<usize>,
    fail_on: Option<usize>,
    skip_on: Option<usize>,
}

impl RecordingProcessor {
    fn processed(&self) -> HashMap<usize, usize> {
        let mut counts = HashMap::new();
        for event in self.events.lock().unwrap().iter() {
            if let Event::Start(i) = event {
                *counts.entry(*i).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[async_trait]
impl AccountProcessor for RecordingProcessor {
    async fn process(&self, account: &Account) -> Result<RoundOutcome> {
        let i = account.index;
        self.events.lock().unwrap().push(Event::Start(i));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(20)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::End(i));

        if self.panic_on == Some(i) {
            panic!("unit {} blew up", i);
        }
        if self.fail_on == Some(i) {
            anyhow::bail!("unit {} failed", i);
        }
        if self.skip_on == Some(i) {
            return Ok(RoundOutcome::Skipped {
                reason: "auth".to_string(),
            });
        }

        let end = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::minutes(i as i64);
        Ok(RoundOutcome::Completed {
            farming_end: Some(end),
        })
    }
}

fn accounts(n: usize) -> Vec<Account> {
    (0..n).map(|i| Account::new(i, format!("cred-{}", i))).collect()
}

fn scheduler(processor: Arc<RecordingProcessor>, concurrency: usize) -> BatchScheduler {
    BatchScheduler::new(
        processor,
        SchedulerConfig {
            concurrency,
            cycle: CyclePolicy::Immediate,
            max_cycles: Some(1),
        },
    )
}

#[test]
fn test_partition_covers_every_index_once() {
    for n in 1..=25 {
        for w in 1..=n {
            let batches = partition(n, w);
            assert_eq!(batches.len(), (n + w - 1) / w);
            assert!(batches.iter().all(|b| b.len() <= w && !b.is_empty()));

            let flat: Vec<usize> = batches.into_iter().flatten().collect();
            assert_eq!(flat, (0..n).collect::<Vec<_>>());
        }
    }
}

#[tokio::test]
async fn test_cycle_processes_each_account_exactly_once() {
    let processor = Arc::new(RecordingProcessor::default());
    let scheduler = scheduler(processor.clone(), 3);

    let summary = scheduler
        .run_cycle(&accounts(7), &CancellationToken::new())
        .await;

    let processed = processor.processed();
    assert_eq!(processed.len(), 7);
    assert!(processed.values().all(|&c| c == 1));
    assert_eq!(summary.completed, 7);
    assert_eq!(summary.total(), 7);
    assert!(processor.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_batches_are_joined_before_next_starts() {
    let processor = Arc::new(RecordingProcessor::default());
    let scheduler = scheduler(processor.clone(), 2);

    scheduler
        .run_cycle(&accounts(5), &CancellationToken::new())
        .await;

    let events = processor.events.lock().unwrap().clone();
    let position = |e: Event| events.iter().position(|x| *x == e).unwrap();

    for range in partition(5, 2).windows(2) {
        let last_end = range[0].clone().map(|i| position(Event::End(i))).max().unwrap();
        let first_start = range[1]
            .clone()
            .map(|i| position(Event::Start(i)))
            .min()
            .unwrap();
        assert!(last_end < first_start);
    }
}

#[tokio::test]
async fn test_faulty_units_do_not_stop_siblings() {
    let processor = Arc::new(RecordingProcessor {
        panic_on: Some(1),
        fail_on: Some(2),
        skip_on: Some(3),
        ..Default::default()
    });
    let scheduler = scheduler(processor.clone(), 4);

    let summary = scheduler
        .run_cycle(&accounts(6), &CancellationToken::new())
        .await;

    assert_eq!(processor.processed().len(), 6);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.completed, 3);
}

#[tokio::test]
async fn test_summary_tracks_earliest_farming_end() {
    let processor = Arc::new(RecordingProcessor {
        skip_on: Some(0),
        ..Default::default()
    });
    let scheduler = scheduler(processor, 2);

    let summary = scheduler
        .run_cycle(&accounts(4), &CancellationToken::new())
        .await;

    let expected = Utc.with_ymd_and_hms(2030, 1, 1, 0, 1, 0).unwrap();
    assert_eq!(summary.earliest_farming_end, Some(expected));
}

#[tokio::test]
async fn test_concurrency_wider_than_account_list_is_clamped() {
    let processor = Arc::new(RecordingProcessor::default());
    let scheduler = scheduler(processor.clone(), 50);

    assert_eq!(scheduler.width(3), 3);
    scheduler
        .run_cycle(&accounts(3), &CancellationToken::new())
        .await;
    assert_eq!(processor.processed().len(), 3);
}

#[tokio::test]
async fn test_run_forever_honours_max_cycles() {
    let processor = Arc::new(RecordingProcessor::default());
    let scheduler = BatchScheduler::new(
        processor.clone(),
        SchedulerConfig {
            concurrency: 2,
            cycle: CyclePolicy::Immediate,
            max_cycles: Some(3),
        },
    );

    scheduler
        .run_forever(accounts(3), CancellationToken::new())
        .await
        .unwrap();

    let processed = processor.processed();
    assert_eq!(processed.len(), 3);
    assert!(processed.values().all(|&c| c == 3));
}

#[tokio::test]
async fn test_cancelled_token_stops_before_any_batch() {
    let processor = Arc::new(RecordingProcessor::default());
    let scheduler = scheduler(processor.clone(), 2);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = scheduler.run_cycle(&accounts(4), &cancel).await;

    assert_eq!(summary.total(), 0);
    assert!(processor.processed().is_empty());
}
