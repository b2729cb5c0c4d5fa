// src/pipeline/orchestrator.rs

use crate::db::connection::Database;
use crate::db::fetch_runs::{end_fetch_run, start_fetch_run, RunTotals};
use crate::db::listings::upsert_batch;
use crate::domain::listing::{Candidate, SearchFilter, Source};
use crate::errors::ServerError;
use crate::scraper::{FetchError, SourceAdapter};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// One failed adapter x city call.
#[derive(Debug, Clone, PartialEq)]
pub struct PairFailure {
    pub source: Source,
    pub city: String,
    pub error: FetchError,
}

#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub run_id: i64,
    pub pairs_total: usize,
    pub failures: Vec<PairFailure>,
    pub candidates_fetched: usize,
    pub new_rows: usize,
    pub refreshed_rows: usize,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    AlreadyRunning,
}

/// Holds the single-flight flag for as long as a cycle runs.
pub struct CycleGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct FetchOrchestrator {
    db: Database,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    cities: Vec<String>,
    filter: SearchFilter,
    max_parallel: usize,
    call_timeout: Duration,
    running: Arc<AtomicBool>,
}

struct PairResult {
    source: Source,
    city: String,
    result: Result<Vec<Candidate>, FetchError>,
}

impl FetchOrchestrator {
    pub fn new(
        db: Database,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        cities: Vec<String>,
        max_parallel: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            db,
            adapters,
            cities,
            filter: SearchFilter::default(),
            max_parallel: max_parallel.max(1),
            call_timeout,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Take the single-flight flag, or `None` if a cycle is already in progress.
    pub fn try_acquire(&self) -> Option<CycleGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                flag: Arc::clone(&self.running),
            })
    }

    /// Run a full cycle on the calling thread.
    pub fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleOutcome, ServerError> {
        let Some(guard) = self.try_acquire() else {
            tracing::info!("fetch cycle already running, trigger ignored");
            return Ok(CycleOutcome::AlreadyRunning);
        };
        let report = self.run_guarded(&guard, now)?;
        Ok(CycleOutcome::Completed(report))
    }

    /// Start a cycle on a background thread. Returns `false` when one is already running.
    pub fn spawn_cycle(self: &Arc<Self>) -> bool {
        let Some(guard) = self.try_acquire() else {
            return false;
        };
        let this = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("fetch-cycle".into())
            .spawn(move || {
                if let Err(e) = this.run_guarded(&guard, Utc::now()) {
                    tracing::error!(error = %e, "manually triggered fetch cycle failed");
                }
            });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "could not spawn fetch cycle thread");
            return false;
        }
        true
    }

    fn run_guarded(&self, _guard: &CycleGuard, now: DateTime<Utc>) -> Result<CycleReport, ServerError> {
        let run_id = self.db.with_conn(|conn| start_fetch_run(conn, now))?;
        tracing::info!(run_id, adapters = self.adapters.len(), cities = self.cities.len(), "fetch cycle started");

        let results = self.fetch_all();

        let mut report = CycleReport {
            run_id,
            pairs_total: results.len(),
            ..Default::default()
        };
        let mut batch: Vec<Candidate> = Vec::new();
        for r in results {
            match r.result {
                Ok(found) => batch.extend(found),
                Err(error) => {
                    log_failure(r.source, &r.city, &error);
                    report.failures.push(PairFailure {
                        source: r.source,
                        city: r.city,
                        error,
                    });
                }
            }
        }
        report.candidates_fetched = batch.len();

        let outcome = upsert_batch(&self.db, &batch, now);
        let error_message = match &outcome {
            Ok(o) => {
                report.new_rows = o.inserted;
                report.refreshed_rows = o.refreshed;
                summarize_failures(&report)
            }
            Err(e) => Some(format!("batch upsert failed: {e}")),
        };

        let totals = RunTotals {
            pairs_total: report.pairs_total,
            pairs_failed: report.failures.len(),
            candidates_fetched: report.candidates_fetched,
            new_rows: report.new_rows,
        };
        let finished = Utc::now().max(now);
        self.db
            .with_conn(|conn| end_fetch_run(conn, run_id, finished, &totals, error_message))?;
        outcome?;

        tracing::info!(
            run_id,
            pairs = report.pairs_total,
            failed = report.failures.len(),
            fetched = report.candidates_fetched,
            new = report.new_rows,
            "fetch cycle finished"
        );
        Ok(report)
    }

    /// Every (adapter, city) pair on at most `max_parallel` worker threads.
    fn fetch_all(&self) -> Vec<PairResult> {
        let queue: VecDeque<(Arc<dyn SourceAdapter>, String)> = self
            .adapters
            .iter()
            .flat_map(|a| self.cities.iter().map(move |c| (Arc::clone(a), c.clone())))
            .collect();
        let total = queue.len();
        let queue = Mutex::new(queue);
        let results = Mutex::new(Vec::with_capacity(total));

        thread::scope(|s| {
            for _ in 0..self.max_parallel.min(total) {
                s.spawn(|| loop {
                    let next = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => None,
                    };
                    let Some((adapter, city)) = next else {
                        break;
                    };
                    let source = adapter.source();
                    let result = call_with_timeout(adapter, &city, &self.filter, self.call_timeout);
                    if let Ok(mut out) = results.lock() {
                        out.push(PairResult { source, city, result });
                    }
                });
            }
        });

        let mut results = results.into_inner().unwrap_or_default();
        // Deterministic batch order regardless of which worker finished first.
        results.sort_by(|a, b| (a.source, &a.city).cmp(&(b.source, &b.city)));
        results
    }
}

/// Run one adapter call on its own thread and stop waiting after `timeout`.
/// A call that overruns is abandoned; whatever it returns later is dropped.
/// The adapter sees the same deadline and issues no request past it, so an
/// abandoned thread winds down within one in-flight request.
fn call_with_timeout(
    adapter: Arc<dyn SourceAdapter>,
    city: &str,
    filter: &SearchFilter,
    timeout: Duration,
) -> Result<Vec<Candidate>, FetchError> {
    let deadline = Instant::now() + timeout;
    let (tx, rx) = mpsc::channel();
    let city_owned = city.to_string();
    let filter = filter.clone();
    let spawned = thread::Builder::new()
        .name(format!("fetch-{}-{city}", adapter.source()))
        .spawn(move || {
            let _ = tx.send(adapter.fetch(&city_owned, &filter, deadline));
        });
    if let Err(e) = spawned {
        return Err(FetchError::Network(format!("could not spawn fetch thread: {e}")));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(FetchError::Timeout),
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(FetchError::Network("fetch thread exited without a result".into()))
        }
    }
}

fn log_failure(source: Source, city: &str, error: &FetchError) {
    match error {
        FetchError::Blocked(_) => {
            tracing::warn!(%source, city, kind = error.label(), %error, "source blocked us, skipping for this cycle")
        }
        FetchError::EmptyResult | FetchError::UnsupportedCity(_) => {
            tracing::info!(%source, city, kind = error.label(), "no listings from source")
        }
        FetchError::Network(_) | FetchError::Timeout | FetchError::Malformed(_) => {
            tracing::error!(%source, city, kind = error.label(), %error, "fetch failed")
        }
    }
}

/// Run-level error text, set only when every pair failed for a real reason.
fn summarize_failures(report: &CycleReport) -> Option<String> {
    let serious: Vec<&PairFailure> = report
        .failures
        .iter()
        .filter(|f| !f.error.is_benign())
        .collect();
    if report.pairs_total == 0 || serious.len() < report.pairs_total {
        return None;
    }
    let parts: Vec<String> = serious
        .iter()
        .map(|f| format!("{}/{}: {}", f.source, f.city, f.error.label()))
        .collect();
    Some(format!("all pairs failed ({})", parts.join(", ")))
}
