use crate::pipeline::orchestrator::{CycleOutcome, FetchOrchestrator};
use chrono::Utc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread that runs a fetch cycle right away and then every `interval`.
/// Dropping the handle stops the loop after the current cycle.
pub struct Scheduler {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn start(orchestrator: Arc<FetchOrchestrator>, interval: Duration) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("fetch-scheduler".into())
            .spawn(move || loop {
                match orchestrator.run_cycle(Utc::now()) {
                    Ok(CycleOutcome::Completed(report)) => {
                        tracing::debug!(run_id = report.run_id, new = report.new_rows, "scheduled cycle done")
                    }
                    Ok(CycleOutcome::AlreadyRunning) => {
                        tracing::info!("skipping scheduled cycle, previous one still running")
                    }
                    Err(e) => tracing::error!(error = %e, "scheduled fetch cycle failed"),
                }

                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        tracing::info!(every = ?interval, "fetch scheduler started");
        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("fetch scheduler thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::{init_db, Database};
    use crate::db::fetch_runs::get_recent_fetch_runs;

    #[test]
    fn runs_immediately_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("s.sqlite3").to_string_lossy().to_string());
        init_db(&db, "sql/schema.sql").unwrap();

        let orch = Arc::new(FetchOrchestrator::new(
            db.clone(),
            vec![],
            vec!["minsk".into()],
            1,
            Duration::from_secs(1),
        ));
        let scheduler = Scheduler::start(orch.clone(), Duration::from_secs(3600)).unwrap();

        for _ in 0..100 {
            let runs = db.with_conn(|c| get_recent_fetch_runs(c)).unwrap();
            if runs.iter().any(|r| r.finished_at.is_some()) {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        scheduler.stop();

        let runs = db.with_conn(|c| get_recent_fetch_runs(c)).unwrap();
        assert_eq!(runs.len(), 1);
        assert!(!orch.is_running());
    }
}
