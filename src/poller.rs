use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::alert::AlertEvaluator;
use crate::fetcher::PriceFetcher;
use crate::state::PriceStore;
use crate::types::{Source, UiEvent};

/// Outcome of one pass over every source.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    /// Source ids whose sample was replaced.
    pub updated: Vec<String>,
    /// `(source id, reason)` for sources that kept their previous sample.
    pub failed: Vec<(String, String)>,
    pub alerts_fired: usize,
}

/// Polls every source on a fixed period and fans results out to the store, the
/// alert evaluator and the front-end channel.
///
/// Cloning is cheap; a clone shares the store, evaluator, channel and `running`
/// flag, which is how manual refreshes run beside the periodic loop.
#[derive(Clone)]
pub struct Poller {
    sources: Arc<Vec<Source>>,
    fetcher: PriceFetcher,
    store: Arc<PriceStore>,
    alerts: Arc<AlertEvaluator>,
    /// Only samples from this source are evaluated for alerts.
    alert_source: String,
    ui_tx: mpsc::Sender<UiEvent>,
    running: Arc<AtomicBool>,
    period: Duration,
}

impl Poller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Vec<Source>,
        fetcher: PriceFetcher,
        store: Arc<PriceStore>,
        alerts: Arc<AlertEvaluator>,
        alert_source: String,
        ui_tx: mpsc::Sender<UiEvent>,
        running: Arc<AtomicBool>,
        period: Duration,
    ) -> Self {
        Self {
            sources: Arc::new(sources),
            fetcher,
            store,
            alerts,
            alert_source,
            ui_tx,
            running,
            period,
        }
    }

    /// Periodic loop. The `running` flag is read once per cycle, before the
    /// fetches start, so a cycle in progress always completes.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            sources = self.sources.len(),
            period_secs = self.period.as_secs_f64(),
            "Poller started for {} sources",
            self.sources.len(),
        );

        loop {
            ticker.tick().await;
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            self.poll_once().await;
        }

        info!("Poller stopped");
    }

    /// One-shot refresh outside the periodic cadence. Runs on its own task and
    /// leaves the periodic schedule alone; overlapping writes are last-write-wins.
    pub fn trigger(&self) -> JoinHandle<CycleReport> {
        let this = self.clone();
        tokio::spawn(async move {
            debug!("Manual refresh requested");
            this.poll_once().await
        })
    }

    /// Fetch every source concurrently, then apply the results.
    pub async fn poll_once(&self) -> CycleReport {
        let fetches = self.sources.iter().map(|source| async move {
            let result = self.fetcher.fetch(source).await;
            (source, result)
        });
        let results = join_all(fetches).await;

        let mut report = CycleReport::default();
        let mut failed_names = Vec::new();
        for (source, result) in results {
            match result {
                Ok(sample) => {
                    self.store.update(&source.id, sample.clone());
                    report.updated.push(source.id.clone());

                    let alert = if source.id == self.alert_source {
                        self.alerts.evaluate(&source.id, &sample)
                    } else {
                        None
                    };

                    self.emit(UiEvent::Price {
                        source_id: source.id.clone(),
                        sample,
                    })
                    .await;

                    if let Some(event) = alert {
                        report.alerts_fired += 1;
                        self.emit(UiEvent::Alert(event)).await;
                    }
                }
                Err(e) => {
                    warn!(source = %source.id, "{} fetch failed: {e}", source.name);
                    report.failed.push((source.id.clone(), e.to_string()));
                    failed_names.push(source.name.clone());
                    self.emit(UiEvent::SourceFailed {
                        source_id: source.id.clone(),
                        name: source.name.clone(),
                        reason: e.to_string(),
                    })
                    .await;
                }
            }
        }

        if !report.updated.is_empty() {
            self.emit(UiEvent::CycleComplete {
                at: Local::now(),
                failed: failed_names,
            })
            .await;
        }
        debug!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            alerts = report.alerts_fired,
            "Poll cycle complete",
        );
        report
    }

    async fn emit(&self, event: UiEvent) {
        if self.ui_tx.send(event).await.is_err() {
            debug!("UI channel closed, dropping event");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
