mod alert;
mod config;
mod error;
mod fetcher;
mod notify;
mod poller;
mod state;
mod types;
mod ui;

use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alert::{settings, AlertEvaluator, SettingsInput};
use crate::config::{Config, UiMode, CHANNEL_CAPACITY, SHUTDOWN_GRACE_SECS};
use crate::error::{AppError, Result};
use crate::fetcher::{build_client, PriceFetcher};
use crate::notify::{Notifier, PopupChannel};
use crate::poller::Poller;
use crate::state::PriceStore;
use crate::types::UiEvent;
use crate::ui::{AppState, Dashboard};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&cfg) {
        eprintln!("Logging setup failed: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        eprintln!("Fatal error: {e}");
        std::process::exit(1);
    }
}

/// The dashboard owns the terminal, so in that mode logs go to a file.
fn init_tracing(cfg: &Config) -> Result<()> {
    let filter = EnvFilter::new(&cfg.log_level);
    match cfg.ui_mode {
        UiMode::Tui => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&cfg.log_file)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        UiMode::Headless => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

async fn run(cfg: Config) -> Result<()> {
    // --- Shared state ---
    let store = PriceStore::new();
    let alerts = AlertEvaluator::new();

    if let Some((base, up, down)) = &cfg.initial_alert {
        let input = SettingsInput {
            enabled: true,
            base: base.clone(),
            up: up.clone(),
            down: down.clone(),
        };
        let msg = settings::save(&alerts, &input)
            .map_err(|e| AppError::Config(format!("ALERT_BASE/ALERT_UP/ALERT_DOWN: {e}")))?;
        info!("{msg}");
    }

    // --- Poller ---
    let client = build_client(Duration::from_secs(cfg.fetch_timeout_secs))?;
    let (ui_tx, ui_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let running = Arc::new(AtomicBool::new(true));

    let poller = Poller::new(
        cfg.sources.clone(),
        PriceFetcher::new(client),
        Arc::clone(&store),
        Arc::clone(&alerts),
        cfg.alert_source.clone(),
        ui_tx,
        Arc::clone(&running),
        Duration::from_secs(cfg.poll_interval_secs),
    );
    let poll_handle = tokio::spawn(poller.clone().run());

    info!(
        mode = ?cfg.ui_mode,
        alert_source = %cfg.alert_source,
        "gold-watch started (poll every {}s)",
        cfg.poll_interval_secs,
    );

    match cfg.ui_mode {
        UiMode::Tui => {
            let (popup_tx, popup_rx) = mpsc::unbounded_channel();
            let notifier = Notifier::for_environment(
                cfg.desktop_notify,
                cfg.voice,
                Some(PopupChannel::new(popup_tx)),
            );
            let dash = Dashboard {
                app: AppState::new(cfg.sources.clone(), store, alerts, cfg.alert_source.clone()),
                poller,
                notifier,
                ui_rx,
                popup_rx,
                running: Arc::clone(&running),
            };
            ui::run(dash).await?;
        }
        UiMode::Headless => {
            let notifier = Notifier::for_environment(cfg.desktop_notify, cfg.voice, None);
            tokio::select! {
                _ = headless_consumer(ui_rx, notifier) => {}
                res = tokio::signal::ctrl_c() => {
                    res?;
                    info!("Interrupted, shutting down");
                }
            }
        }
    }

    stop_poller(&running, poll_handle, Duration::from_secs(SHUTDOWN_GRACE_SECS)).await;
    Ok(())
}

/// Clear `running` and give an in-flight cycle up to `grace` to finish before
/// aborting the task. Returns whether the poller stopped on its own.
async fn stop_poller(running: &AtomicBool, mut handle: JoinHandle<()>, grace: Duration) -> bool {
    running.store(false, Ordering::Release);
    if tokio::time::timeout(grace, &mut handle).await.is_ok() {
        return true;
    }
    warn!("Poller did not stop within {}s, aborting", grace.as_secs_f64());
    handle.abort();
    false
}

/// Logs every update and presents alerts when no dashboard is attached.
async fn headless_consumer(mut rx: mpsc::Receiver<UiEvent>, notifier: Notifier) {
    while let Some(event) = rx.recv().await {
        match event {
            UiEvent::Price { source_id, sample } => info!(
                event = "PRICE",
                source = %source_id,
                price = %sample.price,
                change = %sample.change,
                "PRICE | {source_id}: {} ({})",
                sample.price,
                sample.change,
            ),
            UiEvent::SourceFailed { source_id, name, reason } => warn!(
                event = "SOURCE_FAILED",
                source = %source_id,
                "{name}连接失败: {reason}",
            ),
            UiEvent::CycleComplete { .. } => {}
            UiEvent::Alert(alert) => {
                let presented = notifier.present(&alert);
                info!(
                    visual = ?presented.visual,
                    voice = ?presented.voice,
                    "Alert presented",
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogChannel;
    use crate::types::{AlertDirection, AlertEvent, PriceField, PriceSample};
    use chrono::Local;

    #[tokio::test]
    async fn stop_waits_for_cycle_in_progress() {
        let running = Arc::new(AtomicBool::new(true));
        let finished_cycle = Arc::new(AtomicBool::new(false));

        let (flag, done) = (running.clone(), finished_cycle.clone());
        let handle = tokio::spawn(async move {
            while flag.load(Ordering::Acquire) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            // The cycle that was running when the flag cleared.
            tokio::time::sleep(Duration::from_millis(200)).await;
            done.store(true, Ordering::Release);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(stop_poller(&running, handle, Duration::from_secs(5)).await);
        assert!(finished_cycle.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn stop_aborts_a_poller_that_overruns_grace() {
        let running = AtomicBool::new(true);
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        assert!(!stop_poller(&running, handle, Duration::from_millis(100)).await);
        assert!(!running.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn headless_consumer_presents_alerts_and_ends_with_channel() {
        let (tx, rx) = mpsc::channel(8);
        let (popup_tx, mut popup_rx) = mpsc::unbounded_channel();
        let notifier = Notifier::new(
            vec![Box::new(PopupChannel::new(popup_tx))],
            vec![Box::new(LogChannel)],
        );
        let consumer = tokio::spawn(headless_consumer(rx, notifier));

        tx.send(UiEvent::Price {
            source_id: "zheshang".to_string(),
            sample: PriceSample {
                price: PriceField::new("776.00"),
                change: PriceField::new("1.00"),
                fetched_at: Local::now(),
            },
        })
        .await
        .unwrap();
        tx.send(UiEvent::SourceFailed {
            source_id: "minsheng".to_string(),
            name: "民生".to_string(),
            reason: "HTTP status 503".to_string(),
        })
        .await
        .unwrap();
        tx.send(UiEvent::Alert(AlertEvent {
            direction: AlertDirection::Up,
            price: 776.0,
            price_text: "776.00".to_string(),
            source_id: "zheshang".to_string(),
            fired_at: Local::now(),
        }))
        .await
        .unwrap();
        drop(tx);

        let finished = tokio::time::timeout(Duration::from_secs(5), consumer).await;
        assert!(finished.is_ok(), "consumer did not stop when the channel closed");

        let notice = popup_rx.try_recv().unwrap();
        assert_eq!(notice.body, "涨了，现在776.00元");
        assert!(popup_rx.try_recv().is_err(), "one alert, one notice");
    }
}
