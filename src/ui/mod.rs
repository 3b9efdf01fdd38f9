//! Terminal dashboard. Owns the terminal while running and hands control back
//! (restored) when the user quits.

pub mod app;
pub mod render;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::notify::{Notice, Notifier};
use crate::poller::Poller;
use crate::types::UiEvent;

pub use app::{Action, AppState};

/// Key poll timeout; also bounds how stale the screen can get between events.
const FRAME: Duration = Duration::from_millis(100);

/// Everything the dashboard reads from or drives.
pub struct Dashboard {
    pub app: AppState,
    pub poller: Poller,
    pub notifier: Notifier,
    pub ui_rx: mpsc::Receiver<UiEvent>,
    pub popup_rx: mpsc::UnboundedReceiver<Notice>,
    pub running: Arc<AtomicBool>,
}

pub async fn run(mut dash: Dashboard) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, &mut dash).await;

    // Restore terminal regardless of result
    dash.running.store(false, Ordering::Release);
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    dash: &mut Dashboard,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| render::render(f, &dash.app))?;

        if event::poll(FRAME)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match dash.app.handle_key(key.code, Instant::now()) {
                        Action::Quit => {
                            info!("Dashboard closed");
                            return Ok(());
                        }
                        Action::Refresh => {
                            dash.poller.trigger();
                        }
                        Action::VoiceTest => {
                            let channel = dash.notifier.test_voice();
                            debug!(channel = ?channel, "Voice test");
                        }
                        Action::None => {}
                    }
                }
            }
        }

        drain(dash);
    }
}

/// Apply whatever the poller and the popup channel queued since the last frame.
fn drain(dash: &mut Dashboard) {
    while let Ok(event) = dash.ui_rx.try_recv() {
        if let Some(alert) = dash.app.apply_event(event) {
            // The popup channel feeds back into popup_rx below.
            dash.notifier.present(&alert);
        }
    }

    let now = Instant::now();
    while let Ok(notice) = dash.popup_rx.try_recv() {
        dash.app.push_popup(notice, now);
    }
    dash.app.expire(now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertEvaluator;
    use crate::config::default_sources;
    use crate::fetcher::{build_client, PriceFetcher};
    use crate::notify::{LogChannel, PopupChannel};
    use crate::state::PriceStore;
    use crate::types::{AlertDirection, AlertEvent};
    use chrono::Local;

    #[tokio::test]
    async fn drained_alert_reaches_popup_queue() {
        let sources = default_sources("http://127.0.0.1:1/zs".to_string(), "http://127.0.0.1:1/ms".to_string());
        let store = PriceStore::new();
        let alerts = AlertEvaluator::new();
        let running = Arc::new(AtomicBool::new(true));
        let (ui_tx, ui_rx) = mpsc::channel(8);
        let (popup_tx, popup_rx) = mpsc::unbounded_channel();

        let poller = Poller::new(
            sources.clone(),
            PriceFetcher::new(build_client(Duration::from_secs(1)).unwrap()),
            store.clone(),
            alerts.clone(),
            "zheshang".to_string(),
            ui_tx.clone(),
            running.clone(),
            Duration::from_secs(3),
        );
        let notifier = Notifier::new(
            vec![Box::new(PopupChannel::new(popup_tx)), Box::new(LogChannel)],
            vec![Box::new(LogChannel)],
        );
        let mut dash = Dashboard {
            app: AppState::new(sources, store, alerts, "zheshang".to_string()),
            poller,
            notifier,
            ui_rx,
            popup_rx,
            running,
        };

        ui_tx
            .send(UiEvent::Alert(AlertEvent {
                direction: AlertDirection::Up,
                price: 776.0,
                price_text: "776".to_string(),
                source_id: "zheshang".to_string(),
                fired_at: Local::now(),
            }))
            .await
            .unwrap();
        drain(&mut dash);

        assert_eq!(dash.app.popups.len(), 1);
        assert_eq!(dash.app.popups[0].item.body, "涨了，现在776元");
    }
}
