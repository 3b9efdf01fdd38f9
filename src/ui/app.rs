use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use crate::alert::{settings, AlertConfig, AlertEvaluator, AlertState, SettingsInput};
use crate::config::POPUP_TTL_SECS;
use crate::notify::Notice;
use crate::state::PriceStore;
use crate::types::{AlertEvent, PriceField, Source, UiEvent};

// ---------------------------------------------------------------------------
// Status line
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Pending,
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub kind: StatusKind,
}

impl Status {
    fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self { text: text.into(), kind }
    }
}

/// Something shown until `expires_at`.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub item: T,
    pub expires_at: Instant,
}

impl<T> Timed<T> {
    fn new(item: T, now: Instant) -> Self {
        Self {
            item,
            expires_at: now + Duration::from_secs(POPUP_TTL_SECS),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings form
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Base,
    Up,
    Down,
    Enabled,
}

impl Field {
    fn next(self) -> Self {
        match self {
            Field::Base => Field::Up,
            Field::Up => Field::Down,
            Field::Down => Field::Enabled,
            Field::Enabled => Field::Base,
        }
    }

    fn prev(self) -> Self {
        match self {
            Field::Base => Field::Enabled,
            Field::Up => Field::Base,
            Field::Down => Field::Up,
            Field::Enabled => Field::Down,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsForm {
    pub input: SettingsInput,
    pub focus: Field,
}

impl SettingsForm {
    fn text_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            Field::Base => Some(&mut self.input.base),
            Field::Up => Some(&mut self.input.up),
            Field::Down => Some(&mut self.input.down),
            Field::Enabled => None,
        }
    }
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

/// What the run loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Quit,
    Refresh,
    VoiceTest,
}

pub struct AppState {
    pub sources: Vec<Source>,
    pub store: Arc<PriceStore>,
    pub alerts: Arc<AlertEvaluator>,
    pub alert_source: String,
    pub status: Status,
    pub toast: Option<Timed<String>>,
    pub popups: VecDeque<Timed<Notice>>,
    pub form: Option<SettingsForm>,
}

impl AppState {
    pub fn new(
        sources: Vec<Source>,
        store: Arc<PriceStore>,
        alerts: Arc<AlertEvaluator>,
        alert_source: String,
    ) -> Self {
        Self {
            sources,
            store,
            alerts,
            alert_source,
            status: Status::new("正在连接...", StatusKind::Pending),
            toast: None,
            popups: VecDeque::new(),
            form: None,
        }
    }

    /// Fold one poller event into the view. Returns a fired alert for the
    /// caller to hand to the notifier.
    pub fn apply_event(&mut self, event: UiEvent) -> Option<AlertEvent> {
        match event {
            // Prices are read straight from the store when drawing.
            UiEvent::Price { .. } => None,
            // A failure in the same cycle outranks the update time.
            UiEvent::CycleComplete { at, failed } => {
                self.status = if failed.is_empty() {
                    Status::new(
                        format!("最后更新: {}", at.format("%H:%M:%S")),
                        StatusKind::Ok,
                    )
                } else {
                    Status::new(format!("{}连接失败", failed.join("、")), StatusKind::Error)
                };
                None
            }
            UiEvent::SourceFailed { name, .. } => {
                self.status = Status::new(format!("{name}连接失败"), StatusKind::Error);
                None
            }
            UiEvent::Alert(alert) => Some(alert),
        }
    }

    pub fn show_toast(&mut self, message: impl Into<String>, now: Instant) {
        self.toast = Some(Timed::new(message.into(), now));
    }

    pub fn push_popup(&mut self, notice: Notice, now: Instant) {
        self.popups.push_back(Timed::new(notice, now));
    }

    /// Drop the toast and any popups whose time is up. Popups are shown one at
    /// a time, so only the front one's clock runs.
    pub fn expire(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|t| t.expires_at <= now) {
            self.toast = None;
        }
        if self.popups.front().is_some_and(|p| p.expires_at <= now) {
            self.popups.pop_front();
            if let Some(next) = self.popups.front_mut() {
                next.expires_at = now + Duration::from_secs(POPUP_TTL_SECS);
            }
        }
    }

    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig::from(self.alerts.state())
    }

    pub fn alert_state(&self) -> AlertState {
        self.alerts.state()
    }

    pub fn handle_key(&mut self, key: KeyCode, now: Instant) -> Action {
        if self.form.is_some() {
            self.handle_form_key(key, now);
            return Action::None;
        }

        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('r') | KeyCode::Char('R') => {
                self.status = Status::new("正在刷新...", StatusKind::Pending);
                Action::Refresh
            }
            KeyCode::Char('a') | KeyCode::Char('A') => {
                self.form = Some(SettingsForm {
                    input: SettingsInput::from_config(&self.alert_config()),
                    focus: Field::Base,
                });
                Action::None
            }
            KeyCode::Char('v') | KeyCode::Char('V') => {
                self.show_toast("语音测试", now);
                Action::VoiceTest
            }
            KeyCode::Enter if !self.popups.is_empty() => {
                self.popups.pop_front();
                Action::None
            }
            _ => Action::None,
        }
    }

    fn handle_form_key(&mut self, key: KeyCode, now: Instant) {
        let Some(form) = self.form.as_mut() else {
            return;
        };

        match key {
            KeyCode::Esc => self.form = None,
            KeyCode::Tab | KeyCode::Down => form.focus = form.focus.next(),
            KeyCode::BackTab | KeyCode::Up => form.focus = form.focus.prev(),
            KeyCode::Char(' ') if form.focus == Field::Enabled => {
                form.input.enabled = !form.input.enabled;
            }
            KeyCode::Char('c') | KeyCode::Char('C') => self.fill_current_price(now),
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == '-' => {
                if let Some(text) = form.text_mut() {
                    text.push(c);
                }
            }
            KeyCode::Backspace => {
                if let Some(text) = form.text_mut() {
                    text.pop();
                }
            }
            KeyCode::Enter => self.save_form(now),
            _ => {}
        }
    }

    /// Copy the alert source's latest numeric price into the base field.
    pub fn fill_current_price(&mut self, now: Instant) {
        match self.store.current_price(&self.alert_source) {
            Some(price) => {
                if let Some(form) = self.form.as_mut() {
                    form.input.base = price.to_string();
                }
            }
            None => self.show_toast("当前金价获取失败", now),
        }
    }

    /// Save closes the form on success; on a validation error the form stays
    /// open and the message is shown.
    pub fn save_form(&mut self, now: Instant) {
        let Some(form) = self.form.as_ref() else {
            return;
        };
        match settings::save(&self.alerts, &form.input) {
            Ok(msg) => {
                self.form = None;
                self.show_toast(msg, now);
            }
            Err(e) => self.show_toast(e.to_string(), now),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

pub fn format_price(price: &PriceField) -> String {
    format!("¥{price}")
}

/// Positive changes get a `+`; non-numeric text is shown as-is and counts as flat.
pub fn format_change(change: &PriceField) -> (String, Trend) {
    match change.as_f64() {
        Some(v) if v > 0.0 => (format!("+{change}"), Trend::Rising),
        Some(v) if v < 0.0 => (change.to_string(), Trend::Falling),
        _ => (change.to_string(), Trend::Flat),
    }
}

pub fn format_amount(v: Option<f64>) -> String {
    v.map_or("—".to_string(), |x| format!("{x:.2}"))
}
