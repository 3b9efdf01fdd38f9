use serde_json::json;

use crate::error::{AppError, Result};
use crate::types::{Envelope, Source};

pub const ZHESHANG_URL: &str =
    "https://api.jdjygold.com/gw2/generic/jrm/h5/m/stdLatestPrice?productSku=1961543816";
pub const MINSHENG_URL: &str =
    "https://ms.jr.jd.com/gw2/generic/CreatorSer/newh5/m/getFirstRelatedProductInfo";

/// Headers the upstream gateways expect; requests without them are rejected.
pub const USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; Mobile) AppleWebKit/537.36";
pub const ACCEPT: &str = "application/json";
pub const REFERER: &str = "https://jdjygold.com/";

/// Poll period (seconds).
pub const POLL_INTERVAL_SECS: u64 = 3;

/// Upper bound on a single fetch (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Channel capacity between the poller and the front end.
pub const CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for an in-flight poll cycle before aborting it (seconds).
pub const SHUTDOWN_GRACE_SECS: u64 = 5;

/// How long an in-app popup or toast stays on screen (seconds).
pub const POPUP_TTL_SECS: u64 = 3;

pub const DEFAULT_ALERT_SOURCE: &str = "zheshang";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiMode {
    Tui,
    Headless,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Log sink while the dashboard owns the terminal (LOG_FILE).
    pub log_file: String,
    pub ui_mode: UiMode,
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Source id whose samples drive the alert (ALERT_SOURCE).
    pub alert_source: String,
    pub sources: Vec<Source>,
    /// Try native desktop notifications before the in-app popup (DESKTOP_NOTIFY).
    pub desktop_notify: bool,
    /// Speak alerts through a local speech synthesizer (VOICE).
    pub voice: bool,
    /// Alert band armed at startup, as raw (base, up, down) text.
    pub initial_alert: Option<(String, String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let sources = default_sources(
            std::env::var("ZHESHANG_URL").unwrap_or_else(|_| ZHESHANG_URL.to_string()),
            std::env::var("MINSHENG_URL").unwrap_or_else(|_| MINSHENG_URL.to_string()),
        );

        let alert_source =
            std::env::var("ALERT_SOURCE").unwrap_or_else(|_| DEFAULT_ALERT_SOURCE.to_string());
        if !sources.iter().any(|s| s.id == alert_source) {
            return Err(AppError::Config(format!(
                "ALERT_SOURCE must be one of: {}",
                sources.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(", ")
            )));
        }

        let ui_mode = match std::env::var("UI_MODE")
            .unwrap_or_else(|_| "tui".to_string())
            .to_lowercase()
            .as_str()
        {
            "tui" => UiMode::Tui,
            "headless" => UiMode::Headless,
            other => {
                return Err(AppError::Config(format!(
                    "UI_MODE must be tui or headless, got {other}"
                )))
            }
        };

        let initial_alert = std::env::var("ALERT_BASE").ok().map(|base| {
            (
                base,
                std::env::var("ALERT_UP").unwrap_or_default(),
                std::env::var("ALERT_DOWN").unwrap_or_default(),
            )
        });

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_file: std::env::var("LOG_FILE").unwrap_or_else(|_| "gold-watch.log".to_string()),
            ui_mode,
            poll_interval_secs: env_secs("POLL_INTERVAL_SECS", POLL_INTERVAL_SECS)?,
            fetch_timeout_secs: env_secs("FETCH_TIMEOUT_SECS", FETCH_TIMEOUT_SECS)?,
            alert_source,
            sources,
            desktop_notify: env_flag("DESKTOP_NOTIFY", true),
            voice: env_flag("VOICE", true),
            initial_alert,
        })
    }
}

/// The two bank feeds. URLs are injectable so tests and mirrors can point elsewhere.
pub fn default_sources(zheshang_url: String, minsheng_url: String) -> Vec<Source> {
    vec![
        Source {
            id: "zheshang".to_string(),
            name: "浙商".to_string(),
            url: zheshang_url,
            params: None,
            envelope: Envelope::Datas,
            price_key: "price".to_string(),
            change_key: "upAndDownAmt".to_string(),
            color: (0xFF, 0xD7, 0x00),
        },
        Source {
            id: "minsheng".to_string(),
            name: "民生".to_string(),
            url: minsheng_url,
            params: Some(json!({
                "circleId": "13245",
                "invokeSource": 5,
                "productId": "21001001000001"
            })),
            envelope: Envelope::Data,
            price_key: "minimumPriceValue".to_string(),
            change_key: "dayFluctuateNum".to_string(),
            color: (0x4A, 0x90, 0xE2),
        },
    ]
}

fn env_secs(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(AppError::Config(format!(
                "{key} must be a positive whole number of seconds"
            ))),
        },
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => parse_flag(&v).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sources_have_distinct_ids() {
        let sources = default_sources(ZHESHANG_URL.to_string(), MINSHENG_URL.to_string());
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id, DEFAULT_ALERT_SOURCE);
        assert_ne!(sources[0].id, sources[1].id);
        assert!(sources[0].params.is_none());
        assert_eq!(sources[1].params.as_ref().unwrap()["invokeSource"], 5);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
