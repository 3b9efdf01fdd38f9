use chrono::{DateTime, Local};

/// Shown wherever a price or change could not be read.
pub const SENTINEL: &str = "--";

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Where the price fields live inside a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// `resultData.datas.<key>`, with `resultData.status == "FAIL"` meaning no data.
    Datas,
    /// `resultData.data.<key>`.
    Data,
}

/// One upstream price feed. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Source {
    /// Stable key used in the price store and in `ALERT_SOURCE`.
    pub id: String,
    /// Display name (bank short name).
    pub name: String,
    pub url: String,
    /// Serialized to JSON and sent as the `reqData` query parameter.
    pub params: Option<serde_json::Value>,
    pub envelope: Envelope,
    pub price_key: String,
    pub change_key: String,
    /// RGB display color.
    pub color: (u8, u8, u8),
}

// ---------------------------------------------------------------------------
// Price samples
// ---------------------------------------------------------------------------

/// A price or change as reported upstream: either its textual form or the
/// `--` sentinel when the field was absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriceField(Option<String>);

impl PriceField {
    pub fn missing() -> Self {
        Self(None)
    }

    pub fn new(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }

    /// Strings are taken verbatim, numbers keep their JSON rendering,
    /// `null` counts as absent.
    pub fn from_json(v: Option<&serde_json::Value>) -> Self {
        match v {
            None | Some(serde_json::Value::Null) => Self::missing(),
            Some(serde_json::Value::String(s)) => Self::new(s.clone()),
            Some(other) => Self::new(other.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or(SENTINEL)
    }

    /// Numeric value, if the text parses to a finite number.
    pub fn as_f64(&self) -> Option<f64> {
        self.0
            .as_deref()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest price/change pair for a source. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSample {
    pub price: PriceField,
    pub change: PriceField,
    pub fetched_at: DateTime<Local>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDirection {
    Up,
    Down,
}

impl AlertDirection {
    /// Spoken/displayed verb used in alert messages.
    pub fn verb(&self) -> &'static str {
        match self {
            AlertDirection::Up => "涨了",
            AlertDirection::Down => "跌了",
        }
    }
}

impl std::fmt::Display for AlertDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertDirection::Up => "up",
            AlertDirection::Down => "down",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub direction: AlertDirection,
    pub price: f64,
    /// Upstream text of the triggering price, used for messages.
    pub price_text: String,
    pub source_id: String,
    pub fired_at: DateTime<Local>,
}

// ---------------------------------------------------------------------------
// Channel message types
// ---------------------------------------------------------------------------

/// Routed from the poller to whichever front end is draining the channel.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Price {
        source_id: String,
        sample: PriceSample,
    },
    /// A source failed this cycle; its last good sample is still in the store.
    SourceFailed {
        source_id: String,
        name: String,
        reason: String,
    },
    /// End of a cycle in which at least one source updated. `failed` holds the
    /// display names of sources that failed in the same cycle.
    CycleComplete {
        at: DateTime<Local>,
        failed: Vec<String>,
    },
    Alert(AlertEvent),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn price_field_keeps_upstream_text() {
        let v = json!("778.50");
        let field = PriceField::from_json(Some(&v));
        assert_eq!(field.as_str(), "778.50");
        assert_eq!(field.as_f64(), Some(778.5));
    }

    #[test]
    fn price_field_renders_numbers() {
        let v = json!(-1.25);
        let field = PriceField::from_json(Some(&v));
        assert_eq!(field.as_str(), "-1.25");
        assert_eq!(field.as_f64(), Some(-1.25));
    }

    #[test]
    fn absent_and_null_become_sentinel() {
        assert_eq!(PriceField::from_json(None).as_str(), SENTINEL);
        assert!(PriceField::from_json(Some(&serde_json::Value::Null)).is_missing());
        assert_eq!(PriceField::missing().as_f64(), None);
    }

    #[test]
    fn non_finite_text_is_not_numeric() {
        assert_eq!(PriceField::new("NaN").as_f64(), None);
        assert_eq!(PriceField::new("inf").as_f64(), None);
        assert_eq!(PriceField::new("失败").as_f64(), None);
    }
}
