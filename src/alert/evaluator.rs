use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::AlertConfigError;
use crate::types::{AlertDirection, AlertEvent, PriceSample};

/// Thresholds around a base price. `upper = base + up`, `lower = base - down`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub base: f64,
    pub up: f64,
    pub down: f64,
}

impl Band {
    pub fn upper(&self) -> f64 {
        self.base + self.up
    }

    pub fn lower(&self) -> f64 {
        self.base - self.down
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AlertState {
    #[default]
    Disabled,
    Armed(Band),
}

impl AlertState {
    /// Arm with a band. Requires a positive base and non-negative amounts.
    pub fn armed(base: f64, up: f64, down: f64) -> Result<Self, AlertConfigError> {
        if !(base.is_finite() && up.is_finite() && down.is_finite()) {
            return Err(AlertConfigError::NotANumber);
        }
        if base <= 0.0 || up < 0.0 || down < 0.0 {
            return Err(AlertConfigError::OutOfRange);
        }
        Ok(AlertState::Armed(Band { base, up, down }))
    }

    /// Apply one price. Fires at most once and recenters the band on the
    /// triggering price. The up side is checked first, so a zero-width band
    /// fires `Up` when the price sits exactly on the base.
    ///
    /// Nothing guards against the same extreme price arriving again: with a
    /// zero-width band every identical sample fires.
    ///
    /// Prices that could not arm a band (zero, negative, non-finite) are
    /// ignored, so the base stays positive.
    pub fn on_price(&mut self, price: f64) -> Option<AlertDirection> {
        let AlertState::Armed(band) = self else {
            return None;
        };
        if !price.is_finite() || price <= 0.0 {
            return None;
        }

        let direction = if price >= band.upper() {
            AlertDirection::Up
        } else if price <= band.lower() {
            AlertDirection::Down
        } else {
            return None;
        };
        band.base = price;
        Some(direction)
    }

    pub fn band(&self) -> Option<Band> {
        match self {
            AlertState::Disabled => None,
            AlertState::Armed(b) => Some(*b),
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, AlertState::Armed(_))
    }
}

// ---------------------------------------------------------------------------
// AlertEvaluator: shared between the poller and the settings form
// ---------------------------------------------------------------------------

/// Owns the alert state behind a lock. Every write replaces the state whole, so
/// a save from the UI is seen by the next evaluation and never half-applied.
#[derive(Default)]
pub struct AlertEvaluator {
    state: Mutex<AlertState>,
}

impl AlertEvaluator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enable(&self, base: f64, up: f64, down: f64) -> Result<Band, AlertConfigError> {
        let next = AlertState::armed(base, up, down)?;
        *self.state.lock() = next;
        info!(base, up, down, "Alert armed: base {base} +{up} / -{down}");
        Ok(Band { base, up, down })
    }

    pub fn disable(&self) {
        let mut state = self.state.lock();
        if state.is_armed() {
            info!("Alert disabled");
        }
        *state = AlertState::Disabled;
    }

    pub fn state(&self) -> AlertState {
        *self.state.lock()
    }

    /// Evaluate a freshly fetched sample. Non-numeric prices are ignored.
    pub fn evaluate(&self, source_id: &str, sample: &PriceSample) -> Option<AlertEvent> {
        let Some(price) = sample.price.as_f64() else {
            debug!(source = %source_id, price = %sample.price, "Alert skipped: price not numeric");
            return None;
        };

        let (direction, previous) = {
            let mut state = self.state.lock();
            let previous = state.band()?;
            (state.on_price(price)?, previous)
        };

        info!(
            source = %source_id,
            direction = %direction,
            price,
            previous_base = previous.base,
            "ALERT {direction} | price {price} crossed [{:.2}, {:.2}], base recentered",
            previous.lower(),
            previous.upper(),
        );

        Some(AlertEvent {
            direction,
            price,
            price_text: sample.price.as_str().to_string(),
            source_id: source_id.to_string(),
            fired_at: Local::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceField;

    fn sample(price: &str) -> PriceSample {
        PriceSample {
            price: PriceField::new(price),
            change: PriceField::missing(),
            fetched_at: Local::now(),
        }
    }

    fn armed(base: f64, up: f64, down: f64) -> AlertState {
        AlertState::armed(base, up, down).unwrap()
    }

    #[test]
    fn disabled_never_fires() {
        let mut state = AlertState::Disabled;
        for price in [0.0, 1.0, 770.0, 1e9, -5.0] {
            assert_eq!(state.on_price(price), None);
        }
        assert_eq!(state, AlertState::Disabled);
    }

    #[test]
    fn crossing_upper_fires_up_and_recenters() {
        let mut state = armed(770.0, 5.0, 5.0);
        assert_eq!(state.on_price(775.0), Some(AlertDirection::Up));
        assert_eq!(state.band().unwrap().base, 775.0);
    }

    #[test]
    fn crossing_lower_fires_down_and_recenters() {
        let mut state = armed(770.0, 5.0, 5.0);
        assert_eq!(state.on_price(764.2), Some(AlertDirection::Down));
        assert_eq!(state.band().unwrap().base, 764.2);
    }

    #[test]
    fn inside_band_is_quiet_and_unchanged() {
        let mut state = armed(770.0, 5.0, 5.0);
        for price in [765.01, 770.0, 774.99] {
            assert_eq!(state.on_price(price), None);
        }
        assert_eq!(state, armed(770.0, 5.0, 5.0));
    }

    #[test]
    fn stream_fires_once_then_settles_in_new_band() {
        let mut state = armed(770.0, 5.0, 5.0);
        let fired: Vec<_> = [772.0, 774.0, 776.0]
            .into_iter()
            .map(|p| state.on_price(p))
            .collect();
        assert_eq!(fired, vec![None, None, Some(AlertDirection::Up)]);
        assert_eq!(state.band().unwrap().base, 776.0);

        // 774 is within [771, 781]
        assert_eq!(state.on_price(774.0), None);
    }

    #[test]
    fn zero_width_band_fires_up_on_base_every_time() {
        let mut state = armed(770.0, 0.0, 0.0);
        assert_eq!(state.on_price(770.0), Some(AlertDirection::Up));
        assert_eq!(state.on_price(770.0), Some(AlertDirection::Up));
        assert_eq!(state.on_price(769.0), Some(AlertDirection::Down));
    }

    #[test]
    fn non_positive_price_keeps_band_positive() {
        let mut state = armed(770.0, 5.0, 5.0);
        assert_eq!(state.on_price(0.0), None);
        assert_eq!(state.on_price(-3.0), None);
        assert_eq!(state, armed(770.0, 5.0, 5.0));

        // A normal price afterwards is judged against the original band.
        assert_eq!(state.on_price(770.0), None);

        let eval = AlertEvaluator::new();
        eval.enable(770.0, 5.0, 5.0).unwrap();
        assert!(eval.evaluate("zheshang", &sample("0")).is_none());
        assert_eq!(eval.state(), armed(770.0, 5.0, 5.0));
    }

    #[test]
    fn arming_validates_inputs() {
        assert_eq!(AlertState::armed(0.0, 1.0, 1.0), Err(AlertConfigError::OutOfRange));
        assert_eq!(AlertState::armed(770.0, -1.0, 1.0), Err(AlertConfigError::OutOfRange));
        assert_eq!(AlertState::armed(770.0, 1.0, -0.1), Err(AlertConfigError::OutOfRange));
        assert_eq!(AlertState::armed(f64::NAN, 1.0, 1.0), Err(AlertConfigError::NotANumber));
        assert!(AlertState::armed(770.0, 0.0, 0.0).is_ok());
    }

    #[test]
    fn rejected_enable_leaves_state_alone() {
        let eval = AlertEvaluator::new();
        eval.enable(770.0, 5.0, 5.0).unwrap();
        assert!(eval.enable(-1.0, 5.0, 5.0).is_err());
        assert_eq!(eval.state(), armed(770.0, 5.0, 5.0));
    }

    #[test]
    fn disable_then_enable_reproduces_state() {
        let eval = AlertEvaluator::new();
        eval.enable(770.0, 5.0, 3.0).unwrap();
        let before = eval.state();

        eval.disable();
        assert_eq!(eval.state(), AlertState::Disabled);
        assert!(eval.state().band().is_none());

        eval.enable(770.0, 5.0, 3.0).unwrap();
        assert_eq!(eval.state(), before);
    }

    #[test]
    fn evaluate_builds_event_from_sample_text() {
        let eval = AlertEvaluator::new();
        eval.enable(770.0, 5.0, 5.0).unwrap();

        let event = eval.evaluate("zheshang", &sample("776.50")).unwrap();
        assert_eq!(event.direction, AlertDirection::Up);
        assert_eq!(event.price, 776.5);
        assert_eq!(event.price_text, "776.50");
        assert_eq!(event.source_id, "zheshang");
        assert_eq!(eval.state().band().unwrap().base, 776.5);
    }

    #[test]
    fn evaluate_ignores_sentinel_price() {
        let eval = AlertEvaluator::new();
        eval.enable(770.0, 0.0, 0.0).unwrap();
        let missing = PriceSample {
            price: PriceField::missing(),
            change: PriceField::missing(),
            fetched_at: Local::now(),
        };

        assert!(eval.evaluate("zheshang", &missing).is_none());
        assert!(eval.evaluate("zheshang", &sample("abc")).is_none());
        assert_eq!(eval.state(), armed(770.0, 0.0, 0.0));
    }

    #[test]
    fn evaluate_when_disabled_is_silent() {
        let eval = AlertEvaluator::new();
        assert!(eval.evaluate("zheshang", &sample("9999")).is_none());
    }
}
