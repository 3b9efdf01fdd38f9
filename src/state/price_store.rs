use std::sync::Arc;

use dashmap::DashMap;

use crate::types::PriceSample;

// ---------------------------------------------------------------------------
// PriceStore
// ---------------------------------------------------------------------------

/// Latest successful sample per source id. Written by the poller (periodic and
/// manual runs alike, last write wins), read by the UI and the alert path.
///
/// Entries are only ever replaced whole; a failed refresh never touches them.
#[derive(Default)]
pub struct PriceStore {
    samples: DashMap<String, PriceSample>,
}

impl PriceStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn update(&self, source_id: &str, sample: PriceSample) {
        self.samples.insert(source_id.to_string(), sample);
    }

    pub fn get(&self, source_id: &str) -> Option<PriceSample> {
        self.samples.get(source_id).map(|s| s.clone())
    }

    /// Numeric price for a source, if one has been seen and it parses.
    pub fn current_price(&self, source_id: &str) -> Option<f64> {
        self.samples.get(source_id).and_then(|s| s.price.as_f64())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PriceField;
    use chrono::Local;

    fn sample(price: &str) -> PriceSample {
        PriceSample {
            price: PriceField::new(price),
            change: PriceField::new("0.5"),
            fetched_at: Local::now(),
        }
    }

    #[test]
    fn update_replaces_whole_sample() {
        let store = PriceStore::new();
        store.update("zheshang", sample("770.00"));
        store.update("zheshang", sample("771.50"));

        let got = store.get("zheshang").unwrap();
        assert_eq!(got.price.as_str(), "771.50");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn current_price_requires_numeric_text() {
        let store = PriceStore::new();
        assert!(store.current_price("zheshang").is_none());

        store.update("zheshang", sample("--"));
        assert!(store.current_price("zheshang").is_none());

        store.update("zheshang", sample("772.4"));
        assert_eq!(store.current_price("zheshang"), Some(772.4));
    }

    #[test]
    fn sources_are_independent() {
        let store = PriceStore::new();
        store.update("zheshang", sample("770"));
        assert!(store.get("minsheng").is_none());
        assert!(!store.is_empty());
    }
}
