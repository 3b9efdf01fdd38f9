pub mod evaluator;
pub mod settings;

pub use evaluator::{AlertEvaluator, AlertState, Band};
pub use settings::{AlertConfig, SettingsInput};
