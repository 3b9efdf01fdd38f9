use crate::alert::evaluator::{AlertEvaluator, AlertState, Band};
use crate::error::AlertConfigError;

/// Alert configuration as the settings form sees it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub base_price: Option<f64>,
    pub up_amount: Option<f64>,
    pub down_amount: Option<f64>,
}

impl From<AlertState> for AlertConfig {
    fn from(state: AlertState) -> Self {
        match state {
            AlertState::Disabled => AlertConfig::default(),
            AlertState::Armed(Band { base, up, down }) => AlertConfig {
                enabled: true,
                base_price: Some(base),
                up_amount: Some(up),
                down_amount: Some(down),
            },
        }
    }
}

/// Raw text from the settings form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsInput {
    pub enabled: bool,
    pub base: String,
    pub up: String,
    pub down: String,
}

impl SettingsInput {
    /// Pre-fill from the current configuration; cleared fields stay empty.
    pub fn from_config(cfg: &AlertConfig) -> Self {
        let text = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
        Self {
            enabled: cfg.enabled,
            base: text(cfg.base_price),
            up: text(cfg.up_amount),
            down: text(cfg.down_amount),
        }
    }

    /// Parse into `(base, up, down)`. Empty amounts mean zero; the base is required.
    pub fn parse(&self) -> Result<(f64, f64, f64), AlertConfigError> {
        let base = parse_number(&self.base)?;
        let up = parse_amount(&self.up)?;
        let down = parse_amount(&self.down)?;
        Ok((base, up, down))
    }
}

/// Apply a save from the settings surface and return the confirmation text.
/// On error nothing is changed.
pub fn save(eval: &AlertEvaluator, input: &SettingsInput) -> Result<String, AlertConfigError> {
    if !input.enabled {
        eval.disable();
        return Ok("提醒已关闭".to_string());
    }

    let (base, up, down) = input.parse()?;
    let band = eval.enable(base, up, down)?;
    Ok(format!(
        "提醒已设置: 基准{} 涨{} 跌{}",
        band.base, band.up, band.down
    ))
}

fn parse_number(s: &str) -> Result<f64, AlertConfigError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or(AlertConfigError::NotANumber)
}

fn parse_amount(s: &str) -> Result<f64, AlertConfigError> {
    if s.trim().is_empty() {
        Ok(0.0)
    } else {
        parse_number(s)
    }
}
