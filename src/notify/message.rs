use crate::notify::Notice;
use crate::types::AlertEvent;

pub const ALERT_TITLE: &str = "金价提醒";

/// Fixed sample used by the voice-test control.
pub const VOICE_TEST_PRICE: &str = "778.50";

/// `涨了，现在776.50元`
pub fn alert_notice(event: &AlertEvent) -> Notice {
    Notice {
        title: ALERT_TITLE.to_string(),
        body: format!("{}，现在{}元", event.direction.verb(), event.price_text),
    }
}

/// Same sentence with the price spelled out digit by digit for a speech engine.
pub fn spoken_text(verb: &str, price_text: &str) -> String {
    format!("{verb}，现在{}元", spell_digits(price_text))
}

/// Digit-by-digit reading: `778.50` → `七七八点五零`. Other characters pass through.
pub fn spell_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '0' => '零',
            '1' => '一',
            '2' => '二',
            '3' => '三',
            '4' => '四',
            '5' => '五',
            '6' => '六',
            '7' => '七',
            '8' => '八',
            '9' => '九',
            '.' => '点',
            other => other,
        })
        .collect()
}
