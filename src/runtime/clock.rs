use std::time::{SystemTime, UNIX_EPOCH};

/// Unix seconds as a float, matching the sequence-number and timestamp
/// sources in §3/§6.3.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// `[<ts>]` formatting per §6.3: Unix seconds rounded to three decimals,
/// right-padded to exactly three fractional digits.
pub fn format_bracket(ts: f64) -> String {
    format!("[{ts:.3}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_three_fractional_digits() {
        assert_eq!(format_bracket(1700000000.1), "[1700000000.100]");
    }

    #[test]
    fn rounds_to_three_decimals() {
        assert_eq!(format_bracket(1700000000.12345), "[1700000000.123]");
    }
}
