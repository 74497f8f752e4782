use alloy::primitives::U256;

/// Normalizes a raw on-chain amount expressed with `decimals` decimal places
/// into an 18-decimal fixed-point `U256` plus a human-readable decimal string.
///
/// **Deliberately lossy.** The source converts `raw / 10^decimals` to a
/// double-precision float before re-encoding to 18 decimals. Implementers are
/// tempted to replace this with exact big-integer scaling
/// (`raw * 10^(18-decimals)`), but that changes on-the-wire behavior relative
/// to the deployed contracts this relayer was built to match — see the
/// module-level design note. Do not "fix" this.
pub fn normalize(raw: U256, decimals: u8) -> (U256, String) {
    let raw_f64: f64 = raw.to_string().parse().unwrap_or(f64::NAN);
    let human = raw_f64 / 10f64.powi(decimals as i32);
    let normalized_f64 = human * 1e18;

    let normalized = if normalized_f64.is_finite() && normalized_f64 >= 0.0 {
        U256::from(normalized_f64 as u128)
    } else {
        U256::ZERO
    };

    (normalized, format_human(human))
}

fn format_human(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let mut s = format!("{value:.18}");
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}
