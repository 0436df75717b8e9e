/// Magnitude units above the plain-integer range, smallest first.
const UNITS: [(u128, &str); 3] = [(1_000, "K"), (1_000_000, "M"), (1_000_000_000, "B")];

/// Abbreviate a citation count: `1234` → `"1.23K"`, `3_400_000` → `"3.4M"`.
///
/// Values below 1000 render as plain integers. Otherwise the count is divided
/// into the largest fitting unit, rounded half-up to two fractional digits,
/// and trailing zeros are dropped.
pub fn format_count(count: u64) -> String {
    if count < 1_000 {
        return count.to_string();
    }

    let mut unit = UNITS
        .iter()
        .rposition(|&(divisor, _)| u128::from(count) >= divisor)
        .unwrap_or(0);
    let mut hundredths = scaled_hundredths(count, UNITS[unit].0);

    // 999_999 rounds to 1000.00K; show it as 1M instead.
    if hundredths >= 100_000 && unit + 1 < UNITS.len() {
        unit += 1;
        hundredths = scaled_hundredths(count, UNITS[unit].0);
    }

    let whole = hundredths / 100;
    let frac = hundredths % 100;
    let suffix = UNITS[unit].1;
    match frac {
        0 => format!("{whole}{suffix}"),
        f if f % 10 == 0 => format!("{whole}.{}{suffix}", f / 10),
        f => format!("{whole}.{f:02}{suffix}"),
    }
}

/// `count / divisor` in hundredths, rounded half-up.
fn scaled_hundredths(count: u64, divisor: u128) -> u128 {
    (u128::from(count) * 100 + divisor / 2) / divisor
}
