//! Money helpers. Amounts are integer cents throughout the crate.

/// Formats cents as a price with two decimals, e.g. `1999` → `"$19.99"`.
///
/// Currencies other than USD/EUR/GBP are shown with their uppercase code.
#[must_use]
pub fn format_price(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let amount = format!("{}.{:02}", abs / 100, abs % 100);
    match currency.to_ascii_lowercase().as_str() {
        "usd" => format!("{sign}${amount}"),
        "eur" => format!("{sign}€{amount}"),
        "gbp" => format!("{sign}£{amount}"),
        other => format!("{sign}{amount} {}", other.to_ascii_uppercase()),
    }
}
