//! Display formatting for population and name-frequency figures, plus the
//! ranking search filter.
//!
//! Numbers are grouped with "." as the thousands separator, matching the
//! pt-BR rendering of the original front-ends ("11.451.999 habitantes").

use crate::model::NameRankingEntry;

/// Groups a non-negative integer with "." thousands separators:
/// `1234567` → `"1.234.567"`.
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (i, c) in digits.chars().enumerate() {
        if i != 0 && (i + 3 - offset) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    grouped
}

/// Formats a raw population string for display, appending the
/// "habitantes" suffix. Unparseable input is shown as-is, without a
/// suffix, mirroring the originals' fallback.
pub fn format_population(raw: &str) -> String {
    match raw.trim().parse::<u64>() {
        Ok(value) => format!("{} habitantes", format_thousands(value)),
        Err(_) => raw.to_string(),
    }
}

/// Formats a name frequency for the ranking list: `"Freq: 1.234.567"`.
pub fn format_frequency(frequency: u64) -> String {
    format!("Freq: {}", format_thousands(frequency))
}

/// Case-insensitive substring filter over a ranking list, preserving the
/// incoming order. A blank query returns everything. Entry names are
/// already uppercase, so only the query needs folding.
pub fn filter_ranking<'a>(entries: &'a [NameRankingEntry], query: &str) -> Vec<&'a NameRankingEntry> {
    let needle = query.trim().to_uppercase();
    if needle.is_empty() {
        return entries.iter().collect();
    }
    entries
        .iter()
        .filter(|entry| entry.name.contains(&needle))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
