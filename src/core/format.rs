//! Locale-independent formatting for schema fields.
//!
//! The SEFAZ schemas reject comma decimal separators, grouping characters,
//! and scientific notation, so every numeric and date field goes through
//! these functions instead of `Display` defaults or host-locale formatting.

use chrono::{DateTime, FixedOffset};
use rust_decimal::{Decimal, RoundingStrategy};

/// Format a decimal with a period separator and exactly `places` fraction
/// digits, for any magnitude. Rounds half away from zero, the convention
/// used throughout the NF-e layout.
pub fn format_decimal(value: Decimal, places: u32) -> String {
    let rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.prec$}", prec = places as usize)
}

/// Monetary amount: exactly 2 fraction digits (vProd, vNF, vICMS, ...).
pub fn format_amount(value: Decimal) -> String {
    format_decimal(value, 2)
}

/// Quantity: exactly 4 fraction digits (qCom, qTrib).
pub fn format_quantity(value: Decimal) -> String {
    format_decimal(value, 4)
}

/// Percentage rate: exactly 4 fraction digits (pICMS, pPIS, ...).
pub fn format_percentage(value: Decimal) -> String {
    format_decimal(value, 4)
}

/// Unit price: up to 10 fraction digits, trailing zeros trimmed to at
/// least 2 (vUnCom admits more precision than monetary totals).
pub fn format_unit_price(value: Decimal) -> String {
    let s = format_decimal(value, 10);
    let trimmed = s.trim_end_matches('0');
    let fraction = trimmed.len() - trimmed.find('.').unwrap_or(trimmed.len()) - 1;
    if fraction < 2 {
        format_decimal(value, 2)
    } else {
        trimmed.to_string()
    }
}

/// ISO 8601 date-time with an explicit numeric UTC offset (dhEmi, dhEvento).
/// The layout mandates `±HH:MM`, never the `Z` shorthand.
pub fn format_timestamp(value: &DateTime<FixedOffset>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Normalize free text before it enters a document that will be signed.
///
/// Trims, collapses internal whitespace runs to a single space, and
/// substitutes the typographic characters the authority's canonicalizer
/// is sensitive to with ASCII equivalents.
pub fn normalize_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_space = false;
    for ch in value.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        match ch {
            'ª' => out.push('a'),
            'º' | '°' => out.push('o'),
            '¹' => out.push('1'),
            '²' => out.push('2'),
            '³' => out.push('3'),
            '–' | '—' => out.push('-'),
            '’' | '‘' => out.push('\''),
            '“' | '”' => out.push('"'),
            other => out.push(other),
        }
    }
    out
}
