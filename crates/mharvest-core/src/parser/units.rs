//! Human-readable size and percentage tokens as printed by container runtimes.

use std::sync::LazyLock;

use regex::Regex;

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z]*)$").expect("size regex is valid")
});

/// Parses a size token such as `1.5GiB`, `12.9kB` or `0B` into bytes.
///
/// `K/M/G/T` and `KiB/MiB/GiB/TiB` are powers of 1024; `KB/MB/GB/TB` are
/// powers of 1000. Units match case-insensitively.
pub fn parse_byte_size(token: &str) -> Option<f64> {
    let caps = SIZE_RE.captures(token.trim())?;
    let number = &caps[1];
    match unit_scale(&caps[2])? {
        // Powers of two scale exactly.
        Scale::Binary(exp) => Some(number.parse::<f64>().ok()? * 1024f64.powi(exp)),
        // Reparse with an exponent so `4.1MB` is 4100000 rather than 4.1 * 1e6.
        Scale::Decimal(exp) => format!("{number}e{exp}").parse().ok(),
    }
}

#[derive(Debug, Clone, Copy)]
enum Scale {
    Binary(i32),
    Decimal(i32),
}

fn unit_scale(unit: &str) -> Option<Scale> {
    let scale = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => Scale::Decimal(0),
        "k" | "kib" => Scale::Binary(1),
        "m" | "mib" => Scale::Binary(2),
        "g" | "gib" => Scale::Binary(3),
        "t" | "tib" => Scale::Binary(4),
        "kb" => Scale::Decimal(3),
        "mb" => Scale::Decimal(6),
        "gb" => Scale::Decimal(9),
        "tb" => Scale::Decimal(12),
        _ => return None,
    };
    Some(scale)
}

/// Parses `12.5%` or `12.5` into `12.5`.
pub fn parse_percent(token: &str) -> Option<f64> {
    let value: f64 = token.trim().trim_end_matches('%').parse().ok()?;
    value.is_finite().then_some(value)
}

/// Splits a `left / right` or `left/right` pair.
pub fn split_pair(token: &str) -> Option<(&str, &str)> {
    let (left, right) = token.split_once('/')?;
    let (left, right) = (left.trim(), right.trim());
    (!left.is_empty() && !right.is_empty()).then_some((left, right))
}
