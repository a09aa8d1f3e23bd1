use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]+").expect("static regex"));

/// 1) Trim whitespace, including the carriage return left by CRLF input.
pub fn clean_cell(raw: &str) -> String {
    raw.trim().to_string()
}

/// 2) Whole-number coercion for prices and counts: keep the part before any
/// `.`, drop every non-digit (symbols, separators, sign) and parse what is
/// left. "₹1,500.00" → 1500, "3.9" → 3. Unparseable input or overflow is 0.
pub fn coerce_amount(raw: &str) -> u64 {
    let integer_part = raw.split('.').next().unwrap_or_default();
    NON_DIGITS
        .replace_all(integer_part, "")
        .parse::<u64>()
        .unwrap_or(0)
}

/// First whitespace-separated word of `name`, or `fallback` when there is none.
pub fn first_word<'a>(name: &'a str, fallback: &'a str) -> &'a str {
    name.split_whitespace().next().unwrap_or(fallback)
}

/// Upper-cases the first character, leaving the rest untouched.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
