//! Display formatting for amounts, dates and text.
//!
//! All functions are pure. Output follows US English conventions: `,` as the
//! thousands separator, `.` as the decimal point, "Mar 14, 2025" for dates.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Format an amount as currency, e.g. `-$1,234.50`. A missing amount renders as `$0.00`.
pub fn format_currency(amount: Option<f64>, currency: &str) -> String {
    let amount = match amount {
        Some(amount) if amount.is_finite() => amount,
        _ => return "$0.00".to_string(),
    };

    let symbol = currency_symbol(currency);
    let digits = group_thousands(&format!("{:.2}", amount.abs()));
    // "-0.00" should not carry a sign
    if amount < 0.0 && digits != "0.00" {
        format!("-{}{}", symbol, digits)
    } else {
        format!("{}{}", symbol, digits)
    }
}

fn currency_symbol(currency: &str) -> String {
    match currency.to_ascii_uppercase().as_str() {
        "USD" => "$".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        "JPY" => "¥".to_string(),
        "CAD" => "CA$".to_string(),
        "AUD" => "A$".to_string(),
        other => format!("{} ", other),
    }
}

/// Insert `,` separators into the integer part of an already formatted number
fn group_thousands(number: &str) -> String {
    let (integer, fraction) = match number.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (number, None),
    };
    let (sign, integer) = match integer.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", integer),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

/// Format a plain number with thousands separators and at most three decimals.
/// A missing value renders as `0`.
pub fn format_number(value: Option<f64>) -> String {
    let value = match value {
        Some(value) if value.is_finite() => value,
        _ => return "0".to_string(),
    };

    let fixed = format!("{:.3}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        return "0".to_string();
    }
    group_thousands(trimmed)
}

/// Format a ratio as a percentage: `0.256` with one decimal is `25.6%`
pub fn format_percentage(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(value) if value.is_finite() => format!("{:.*}%", decimals, value * 100.0),
        _ => "0%".to_string(),
    }
}

enum ParsedDate {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

fn parse_date(input: &str) -> Option<ParsedDate> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Some(ParsedDate::Date(date));
    }
    if let Ok(date_time) = DateTime::<FixedOffset>::parse_from_rfc3339(input) {
        return Some(ParsedDate::DateTime(date_time.naive_local()));
    }
    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(ParsedDate::DateTime)
}

fn month_day_year(date: NaiveDate) -> String {
    use chrono::Datelike;
    let month = MONTH_ABBREVIATIONS[date.month0() as usize];
    format!("{} {}, {}", month, date.day(), date.year())
}

/// Format a backend date or timestamp as `Mar 14, 2025`.
///
/// Empty input renders as `N/A`, unparseable input as `Invalid Date`.
pub fn format_date(input: &str) -> String {
    if input.trim().is_empty() {
        return "N/A".to_string();
    }
    match parse_date(input) {
        Some(ParsedDate::Date(date)) => month_day_year(date),
        Some(ParsedDate::DateTime(date_time)) => month_day_year(date_time.date()),
        None => "Invalid Date".to_string(),
    }
}

/// Format a backend timestamp as `Mar 14, 2025, 07:35 PM`, in the offset the
/// timestamp carries
pub fn format_date_time(input: &str) -> String {
    if input.trim().is_empty() {
        return "N/A".to_string();
    }
    let date_time = match parse_date(input) {
        Some(ParsedDate::Date(date)) => date.and_hms_opt(0, 0, 0),
        Some(ParsedDate::DateTime(date_time)) => Some(date_time),
        None => None,
    };
    match date_time {
        Some(date_time) => format!(
            "{}, {}",
            month_day_year(date_time.date()),
            date_time.format("%I:%M %p")
        ),
        None => "Invalid Date".to_string(),
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", count, unit)
    }
}

/// Describe `date` relative to `today`: `Today`, `Yesterday`, `3 days ago`,
/// `2 weeks ago`, `5 months ago`, `1 year ago`. Dates after `today` count as today.
pub fn format_relative_date(date: NaiveDate, today: NaiveDate) -> String {
    let days = (today - date).num_days().max(0);
    match days {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        2..=6 => format!("{} days ago", days),
        7..=29 => plural(days / 7, "week"),
        30..=364 => plural(days / 30, "month"),
        _ => plural(days / 365, "year"),
    }
}

/// Shorten `text` to `max_chars` characters, appending `...` when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

/// Upper-case the first letter of each space-separated word and lower-case the rest
pub fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
