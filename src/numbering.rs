//! Receipt number formatting and parsing.
//!
//! A receipt number is the configured prefix followed by a decimal sequence
//! value, e.g. `#NMF01/24-25/FSJB42`. The persistent side of allocation lives
//! in [`crate::db::allocate_receipt_number`].

use regex::Regex;
use std::sync::OnceLock;

fn trailing_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)$").expect("static regex"))
}

/// Sequence value at the end of a receipt number, if any.
pub fn trailing_number(receipt_number: &str) -> Option<u64> {
    trailing_digits()
        .captures(receipt_number)
        .and_then(|cap| cap[1].parse::<u64>().ok())
}

/// Sequence value of a receipt number issued under `prefix`. Only the part
/// after the prefix is parsed, so digits inside the prefix never count.
pub fn sequence_value(receipt_number: &str, prefix: &str) -> Option<u64> {
    receipt_number.strip_prefix(prefix).and_then(trailing_number)
}

/// Next sequence value given the last receipt issued under `prefix` and the
/// stored counter. Whichever is further ahead wins, so hand-inserted rows and
/// the counter cannot hand out the same value twice. `None` once the sequence
/// cannot grow any further.
pub fn next_value(
    prefix: &str,
    last_receipt: Option<&str>,
    last_counter: Option<u64>,
    seed: u64,
) -> Option<u64> {
    let from_receipt = last_receipt.and_then(|number| sequence_value(number, prefix));
    match from_receipt.max(last_counter) {
        Some(last) => last.checked_add(1),
        None => Some(seed),
    }
}

pub fn format_receipt_number(prefix: &str, value: u64) -> String {
    format!("{}{}", prefix, value)
}

/// File name of the rendered document for a receipt number.
pub fn pdf_file_name(receipt_number: &str) -> String {
    format!("{}.pdf", receipt_number.replace(['#', '/'], "-"))
}

/// Number for a raw record created without a document.
pub fn record_number(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("REC{}", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "#NMF01/24-25/FSJB";

    #[test]
    fn increments_trailing_digits() {
        let next = next_value(PREFIX, Some("#NMF01/24-25/FSJB42"), None, 1);
        assert_eq!(next, Some(43));
        assert_eq!(format_receipt_number(PREFIX, 43), "#NMF01/24-25/FSJB43");
    }

    #[test]
    fn seeds_without_history() {
        assert_eq!(next_value(PREFIX, None, None, 1), Some(1));
        assert_eq!(next_value(PREFIX, Some("#NMF01/24-25/FSJB"), None, 100), Some(100));
    }

    #[test]
    fn counter_ahead_of_last_receipt_wins() {
        assert_eq!(next_value("#X/FSJB", Some("#X/FSJB5"), Some(9), 1), Some(10));
        assert_eq!(next_value("#X/FSJB", Some("#X/FSJB12"), Some(9), 1), Some(13));
        assert_eq!(next_value("#X/FSJB", None, Some(3), 1), Some(4));
    }

    #[test]
    fn only_the_final_digit_run_counts() {
        assert_eq!(trailing_number("#NMF01/24-25/FSJB7"), Some(7));
        assert_eq!(trailing_number("#NMF01/24-25/FSJB"), None);
    }

    #[test]
    fn prefix_ending_in_digit_is_not_parsed() {
        assert_eq!(sequence_value("#R20241", "#R2024"), Some(1));
        assert_eq!(sequence_value("#R2024", "#R2024"), None);
        assert_eq!(sequence_value("#Q20241", "#R2024"), None);
        assert_eq!(next_value("#R2024", Some("#R20241"), None, 1), Some(2));
        assert_eq!(format_receipt_number("#R2024", 2), "#R20242");
    }

    #[test]
    fn exhausted_sequence_has_no_next_value() {
        let last = format!("#X/{}", u64::MAX);
        assert_eq!(next_value("#X/", Some(&last), None, 1), None);
        assert_eq!(next_value("#X/", None, Some(u64::MAX), 1), None);
    }

    #[test]
    fn file_name_replaces_hash_and_slash() {
        assert_eq!(pdf_file_name("#NMF01/24-25/FSJB3"), "-NMF01-24-25-FSJB3.pdf");
    }

    #[test]
    fn record_number_uses_millis() {
        let now = chrono::DateTime::from_timestamp_millis(1_700_000_000_123).expect("timestamp");
        assert_eq!(record_number(now), "REC1700000000123");
    }
}
