//! Declared date normalization.

use chrono::NaiveDate;

const ACCEPTED_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%b%d", "%d%b%Y"];

/// Normalize a declared date to `YYYY-MM-DD` when it parses in one of the
/// accepted formats; anything else is returned verbatim.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_dates_pass_through() {
        assert_eq!(normalize_date("2024-06-15"), "2024-06-15");
    }

    #[test]
    fn test_compact_month_name_forms() {
        assert_eq!(normalize_date("2019Dec31"), "2019-12-31");
        assert_eq!(normalize_date("28Jan2022"), "2022-01-28");
    }

    #[test]
    fn test_unparseable_kept_verbatim() {
        assert_eq!(normalize_date("unknown"), "unknown");
        assert_eq!(normalize_date("Q3 2021"), "Q3 2021");
    }
}
