//! ISO `YYYY-MM-DD` date handling shared by records, buckets and query strings.

use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DAY_LABEL: &[BorrowedFormatItem<'static>] = format_description!("[month repr:short] [day]");
const MONTH_LABEL: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:short] [year]");

/// Serde adapter for fields holding a [Date] that travel as `YYYY-MM-DD`.
pub(crate) mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_iso_date(&text)
            .ok_or_else(|| D::Error::custom(format!("\"{text}\" is not a YYYY-MM-DD date")))
    }
}

/// Parse a calendar day in the `YYYY-MM-DD` format.
///
/// Surrounding whitespace is ignored. Returns `None` for anything else,
/// including impossible dates like `2024-02-30`.
pub fn parse_iso_date(text: &str) -> Option<Date> {
    Date::parse(text.trim(), ISO_DATE).ok()
}

/// Format a calendar day as `YYYY-MM-DD`.
pub fn format_iso_date(date: Date) -> String {
    date.format(ISO_DATE)
        .unwrap_or_else(|_| format!("{}-{:02}-{:02}", date.year(), date.month() as u8, date.day()))
}

/// A short chart label for a day, e.g. "Mar 01".
pub(crate) fn format_day_label(date: Date) -> String {
    date.format(DAY_LABEL).unwrap_or_else(|_| format_iso_date(date))
}

/// A short chart label for the month containing `date`, e.g. "Mar 2024".
pub(crate) fn format_month_label(date: Date) -> String {
    date.format(MONTH_LABEL).unwrap_or_else(|_| format_iso_date(date))
}

/// Parse an optional query string date, mapping bad input to a client error.
pub(crate) fn parse_query_date(text: &str) -> Result<Date, crate::Error> {
    parse_iso_date(text).ok_or_else(|| crate::Error::InvalidDate(text.to_owned()))
}
