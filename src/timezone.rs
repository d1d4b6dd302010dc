use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

use crate::Error;

pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// The current calendar day in `canonical_timezone`.
///
/// # Errors
/// Returns [Error::InvalidTimezoneError] if the timezone name is not recognised.
pub fn today(canonical_timezone: &str) -> Result<Date, Error> {
    let offset = get_local_offset(canonical_timezone).ok_or_else(|| {
        tracing::error!("Invalid timezone {canonical_timezone}");
        Error::InvalidTimezoneError(canonical_timezone.to_owned())
    })?;

    Ok(OffsetDateTime::now_utc().to_offset(offset).date())
}

#[cfg(test)]
mod tests {
    use crate::{
        Error,
        timezone::{get_local_offset, today},
    };

    #[test]
    fn known_timezones_have_an_offset() {
        assert!(get_local_offset("Etc/UTC").is_some());
    }

    #[test]
    fn unknown_timezones_are_an_error() {
        let result = today("Not/AZone");

        assert!(matches!(result, Err(Error::InvalidTimezoneError(name)) if name == "Not/AZone"));
    }
}
