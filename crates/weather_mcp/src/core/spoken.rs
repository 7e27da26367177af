use std::str::FromStr;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::core::models::ResolvedLocation;
use crate::core::utils::{ISO_DATETIME_FORMAT, MONTH_FORMAT, capitalize_first, clock_words, ordinal_words};

/// Local time at a location, in words and in numbers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpokenTime {
    pub spoken: String,
    pub location: String,
    pub timezone: String,
    pub iso_time: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl SpokenTime {
    pub fn from_datetime(datetime: &DateTime<Tz>, location: &str) -> Self {
        let spoken = format!(
            "the current time is {} {} {} in {}",
            clock_words(datetime.hour(), datetime.minute()),
            datetime.format(MONTH_FORMAT),
            ordinal_words(datetime.day()),
            location
        );

        Self {
            spoken,
            location: location.to_string(),
            timezone: datetime.timezone().name().to_string(),
            iso_time: datetime.format(ISO_DATETIME_FORMAT).to_string(),
            year: datetime.year(),
            month: datetime.month(),
            day: datetime.day(),
            hour: datetime.hour(),
            minute: datetime.minute(),
        }
    }
}

/// Timezone of a resolved location, UTC when absent or unknown
pub fn timezone_for(location: &ResolvedLocation) -> Tz {
    match location.timezone.as_deref() {
        Some(name) => Tz::from_str(name).unwrap_or_else(|_| {
            tracing::warn!("Could not parse timezone '{}', defaulting to UTC", name);
            chrono_tz::UTC
        }),
        None => chrono_tz::UTC,
    }
}

pub fn current_time_for(location: &ResolvedLocation) -> SpokenTime {
    let timezone = timezone_for(location);
    let now = Utc::now().with_timezone(&timezone);
    SpokenTime::from_datetime(&now, &location.display_name)
}

pub fn render_time(time: &SpokenTime) -> String {
    format!(
        "# Current Time\n\n\
{}\n\n\
*Detailed Information:*\n\
- **Location**: {}\n\
- **Timezone**: {}\n\
- **ISO Time**: {}\n\
- **Date**: {}/{}/{}\n\
- **Time**: {:02}:{:02}",
        capitalize_first(&time.spoken),
        time.location,
        time.timezone,
        time.iso_time,
        time.month,
        time.day,
        time.year,
        time.hour,
        time.minute
    )
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::core::models::LocationOrigin;

    fn at(tz: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_spoken_sentence() {
        let time = SpokenTime::from_datetime(
            &at(chrono_tz::Europe::Paris, 2024, 3, 21, 19, 5),
            "Paris, Île-de-France, France",
        );

        assert_eq!(
            time.spoken,
            "the current time is seven oh five pm March twenty-first in Paris, Île-de-France, France"
        );
        assert_eq!(time.timezone, "Europe/Paris");
        assert_eq!(time.iso_time, "2024-03-21T19:05:00+01:00");
    }

    #[test]
    fn test_midnight_and_noon() {
        let midnight = SpokenTime::from_datetime(&at(chrono_tz::UTC, 2024, 1, 1, 0, 0), "Greenwich");
        assert!(midnight.spoken.starts_with("the current time is twelve am January first"));

        let noon = SpokenTime::from_datetime(&at(chrono_tz::UTC, 2024, 12, 2, 12, 30), "Greenwich");
        assert!(noon.spoken.starts_with("the current time is twelve thirty pm December second"));
    }

    #[test]
    fn test_render_time() {
        let time = SpokenTime::from_datetime(
            &at(chrono_tz::America::New_York, 2024, 7, 4, 9, 7),
            "New York, USA",
        );

        let expected = "# Current Time\n\n\
The current time is nine oh seven am July fourth in New York, USA\n\n\
*Detailed Information:*\n\
- **Location**: New York, USA\n\
- **Timezone**: America/New_York\n\
- **ISO Time**: 2024-07-04T09:07:00-04:00\n\
- **Date**: 7/4/2024\n\
- **Time**: 09:07";
        assert_eq!(render_time(&time), expected);
    }

    #[test]
    fn test_unknown_or_missing_timezone_is_utc() {
        let mut location = ResolvedLocation::from_coordinates(10.0, 20.0);
        assert_eq!(timezone_for(&location), chrono_tz::UTC);

        location.timezone = Some("Not/AZone".to_string());
        assert_eq!(timezone_for(&location), chrono_tz::UTC);

        location.timezone = Some("Asia/Tokyo".to_string());
        assert_eq!(timezone_for(&location), chrono_tz::Asia::Tokyo);
    }

    #[test]
    fn test_current_time_uses_display_name() {
        let location = ResolvedLocation {
            latitude: 35.6895,
            longitude: 139.69171,
            display_name: "Tokyo, Japan".to_string(),
            timezone: Some("Asia/Tokyo".to_string()),
            source_ip: None,
            origin: LocationOrigin::PlaceName,
        };

        let time = current_time_for(&location);

        assert_eq!(time.timezone, "Asia/Tokyo");
        assert!(time.spoken.ends_with("in Tokyo, Japan"));
        assert!(time.iso_time.ends_with("+09:00"));
    }
}
