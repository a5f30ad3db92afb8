use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Caller's timezone as a fixed UTC offset.
///
/// Accepted forms: `Z`, `UTC`, `+HH:MM`, `-HH:MM`, `+HHMM`. Zone names are not resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(FixedOffset);

impl Timezone {
    pub fn utc() -> Self {
        Timezone(Utc.fix())
    }

    pub fn from_offset(offset: FixedOffset) -> Self {
        Timezone(offset)
    }

    pub fn offset(&self) -> FixedOffset {
        self.0
    }

    /// Calendar date of `instant` as seen in this timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.0).date_naive()
    }

    /// Local midnight starting `date`, expressed in UTC.
    pub fn start_of_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        date.and_hms_opt(0, 0, 0)?
            .and_local_timezone(self.0)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// First instant of the day after `date` in this timezone, expressed in UTC.
    pub fn end_of_day(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.start_of_day(date.succ_opt()?)
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self::utc()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timezone offset '{0}', expected Z, UTC or +HH:MM")]
pub struct TimezoneParseError(pub String);

impl FromStr for Timezone {
    type Err = TimezoneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }

        // chrono stops at the offset and ignores trailing input
        if !matches!(raw.len(), 5 | 6) {
            return Err(TimezoneParseError(s.to_string()));
        }
        raw.parse::<FixedOffset>()
            .map(Timezone)
            .map_err(|_| TimezoneParseError(s.to_string()))
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Timezone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timezone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_supported_forms() {
        assert_eq!("Z".parse::<Timezone>().unwrap(), Timezone::utc());
        assert_eq!("utc".parse::<Timezone>().unwrap(), Timezone::utc());
        assert_eq!(
            "+02:00".parse::<Timezone>().unwrap().offset().local_minus_utc(),
            7200
        );
        assert_eq!(
            "-0530".parse::<Timezone>().unwrap().offset().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert_eq!(" +09:00 ".parse::<Timezone>().unwrap().offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "Europe/Paris", "+25:00", "+02:75", "02:00", "+1:2:3", "+9", "+02:00xyz"] {
            assert!(raw.parse::<Timezone>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn local_date_crosses_midnight() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 10, 23, 30, 0).unwrap();
        let tokyo: Timezone = "+09:00".parse().unwrap();
        let utc = Timezone::utc();
        assert_eq!(utc.local_date(instant), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(tokyo.local_date(instant), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn end_of_day_is_next_local_midnight() {
        let tz: Timezone = "-05:00".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(
            tz.end_of_day(date).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 11, 5, 0, 0).unwrap()
        );
    }
}
