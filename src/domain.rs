use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::PiperError;

/// Passbands indexed by the MEDOC AIA dataset, in angstroms.
pub const AIA_WAVELENGTHS: &[u32] = &[94, 131, 171, 193, 211, 304, 335, 1600, 1700, 4500];

/// Timestamp layout the archive expects in `DATE_BETWEEN` filters.
pub const ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const INPUT_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses an ISO-8601 UTC timestamp. Fractional seconds and a trailing `Z`
/// are optional.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, PiperError> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    INPUT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| PiperError::InvalidTimestamp(value.to_string()))
}

pub fn format_archive_time(timestamp: &NaiveDateTime) -> String {
    timestamp.format(ARCHIVE_TIME_FORMAT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Wavelength(u32);

impl Wavelength {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Wavelength {
    type Error = PiperError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if AIA_WAVELENGTHS.contains(&value) {
            Ok(Self(value))
        } else {
            Err(PiperError::InvalidWavelength(value))
        }
    }
}

impl From<Wavelength> for u32 {
    fn from(value: Wavelength) -> Self {
        value.0
    }
}

impl FromStr for Wavelength {
    type Err = PiperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().trim_end_matches(['A', 'a', 'Å']);
        let parsed = trimmed
            .parse::<u32>()
            .map_err(|_| PiperError::InvalidWavelengthText(value.to_string()))?;
        Self::try_from(parsed)
    }
}

impl fmt::Display for Wavelength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CadenceUnit {
    Minute,
    Hour,
    Day,
}

impl CadenceUnit {
    /// Unit spelling used by the archive's `mask_cadence` filter.
    pub fn archive_label(self) -> &'static str {
        match self {
            CadenceUnit::Minute => "min",
            CadenceUnit::Hour => "h",
            CadenceUnit::Day => "day",
        }
    }
}

impl FromStr for CadenceUnit {
    type Err = PiperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "min" | "mins" | "minute" | "minutes" => Ok(CadenceUnit::Minute),
            "h" | "hr" | "hrs" | "hour" | "hours" => Ok(CadenceUnit::Hour),
            "d" | "day" | "days" => Ok(CadenceUnit::Day),
            other => Err(PiperError::InvalidCadence(format!("unknown unit {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    value: u32,
    unit: CadenceUnit,
}

impl Cadence {
    pub fn new(value: u32, unit: CadenceUnit) -> Result<Self, PiperError> {
        if value == 0 {
            return Err(PiperError::InvalidCadence("cadence must be positive".to_string()));
        }
        Ok(Self { value, unit })
    }

    pub fn minutes(value: u32) -> Result<Self, PiperError> {
        Self::new(value, CadenceUnit::Minute)
    }

    pub fn hours(value: u32) -> Result<Self, PiperError> {
        Self::new(value, CadenceUnit::Hour)
    }

    pub fn days(value: u32) -> Result<Self, PiperError> {
        Self::new(value, CadenceUnit::Day)
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> CadenceUnit {
        self.unit
    }

    pub fn as_duration(&self) -> TimeDelta {
        let value = i64::from(self.value);
        match self.unit {
            CadenceUnit::Minute => TimeDelta::minutes(value),
            CadenceUnit::Hour => TimeDelta::hours(value),
            CadenceUnit::Day => TimeDelta::days(value),
        }
    }

    /// Value for the archive's `CADENCE|mask_cadence|...` filter, e.g. `12 min`.
    pub fn archive_mask(&self) -> String {
        format!("{} {}", self.value, self.unit.archive_label())
    }
}

impl FromStr for Cadence {
    type Err = PiperError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let split = trimmed
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(PiperError::InvalidCadence(value.to_string()));
        }
        let number = number
            .parse::<u32>()
            .map_err(|_| PiperError::InvalidCadence(value.to_string()))?;
        if unit.trim().is_empty() {
            return Err(PiperError::InvalidCadence(format!("{value:?} has no unit")));
        }
        Self::new(number, unit.parse()?)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.archive_mask())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// `aia_{wavelength}A_{timestamp}Z.fits`, unique per sample.
    #[default]
    Sample,
    /// Filename announced by the archive in Content-Disposition.
    Archive,
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingScheme::Sample => write!(f, "sample"),
            NamingScheme::Archive => write!(f, "archive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, Timelike};

    use super::*;

    #[test]
    fn parse_timestamp_variants() {
        let expected = NaiveDate::from_ymd_opt(2023, 2, 5)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2023-02-05T01:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-02-05T01:30:00.000").unwrap(), expected);
        assert_eq!(parse_timestamp("2023-02-05T01:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp(" 2023-02-05 01:30:00 ").unwrap(), expected);
    }

    #[test]
    fn parse_timestamp_keeps_fraction() {
        let ts = parse_timestamp("2023-02-05T01:30:00.250").unwrap();
        assert_eq!(ts.nanosecond(), 250_000_000);
    }

    #[test]
    fn parse_timestamp_invalid() {
        let err = parse_timestamp("05/02/2023 01:30").unwrap_err();
        assert_matches!(err, PiperError::InvalidTimestamp(_));
        let err = parse_timestamp("2023-02-30T00:00:00").unwrap_err();
        assert_matches!(err, PiperError::InvalidTimestamp(_));
    }

    #[test]
    fn archive_time_has_millis() {
        let ts = parse_timestamp("2023-02-05T02:00:00").unwrap();
        assert_eq!(format_archive_time(&ts), "2023-02-05T02:00:00.000");
    }

    #[test]
    fn wavelength_accepts_aia_passbands() {
        let wl: Wavelength = "193".parse().unwrap();
        assert_eq!(wl.as_u32(), 193);
        let wl: Wavelength = "1600A".parse().unwrap();
        assert_eq!(wl.as_u32(), 1600);
        assert_matches!(
            Wavelength::try_from(500),
            Err(PiperError::InvalidWavelength(500))
        );
        assert_matches!(
            "blue".parse::<Wavelength>(),
            Err(PiperError::InvalidWavelengthText(text)) if text == "blue"
        );
    }

    #[test]
    fn parse_cadence_forms() {
        assert_eq!("12min".parse::<Cadence>().unwrap(), Cadence::minutes(12).unwrap());
        assert_eq!("1 h".parse::<Cadence>().unwrap(), Cadence::hours(1).unwrap());
        assert_eq!("2hours".parse::<Cadence>().unwrap(), Cadence::hours(2).unwrap());
        assert_eq!("1day".parse::<Cadence>().unwrap(), Cadence::days(1).unwrap());
        assert_eq!("3D".parse::<Cadence>().unwrap(), Cadence::days(3).unwrap());
    }

    #[test]
    fn parse_cadence_rejects_bad_input() {
        assert_matches!("0h".parse::<Cadence>(), Err(PiperError::InvalidCadence(_)));
        assert_matches!("h".parse::<Cadence>(), Err(PiperError::InvalidCadence(_)));
        assert_matches!("10".parse::<Cadence>(), Err(PiperError::InvalidCadence(_)));
        assert_matches!("10s".parse::<Cadence>(), Err(PiperError::InvalidCadence(_)));
        assert_matches!("-1h".parse::<Cadence>(), Err(PiperError::InvalidCadence(_)));
    }

    #[test]
    fn cadence_duration_and_mask() {
        let cadence = Cadence::days(1).unwrap();
        assert_eq!(cadence.as_duration(), TimeDelta::hours(24));
        assert_eq!(cadence.archive_mask(), "1 day");
        assert_eq!(Cadence::minutes(12).unwrap().archive_mask(), "12 min");
        assert_eq!(Cadence::hours(6).unwrap().to_string(), "6 h");
    }
}
