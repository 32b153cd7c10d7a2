use camino::Utf8PathBuf;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::domain::{Cadence, Wavelength, parse_timestamp};
use crate::error::PiperError;

/// A validated fetch: start <= end, cadence > 0, wavelength known to the archive.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    start: NaiveDateTime,
    end: NaiveDateTime,
    wavelength: Wavelength,
    cadence: Cadence,
    output_dir: Option<Utf8PathBuf>,
}

impl FetchRequest {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        wavelength: Wavelength,
        cadence: Cadence,
        output_dir: Option<Utf8PathBuf>,
    ) -> Result<Self, PiperError> {
        if end < start {
            return Err(PiperError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        if cadence.as_duration() <= TimeDelta::zero() {
            return Err(PiperError::InvalidCadence(cadence.to_string()));
        }
        Ok(Self {
            start,
            end,
            wavelength,
            cadence,
            output_dir,
        })
    }

    /// Builds a request from the raw call-surface values.
    pub fn parse(
        start: &str,
        end: &str,
        wavelength: u32,
        cadence: Cadence,
        output_dir: Option<&str>,
    ) -> Result<Self, PiperError> {
        let start = parse_timestamp(start)?;
        let end = parse_timestamp(end)?;
        let wavelength = Wavelength::try_from(wavelength)?;
        Self::new(
            start,
            end,
            wavelength,
            cadence,
            output_dir.map(Utf8PathBuf::from),
        )
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn wavelength(&self) -> Wavelength {
        self.wavelength
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn output_dir(&self) -> Option<&Utf8PathBuf> {
        self.output_dir.as_ref()
    }

    pub fn sample_count(&self) -> usize {
        let span = (self.end - self.start).num_milliseconds();
        let step = self.cadence.as_duration().num_milliseconds();
        (span / step) as usize + 1
    }

    /// Samples start at `start` and step by the cadence; `end` itself is
    /// included when it lands exactly on a step.
    pub fn samples(&self) -> Samples {
        Samples {
            next: Some(self.start),
            end: self.end,
            step: self.cadence.as_duration(),
            index: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SampleTimestamp {
    pub index: usize,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct Samples {
    next: Option<NaiveDateTime>,
    end: NaiveDateTime,
    step: TimeDelta,
    index: usize,
}

impl Iterator for Samples {
    type Item = SampleTimestamp;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|ts| *ts <= self.end)?;
        self.next = current.checked_add_signed(self.step);
        let sample = SampleTimestamp {
            index: self.index,
            timestamp: current,
        };
        self.index += 1;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn request(start: &str, end: &str, cadence: Cadence) -> Result<FetchRequest, PiperError> {
        FetchRequest::parse(start, end, 193, cadence, None)
    }

    #[test]
    fn hourly_range_is_inclusive() {
        let req = request(
            "2023-02-05T00:00:00",
            "2023-02-05T02:00:00",
            Cadence::hours(1).unwrap(),
        )
        .unwrap();
        let stamps: Vec<String> = req
            .samples()
            .map(|s| s.timestamp.format("%H:%M").to_string())
            .collect();
        assert_eq!(stamps, vec!["00:00", "01:00", "02:00"]);
        assert_eq!(req.sample_count(), 3);
    }

    #[test]
    fn partial_final_interval_is_dropped() {
        let req = request(
            "2023-02-05T00:00:00",
            "2023-02-05T00:50:00",
            Cadence::minutes(12).unwrap(),
        )
        .unwrap();
        let samples: Vec<_> = req.samples().collect();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples.last().unwrap().timestamp.format("%H:%M").to_string(), "00:48");
        assert_eq!(samples.last().unwrap().index, 4);
        assert_eq!(req.sample_count(), samples.len());
    }

    #[test]
    fn cadence_longer_than_range_yields_start_only() {
        let req = request(
            "2023-02-05T00:00:00",
            "2023-02-05T02:00:00",
            Cadence::days(1).unwrap(),
        )
        .unwrap();
        let samples: Vec<_> = req.samples().collect();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].timestamp, req.start());
    }

    #[test]
    fn equal_bounds_yield_one_sample() {
        let req = request(
            "2023-02-05T00:00:00",
            "2023-02-05T00:00:00.000",
            Cadence::minutes(1).unwrap(),
        )
        .unwrap();
        assert_eq!(req.samples().count(), 1);
        assert_eq!(req.sample_count(), 1);
    }

    #[test]
    fn reversed_bounds_rejected() {
        let err = request(
            "2023-02-05T02:00:00",
            "2023-02-05T00:00:00",
            Cadence::hours(1).unwrap(),
        )
        .unwrap_err();
        assert_matches!(err, PiperError::InvalidRange { .. });
    }

    #[test]
    fn count_matches_formula_across_cadences() {
        let cases = [
            ("2023-01-01T00:00:00", "2023-01-01T23:59:59", Cadence::minutes(7).unwrap()),
            ("2023-01-01T00:00:00", "2023-01-10T00:00:00", Cadence::days(2).unwrap()),
            ("2023-01-01T00:00:00", "2023-01-01T05:00:00", Cadence::hours(5).unwrap()),
            ("2023-01-01T00:00:00", "2023-01-01T00:00:59", Cadence::minutes(1).unwrap()),
        ];
        for (start, end, cadence) in cases {
            let req = request(start, end, cadence).unwrap();
            let span = (req.end() - req.start()).num_seconds();
            let step = cadence.as_duration().num_seconds();
            let expected = (span / step) as usize + 1;
            assert_eq!(req.samples().count(), expected, "{start}..{end} @ {cadence}");
            assert_eq!(req.sample_count(), expected);
        }
    }

    #[test]
    fn unknown_wavelength_rejected() {
        let err = FetchRequest::parse(
            "2023-02-05T00:00:00",
            "2023-02-05T01:00:00",
            195,
            Cadence::hours(1).unwrap(),
            None,
        )
        .unwrap_err();
        assert_matches!(err, PiperError::InvalidWavelength(195));
    }
}
