//! Fallback downloader for SDO/AIA images hosted by the IAS MEDOC archive.
//!
//! A time range is sampled at a fixed cadence (start inclusive, end inclusive
//! when it lands on a step) and one FITS file is fetched per sample:
//!
//! ```no_run
//! use aia_piper::domain::Cadence;
//!
//! let report = aia_piper::fetch(
//!     "2023-02-05T00:00:00.000",
//!     "2023-02-05T02:00:00.000",
//!     193,
//!     Cadence::hours(1)?,
//!     Some("aia_test"),
//! )?;
//! println!("{} of {} samples saved", report.succeeded(), report.results.len());
//! # Ok::<(), aia_piper::error::PiperError>(())
//! ```

pub mod archive;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod naming;
pub mod output;
pub mod progress;
pub mod request;

use crate::archive::MedocHttpClient;
use crate::config::ConfigLoader;
use crate::domain::Cadence;
use crate::error::PiperError;
use crate::fetch::{FetchOptions, FetchReport, Fetcher};
use crate::progress::TerminalProgress;
use crate::request::FetchRequest;

/// Fetches every sample between `start_date` and `end_date` using the
/// discovered config and a terminal progress bar.
pub fn fetch(
    start_date: &str,
    end_date: &str,
    wavelength: u32,
    cadence: Cadence,
    output_dir: Option<&str>,
) -> Result<FetchReport, PiperError> {
    let request = FetchRequest::parse(start_date, end_date, wavelength, cadence, output_dir)?;
    let config = ConfigLoader::resolve(None)?;
    let archive = MedocHttpClient::new(&config)?;
    let fetcher = Fetcher::new(archive, config);
    fetcher.fetch(
        &request,
        &FetchOptions::default(),
        &TerminalProgress::new("Downloading SDO files"),
    )
}
