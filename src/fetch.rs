use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::archive::{ArchiveClient, ArchiveRecord, RecordQuery};
use crate::config::ResolvedConfig;
use crate::domain::{NamingScheme, Wavelength};
use crate::error::PiperError;
use crate::naming::sample_filename;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::request::FetchRequest;

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub naming: NamingScheme,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub timestamp: NaiveDateTime,
    pub wavelength: Wavelength,
    pub success: bool,
    pub path: Option<String>,
    pub error: Option<String>,
    pub source_url: Option<String>,
    pub bytes: Option<u64>,
}

impl DownloadResult {
    fn failed(timestamp: NaiveDateTime, wavelength: Wavelength, reason: String) -> Self {
        Self {
            timestamp,
            wavelength,
            success: false,
            path: None,
            error: Some(reason),
            source_url: None,
            bytes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub output_dir: String,
    pub results: Vec<DownloadResult>,
}

impl FetchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|result| result.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Clone)]
pub struct Fetcher<A: ArchiveClient> {
    archive: A,
    config: ResolvedConfig,
}

impl<A: ArchiveClient> Fetcher<A> {
    pub fn new(archive: A, config: ResolvedConfig) -> Self {
        Self { archive, config }
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn output_dir_for(&self, request: &FetchRequest) -> Utf8PathBuf {
        request
            .output_dir()
            .cloned()
            .unwrap_or_else(|| self.config.output_dir.clone())
    }

    /// Issues one download per sample, in order. Per-sample failures land in
    /// the report; a fatal error stops the batch and is returned.
    pub fn fetch(
        &self,
        request: &FetchRequest,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchReport, PiperError> {
        let output_dir = self.output_dir_for(request);
        let total = request.sample_count();
        let wavelength = request.wavelength();

        if !options.dry_run {
            fs::create_dir_all(output_dir.as_std_path()).map_err(|err| {
                PiperError::Filesystem(format!("create {output_dir}: {err}"))
            })?;
        }

        tracing::info!(
            start = %request.start(),
            end = %request.end(),
            %wavelength,
            cadence = %request.cadence(),
            total,
            "fetch planned"
        );
        sink.event(ProgressEvent::Planned { total });

        let mut results: Vec<DownloadResult> = Vec::new();
        for sample in request.samples() {
            let result = if options.dry_run {
                let mut planned = DownloadResult::failed(
                    sample.timestamp,
                    wavelength,
                    "dry run".to_string(),
                );
                planned.path = Some(
                    output_dir
                        .join(sample_filename(&sample.timestamp, wavelength))
                        .to_string(),
                );
                planned
            } else {
                match self.fetch_sample(&sample.timestamp, wavelength, &output_dir, options) {
                    Ok(result) => result,
                    Err(err) if err.is_fatal() => {
                        tracing::error!(timestamp = %sample.timestamp, error = %err, "aborting fetch");
                        let succeeded = results.iter().filter(|result| result.success).count();
                        sink.event(ProgressEvent::Finished {
                            succeeded,
                            failed: results.len() - succeeded,
                        });
                        return Err(err);
                    }
                    Err(err) => {
                        tracing::warn!(timestamp = %sample.timestamp, error = %err, "sample failed");
                        DownloadResult::failed(sample.timestamp, wavelength, err.to_string())
                    }
                }
            };

            sink.event(ProgressEvent::Advanced {
                position: sample.index + 1,
                total,
                timestamp: sample.timestamp,
                success: result.success,
            });
            results.push(result);
        }

        let report = FetchReport {
            output_dir: output_dir.to_string(),
            results,
        };
        sink.event(ProgressEvent::Finished {
            succeeded: report.succeeded(),
            failed: report.failed(),
        });
        Ok(report)
    }

    fn fetch_sample(
        &self,
        timestamp: &NaiveDateTime,
        wavelength: Wavelength,
        output_dir: &Utf8Path,
        options: &FetchOptions,
    ) -> Result<DownloadResult, PiperError> {
        let mut temp = tempfile::Builder::new()
            .prefix(".aiapiper-")
            .suffix(".part")
            .tempfile_in(output_dir.as_std_path())
            .map_err(|err| PiperError::Filesystem(err.to_string()))?;

        let info = self
            .archive
            .download_sample(timestamp, wavelength, temp.as_file_mut())?;

        let filename = match options.naming {
            NamingScheme::Sample => sample_filename(timestamp, wavelength),
            NamingScheme::Archive => info
                .archive_filename
                .clone()
                .unwrap_or_else(|| sample_filename(timestamp, wavelength)),
        };
        let destination = output_dir.join(filename);
        temp.persist(destination.as_std_path())
            .map_err(|err| PiperError::Filesystem(format!("persist {destination}: {err}")))?;

        tracing::debug!(%timestamp, path = %destination, bytes = info.bytes, "sample saved");
        Ok(DownloadResult {
            timestamp: *timestamp,
            wavelength,
            success: true,
            path: Some(destination.to_string()),
            error: None,
            source_url: Some(info.source_url),
            bytes: Some(info.bytes),
        })
    }

    /// Lists archive records for the whole range using the archive's own
    /// cadence mask; nothing is downloaded.
    pub fn list(
        &self,
        request: &FetchRequest,
        page: u32,
        limit: Option<u32>,
    ) -> Result<Vec<ArchiveRecord>, PiperError> {
        let query = RecordQuery {
            from: request.start(),
            to: request.end(),
            wavelength: request.wavelength(),
            cadence: Some(request.cadence()),
            page,
            limit: limit.unwrap_or(self.config.page_limit),
        };
        self.archive.query_records(&query)
    }
}
