use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use flate2::read::GzDecoder;
use reqwest::blocking::{Client, Response};
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, CONTENT_DISPOSITION, CONTENT_ENCODING, HeaderMap, HeaderName,
    HeaderValue, USER_AGENT,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ResolvedConfig;
use crate::domain::{Cadence, Wavelength, format_archive_time, parse_timestamp};
use crate::error::PiperError;
use crate::naming::{filename_from_disposition, filename_from_url};

/// One row of the MEDOC records listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    #[serde(rename = "date__obs", default)]
    pub date_obs: Option<String>,
    pub get: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArchiveRecord {
    pub fn observed_at(&self) -> Option<NaiveDateTime> {
        self.date_obs
            .as_deref()
            .and_then(|value| parse_timestamp(value).ok())
    }
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<ArchiveRecord>,
}

#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub wavelength: Wavelength,
    pub cadence: Option<Cadence>,
    pub page: u32,
    pub limit: u32,
}

impl RecordQuery {
    /// Query string pairs in the order the archive's web UI sends them.
    pub fn params(&self, cache_buster: i64) -> Vec<(String, String)> {
        let mut params = vec![
            ("_dc".to_string(), cache_buster.to_string()),
            ("nocount".to_string(), "false".to_string()),
            (
                "p[0]".to_string(),
                format!(
                    "DATE_BETWEEN|date__obs|{}|{}",
                    format_archive_time(&self.from),
                    format_archive_time(&self.to)
                ),
            ),
        ];
        if let Some(cadence) = &self.cadence {
            params.push((
                "p[1]".to_string(),
                format!("CADENCE|mask_cadence|{}", cadence.archive_mask()),
            ));
        }
        params.push((
            "p[2]".to_string(),
            format!("LISTBOXMULTIPLE|wavelnth|{}", self.wavelength),
        ));
        let page = self.page.max(1);
        params.push(("page".to_string(), page.to_string()));
        params.push((
            "start".to_string(),
            (u64::from(page - 1) * u64::from(self.limit)).to_string(),
        ));
        params.push(("limit".to_string(), self.limit.to_string()));
        params
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadInfo {
    pub source_url: String,
    pub archive_filename: Option<String>,
    pub observed_at: Option<NaiveDateTime>,
    pub bytes: u64,
}

pub trait ArchiveClient: Send + Sync {
    fn query_records(&self, query: &RecordQuery) -> Result<Vec<ArchiveRecord>, PiperError>;

    /// Streams the record nearest `timestamp` into `writer`.
    fn download_sample(
        &self,
        timestamp: &NaiveDateTime,
        wavelength: Wavelength,
        writer: &mut dyn Write,
    ) -> Result<DownloadInfo, PiperError>;
}

/// Record whose observation time is closest to `target`; records without a
/// parseable `date__obs` only win when nothing else is available.
pub fn nearest_record<'a>(
    records: &'a [ArchiveRecord],
    target: &NaiveDateTime,
) -> Option<&'a ArchiveRecord> {
    records
        .iter()
        .filter_map(|record| {
            record
                .observed_at()
                .map(|at| ((at - *target).abs(), record))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, record)| record)
        .or_else(|| records.first())
}

#[derive(Clone)]
pub struct MedocHttpClient {
    client: Client,
    base_url: String,
    query_timeout: Duration,
    max_retries: usize,
    match_tolerance: TimeDelta,
    page_limit: u32,
}

impl MedocHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, PiperError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|err| PiperError::ConfigInvalid(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.timeout)
            .timeout(config.download_timeout)
            .build()
            .map_err(|err| PiperError::ArchiveHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            query_timeout: config.timeout,
            max_retries: config.max_retries,
            match_tolerance: config.match_tolerance,
            page_limit: config.page_limit,
        })
    }

    fn handle_status(response: Response) -> Result<Response, PiperError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        if matches!(status, 401 | 403) {
            return Err(PiperError::ArchiveAccessDenied(status));
        }
        let message = response
            .text()
            .unwrap_or_else(|_| "archive request failed".to_string());
        Err(PiperError::ArchiveStatus { status, message })
    }

    fn is_gzip(response: &Response) -> bool {
        response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.eq_ignore_ascii_case("gzip"))
            .unwrap_or(false)
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<Response, PiperError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        tracing::warn!(status, attempt, "archive retry");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    if status == 503 {
                        return Err(PiperError::ArchiveUnreachable(format!(
                            "service unavailable after {} attempts",
                            attempt + 1
                        )));
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        tracing::warn!(error = %err, attempt, "archive retry");
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    if err.is_connect() {
                        return Err(PiperError::ArchiveUnreachable(err.to_string()));
                    }
                    return Err(PiperError::ArchiveHttp(err.to_string()));
                }
            }
        }
    }
}

impl ArchiveClient for MedocHttpClient {
    fn query_records(&self, query: &RecordQuery) -> Result<Vec<ArchiveRecord>, PiperError> {
        let params = query.params(Utc::now().timestamp_millis());
        tracing::debug!(url = %self.base_url, ?params, "archive.records");
        let response = self.send_with_retries(|| {
            self.client
                .get(&self.base_url)
                .query(&params)
                .timeout(self.query_timeout)
        })?;
        let response = Self::handle_status(response)?;
        let gzip = Self::is_gzip(&response);
        let bytes = response
            .bytes()
            .map_err(|err| PiperError::ArchiveHttp(err.to_string()))?;
        let parsed = if gzip {
            serde_json::from_reader::<_, RecordsResponse>(GzDecoder::new(bytes.as_ref()))
        } else {
            serde_json::from_slice::<RecordsResponse>(&bytes)
        };
        let parsed = parsed.map_err(|err| PiperError::ArchiveResponse(err.to_string()))?;

        if !parsed.success {
            return Err(PiperError::ArchiveResponse(
                "records query was not successful".to_string(),
            ));
        }
        Ok(parsed.data)
    }

    fn download_sample(
        &self,
        timestamp: &NaiveDateTime,
        wavelength: Wavelength,
        writer: &mut dyn Write,
    ) -> Result<DownloadInfo, PiperError> {
        let out_of_range = || PiperError::TimeOutOfRange(format_archive_time(timestamp));
        let query = RecordQuery {
            from: timestamp
                .checked_sub_signed(self.match_tolerance)
                .ok_or_else(out_of_range)?,
            to: timestamp
                .checked_add_signed(self.match_tolerance)
                .ok_or_else(out_of_range)?,
            wavelength,
            cadence: None,
            page: 1,
            limit: self.page_limit,
        };
        let records = self.query_records(&query)?;
        let record = nearest_record(&records, timestamp).ok_or_else(|| PiperError::NoRecord {
            timestamp: format_archive_time(timestamp),
            tolerance_secs: self.match_tolerance.num_seconds(),
        })?;

        tracing::debug!(url = %record.get, "archive.download");
        let response = self.send_with_retries(|| self.client.get(&record.get))?;
        let response = Self::handle_status(response)?;
        let archive_filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(&record.get));

        let mut body: Box<dyn Read> = if Self::is_gzip(&response) {
            Box::new(GzDecoder::new(response))
        } else {
            Box::new(response)
        };
        let bytes = copy_body(&mut body, writer)?;

        Ok(DownloadInfo {
            source_url: record.get.clone(),
            archive_filename,
            observed_at: record.observed_at(),
            bytes,
        })
    }
}

/// Streams `body` into `writer`. Read failures belong to the transfer,
/// write failures to the output directory.
pub fn copy_body(body: &mut dyn Read, writer: &mut dyn Write) -> Result<u64, PiperError> {
    let mut buffer = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(PiperError::ArchiveHttp(err.to_string())),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|err| PiperError::Filesystem(err.to_string()))?;
        total += read as u64;
    }
    writer
        .flush()
        .map_err(|err| PiperError::Filesystem(err.to_string()))?;
    Ok(total)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
