use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::domain::Wavelength;

/// Deterministic name for one sample; unique per (timestamp, wavelength).
pub fn sample_filename(timestamp: &NaiveDateTime, wavelength: Wavelength) -> String {
    format!(
        "aia_{}A_{}Z.fits",
        wavelength,
        timestamp.format("%Y%m%dT%H%M%S")
    )
}

fn content_disposition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"filename="?([^";]+)"?"#).expect("valid regex"))
}

/// Filename announced in a Content-Disposition header, with `:` made
/// filesystem friendly.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    content_disposition_re()
        .captures(header)
        .and_then(|caps| caps.get(1))
        .map(|name| sanitize_filename(&name.as_str().replace(':', "-")))
        .filter(|name| !name.is_empty())
}

pub fn filename_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .map(|segment| sanitize_filename(&segment.replace(':', "-")))
        .filter(|name| !name.is_empty())
}

/// Keeps a name inside the output directory: separators and control
/// characters become `_`, leading dots are dropped.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .trim()
        .chars()
        .map(|ch| {
            if ch == '/' || ch == '\\' || ch == '\0' || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();
    replaced.trim_start_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_timestamp;

    #[test]
    fn sample_names_are_deterministic() {
        let ts = parse_timestamp("2023-02-05T01:00:00.000").unwrap();
        let wl = Wavelength::try_from(193).unwrap();
        assert_eq!(sample_filename(&ts, wl), "aia_193A_20230205T010000Z.fits");
        assert_eq!(sample_filename(&ts, wl), sample_filename(&ts, wl));

        let other = Wavelength::try_from(171).unwrap();
        assert_ne!(sample_filename(&ts, wl), sample_filename(&ts, other));
    }

    #[test]
    fn disposition_quoted_and_bare() {
        assert_eq!(
            filename_from_disposition(
                r#"attachment; filename="aia.lev1.193A_2023-02-05T00:00:04.84Z.image_lev1.fits""#
            )
            .as_deref(),
            Some("aia.lev1.193A_2023-02-05T00-00-04.84Z.image_lev1.fits")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename=file.fits; size=10").as_deref(),
            Some("file.fits")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[test]
    fn disposition_cannot_escape_directory() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="../../etc/passwd""#).as_deref(),
            Some("_.._etc_passwd")
        );
    }

    #[test]
    fn url_fallback_uses_last_segment() {
        assert_eq!(
            filename_from_url("https://example.org/get/sdo/aia/12345.fits?token=x").as_deref(),
            Some("12345.fits")
        );
        assert_eq!(filename_from_url("https://example.org/get/"), None);
    }
}
