use aia_piper::archive::{ArchiveClient, MedocHttpClient, RecordQuery};
use aia_piper::config::ResolvedConfig;
use aia_piper::domain::{Cadence, Wavelength, parse_timestamp};

#[test]
#[ignore]
fn list_real_records_for_one_hour() {
    let client = MedocHttpClient::new(&ResolvedConfig::default()).unwrap();
    let query = RecordQuery {
        from: parse_timestamp("2023-02-05T00:00:00.000").unwrap(),
        to: parse_timestamp("2023-02-05T01:00:00.000").unwrap(),
        wavelength: Wavelength::try_from(193).unwrap(),
        cadence: Some(Cadence::minutes(12).unwrap()),
        page: 1,
        limit: 300,
    };
    let records = client.query_records(&query).unwrap();
    assert!(!records.is_empty());
    assert!(records.iter().all(|record| record.get.starts_with("http")));
}

#[test]
#[ignore]
fn download_real_sample() {
    let client = MedocHttpClient::new(&ResolvedConfig::default()).unwrap();
    let timestamp = parse_timestamp("2023-02-05T00:00:00").unwrap();
    let mut buffer = Vec::new();
    let info = client
        .download_sample(&timestamp, Wavelength::try_from(193).unwrap(), &mut buffer)
        .unwrap();
    assert_eq!(info.bytes as usize, buffer.len());
    assert!(buffer.starts_with(b"SIMPLE"));
}
