use std::io::{self, Write};

use serde::Serialize;

use crate::archive::ArchiveRecord;
use crate::fetch::FetchReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(report: &FetchReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_records(records: &[ArchiveRecord]) -> io::Result<()> {
        Self::print_json(&records)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

/// Human summary printed after an interactive fetch.
pub fn print_fetch_summary(report: &FetchReport) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let red = "\x1b[31m";
    let reset = "\x1b[0m";

    println!(
        "{green}downloaded {}/{} samples into {}{reset}",
        report.succeeded(),
        report.results.len(),
        report.output_dir
    );
    if report.failed() > 0 {
        println!("{yellow}{} samples failed:{reset}", report.failed());
    }
    for result in report.results.iter().filter(|result| !result.success) {
        println!(
            "{red}  {} {}{reset}",
            result.timestamp,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}
