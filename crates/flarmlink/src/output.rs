use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PingReport {
    pub addr: String,
    pub sequence: u16,
    pub alive: bool,
    pub latency_ms: Option<f64>,
}

/// Result of one command frame sent to the device.
#[derive(Debug, Serialize)]
pub struct ExchangeReport {
    pub addr: String,
    pub message_type: String,
    pub sequence: u16,
    /// `ack`, `nack`, `timeout`, or `sent` when no reply was awaited.
    pub outcome: &'static str,
    pub body: String,
    #[serde(skip)]
    pub raw_body: Vec<u8>,
}

pub fn print_ping(report: &PingReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "SEQ", "STATUS", "LATENCY"])
                .add_row(vec![
                    report.addr.clone(),
                    report.sequence.to_string(),
                    status(report.alive).to_string(),
                    latency(report.latency_ms),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{}: {} (seq={}, latency={})",
                report.addr,
                status(report.alive),
                report.sequence,
                latency(report.latency_ms)
            );
        }
        OutputFormat::Raw => {
            println!("{}", if report.alive { "1" } else { "0" });
        }
    }
}

pub fn print_exchange(report: &ExchangeReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "TYPE", "SEQ", "OUTCOME", "BODY"])
                .add_row(vec![
                    report.addr.clone(),
                    report.message_type.clone(),
                    report.sequence.to_string(),
                    report.outcome.to_string(),
                    report.body.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} seq={} -> {} body={}",
                report.message_type, report.sequence, report.outcome, report.body
            );
        }
        OutputFormat::Raw => print_raw(&report.raw_body),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lowercase hex without separators.
pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn status(alive: bool) -> &'static str {
    if alive {
        "alive"
    } else {
        "no response"
    }
}

fn latency(latency_ms: Option<f64>) -> String {
    match latency_ms {
        Some(ms) => format!("{ms:.2}ms"),
        None => "-".to_string(),
    }
}
