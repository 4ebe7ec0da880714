use std::time::Duration;

use clap::{Args, Subcommand};
use flarmlink_device::FlarmDevice;
use flarmlink_transport::{CancelToken, Port, PortConfig, StreamPort};

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod ping;
pub mod reset;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check whether the device answers in binary mode.
    Ping(PingArgs),
    /// Make the device leave binary mode and restart.
    Reset(ResetArgs),
    /// Send a single command frame.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, cancel: &CancelToken) -> CliResult<i32> {
    match command {
        Command::Ping(args) => ping::run(args, format, cancel),
        Command::Reset(args) => reset::run(args, format, cancel),
        Command::Send(args) => send::run(args, format, cancel),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the device.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Device address: host:port of a serial bridge, or a socket path with --unix.
    #[arg(env = "FLARMLINK_ADDR")]
    pub addr: String,
    /// Treat ADDR as a Unix domain socket path.
    #[arg(long)]
    pub unix: bool,
    /// Reply timeout (e.g. 500ms, 2s).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Ping first and only reset a device that answers.
    #[arg(long)]
    pub check: bool,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Message type, decimal or 0x-prefixed hex (e.g. 0x21).
    #[arg(long = "type", short = 't', value_parser = parse_message_type)]
    pub message_type: u8,
    /// Payload as hex bytes (e.g. "0500" or "05 00").
    #[arg(long)]
    pub data: Option<String>,
    /// Wait for the ACK or NACK and print it.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub type CliDevice = FlarmDevice<Box<dyn Port>>;

/// Connect to the device described by `link`, observing `cancel` while blocked.
pub fn open_device(link: &LinkArgs, cancel: &CancelToken) -> CliResult<CliDevice> {
    let config = PortConfig::default();
    let port: Box<dyn Port> = if link.unix {
        connect_unix(&link.addr, config, cancel)?
    } else {
        let port = StreamPort::connect_tcp(&link.addr, config)
            .map_err(|err| transport_error("connect failed", err))?;
        Box::new(port.with_cancel_token(cancel.clone()))
    };
    Ok(FlarmDevice::new(port))
}

#[cfg(unix)]
fn connect_unix(path: &str, config: PortConfig, cancel: &CancelToken) -> CliResult<Box<dyn Port>> {
    let port = StreamPort::connect_unix(path, config)
        .map_err(|err| transport_error("connect failed", err))?;
    Ok(Box::new(port.with_cancel_token(cancel.clone())))
}

#[cfg(not(unix))]
fn connect_unix(_path: &str, _config: PortConfig, _cancel: &CancelToken) -> CliResult<Box<dyn Port>> {
    Err(CliError::new(USAGE, "--unix is only supported on Unix platforms"))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

fn parse_message_type(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("expected a byte value, got {input:?}"))
}

/// Decode hex bytes, ignoring whitespace between pairs.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex payload has an odd number of digits"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}
