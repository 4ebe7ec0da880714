mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use flarmlink_transport::CancelToken;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "flarmlink", version, about = "FLARM binary protocol CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(err) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!(error = %err, "failed to install Ctrl-C handler");
    }

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, &cancel);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "flarmlink",
            "send",
            "127.0.0.1:4353",
            "--type",
            "0x21",
            "--data",
            "0500",
            "--wait",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.message_type, 0x21);
        assert!(args.wait);
        assert_eq!(args.link.timeout, "1s");
    }

    #[test]
    fn send_requires_a_type() {
        let err = Cli::try_parse_from(["flarmlink", "send", "127.0.0.1:4353"])
            .expect_err("missing --type should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_ping_with_unix_socket() {
        let cli = Cli::try_parse_from([
            "flarmlink",
            "--format",
            "json",
            "ping",
            "/run/flarm.sock",
            "--unix",
            "--timeout",
            "250ms",
        ])
        .expect("ping args should parse");

        let Command::Ping(args) = cli.command else {
            panic!("expected ping");
        };
        assert!(args.link.unix);
        assert_eq!(args.link.addr, "/run/flarm.sock");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn parses_reset_with_check() {
        let cli = Cli::try_parse_from(["flarmlink", "reset", "10.0.0.5:2000", "--check"])
            .expect("reset args should parse");
        assert!(matches!(cli.command, Command::Reset(ref args) if args.check));
    }
}
