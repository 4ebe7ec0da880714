use std::time::Instant;

use flarmlink_transport::CancelToken;

use crate::cmd::{open_device, parse_duration, PingArgs};
use crate::exit::{device_error, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_ping, OutputFormat, PingReport};

pub fn run(args: PingArgs, format: OutputFormat, cancel: &CancelToken) -> CliResult<i32> {
    let timeout = parse_duration(&args.link.timeout)?;
    let mut device = open_device(&args.link, cancel)?;

    let sequence = device.sequence_number();
    let started = Instant::now();
    let alive = device
        .ping(timeout)
        .map_err(|err| device_error("ping failed", err))?;
    let latency_ms =
        alive.then(|| (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0);

    tracing::debug!(alive, ?latency_ms, "ping finished");
    print_ping(
        &PingReport {
            addr: args.link.addr,
            sequence,
            alive,
            latency_ms,
        },
        format,
    );

    Ok(if alive { SUCCESS } else { TIMEOUT })
}
