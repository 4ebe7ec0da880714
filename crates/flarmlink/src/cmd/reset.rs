use flarmlink_frame::MessageType;
use flarmlink_transport::CancelToken;

use crate::cmd::{open_device, parse_duration, ResetArgs};
use crate::exit::{device_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_exchange, ExchangeReport, OutputFormat};

pub fn run(args: ResetArgs, format: OutputFormat, cancel: &CancelToken) -> CliResult<i32> {
    let timeout = parse_duration(&args.link.timeout)?;
    let mut device = open_device(&args.link, cancel)?;

    if args.check {
        let alive = device
            .ping(timeout)
            .map_err(|err| device_error("ping failed", err))?;
        if !alive {
            return Err(CliError::new(
                TIMEOUT,
                format!("{} did not answer in binary mode, not resetting", args.link.addr),
            ));
        }
    }

    let sequence = device.sequence_number();
    device
        .reset(timeout)
        .map_err(|err| device_error("reset failed", err))?;

    print_exchange(
        &ExchangeReport {
            addr: args.link.addr,
            message_type: MessageType::Exit.to_string(),
            sequence,
            outcome: "sent",
            body: String::new(),
            raw_body: Vec::new(),
        },
        format,
    );
    Ok(SUCCESS)
}
