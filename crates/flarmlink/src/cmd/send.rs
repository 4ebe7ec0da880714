use flarmlink_device::WaitOutcome;
use flarmlink_frame::MessageType;
use flarmlink_transport::CancelToken;

use crate::cmd::{open_device, parse_duration, parse_hex, SendArgs};
use crate::exit::{device_error, CliResult, FAILURE, SUCCESS, TIMEOUT};
use crate::output::{print_exchange, to_hex, ExchangeReport, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat, cancel: &CancelToken) -> CliResult<i32> {
    let timeout = parse_duration(&args.link.timeout)?;
    let payload = match &args.data {
        Some(data) => parse_hex(data)?,
        None => Vec::new(),
    };
    let message_type = MessageType::from_u8(args.message_type);
    let mut device = open_device(&args.link, cancel)?;

    let (sequence, outcome) = if args.wait {
        let sequence = device.sequence_number();
        let outcome = device
            .request(message_type, &payload, timeout)
            .map_err(|err| device_error("request failed", err))?;
        (sequence, Some(outcome))
    } else {
        let sequence = device
            .send(message_type, &payload, timeout)
            .map_err(|err| device_error("send failed", err))?;
        (sequence, None)
    };

    let (label, body, code) = describe(outcome);
    print_exchange(
        &ExchangeReport {
            addr: args.link.addr,
            message_type: message_type.to_string(),
            sequence,
            outcome: label,
            body: to_hex(&body),
            raw_body: body,
        },
        format,
    );
    Ok(code)
}

fn describe(outcome: Option<WaitOutcome>) -> (&'static str, Vec<u8>, i32) {
    let Some(outcome) = outcome else {
        return ("sent", Vec::new(), SUCCESS);
    };
    match outcome.into_reply() {
        Some(reply) if reply.message_type == MessageType::Ack => {
            ("ack", reply.body().to_vec(), SUCCESS)
        }
        Some(reply) => ("nack", reply.body().to_vec(), FAILURE),
        None => ("timeout", Vec::new(), TIMEOUT),
    }
}
