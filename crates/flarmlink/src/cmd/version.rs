use flarmlink_frame::{PROTOCOL_VERSION, START_FRAME};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("flarmlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: flarmlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("FLARMLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("protocol_version: {PROTOCOL_VERSION}");
    println!("start_frame: {START_FRAME:#04x}");
    println!("unix_sockets: {}", cfg!(unix));

    Ok(SUCCESS)
}
