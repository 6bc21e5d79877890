use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use clap_num::maybe_hex;
use sdp_core::protocol::STATUS_CODE_OK;
use sdp_core::{
    BoardProfile, BoardScript, HidTransport, NusbHidTransport, SdpSession, SessionConfig,
    StdPlatform, hex_dump,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "i.MX50 Serial Download Protocol Tool", long_about = None)]
struct Args {
    /// Verbose logging (-v debug, -vv trace with report dumps)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Session configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Run a built-in board bring-up first (kindle-mddr)
    #[arg(long, global = true)]
    init: Option<BoardProfile>,

    /// Run a bring-up script (TOML) first
    #[arg(long, global = true, conflicts_with = "init")]
    init_script: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read device memory
    Read {
        #[arg(value_parser=maybe_hex::<u32>)]
        address: u32,
        #[arg(value_parser=maybe_hex::<u32>)]
        count: u32,
        /// Write the data to a file instead of dumping it
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Hex dump to stdout even when writing a file
        #[arg(long)]
        hex: bool,
    },
    /// Load a file into device memory
    Write {
        #[arg(value_parser=maybe_hex::<u32>)]
        address: u32,
        file: PathBuf,
        /// Jump to the image once loaded
        #[arg(long)]
        jump: bool,
        /// Jump straight to the address without injecting an IVT header
        #[arg(long)]
        no_header: bool,
    },
    /// Jump to an image already in memory
    Jump {
        #[arg(value_parser=maybe_hex::<u32>)]
        address: u32,
        #[arg(long)]
        no_header: bool,
    },
    /// Read or write a register
    Reg {
        #[arg(value_parser=maybe_hex::<u32>)]
        address: u32,
        /// Value to write; reads the register when omitted
        #[arg(value_parser=maybe_hex::<u32>)]
        value: Option<u32>,
        /// Register width in bits
        #[arg(long, default_value_t = 32, value_parser = parse_format)]
        format: u8,
    },
    /// Show the ROM's error status
    Status,
    /// Only run the board bring-up
    Init,
}

fn parse_format(s: &str) -> Result<u8, String> {
    match s {
        "8" => Ok(8),
        "16" => Ok(16),
        "32" => Ok(32),
        _ => Err(format!("unsupported register width '{}' (8, 16 or 32)", s)),
    }
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    // Parse the script before waiting on hardware so typos fail fast.
    let script = args
        .init_script
        .as_ref()
        .map(|path| {
            BoardScript::load_from_file(path)
                .with_context(|| format!("loading bring-up script {}", path.display()))
        })
        .transpose()?;

    info!(
        vid = %format!("{:04X}", config.vid),
        pid = %format!("{:04X}", config.pid),
        "Starting SDP tool (nusb backend)..."
    );
    let transport = NusbHidTransport::wait_for_device(
        config.vid,
        config.pid,
        config.poll_interval(),
        config.discovery_timeout(),
        &StdPlatform,
    )?;
    let session = SdpSession::new(transport).configure(&config);

    match (&script, args.init) {
        (Some(script), _) => session.run_script(script)?,
        (None, Some(profile)) => session.bring_up(profile)?,
        (None, None) if matches!(args.command, Command::Init) => {
            session.bring_up(BoardProfile::KindleMddr)?
        }
        (None, None) => {}
    }

    execute(&session, args.command)
}

fn execute<T: HidTransport>(session: &SdpSession<T>, command: Command) -> Result<()> {
    match command {
        Command::Read {
            address,
            count,
            output,
            hex,
        } => {
            let data = session.read_memory(address, count as usize)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &data)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), bytes = data.len(), "Memory saved");
                    if hex {
                        print!("{}", hex_dump(&data, 0x10));
                    }
                }
                None => print!("{}", hex_dump(&data, 0x10)),
            }
        }
        Command::Write {
            address,
            file,
            jump,
            no_header,
        } => {
            let written = session.load_image(address, &file)?;
            info!(bytes = written, "Image loaded");
            if jump {
                session.boot(address, !no_header)?;
            }
        }
        Command::Jump { address, no_header } => {
            session.boot(address, !no_header)?;
        }
        Command::Reg {
            address,
            value: Some(value),
            format,
        } => {
            session.write_register(address, value, format)?;
            info!(address = %format!("0x{:08X}", address), value = %format!("0x{:08X}", value), "Register written");
        }
        Command::Reg {
            address,
            value: None,
            format,
        } => {
            let width = usize::from(format / 8);
            let bytes = session.read_memory(address, width)?;
            let value = bytes
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            println!("0x{:08X}: 0x{:0w$X}", address, value, w = width * 2);
        }
        Command::Status => {
            let status = session.error_status()?;
            let note = if status == STATUS_CODE_OK { " (OK)" } else { "" };
            println!("Status: 0x{:08X}{}", status, note);
        }
        Command::Init => info!("Bring-up complete"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_write_with_hex_address() {
        let args = Args::try_parse_from([
            "sdp", "-vv", "--init", "kindle-mddr", "write", "0x70800000", "uImage", "--jump",
        ])
        .unwrap();

        assert_eq!(args.verbose, 2);
        assert_eq!(args.init, Some(BoardProfile::KindleMddr));
        match args.command {
            Command::Write {
                address,
                jump,
                no_header,
                ..
            } => {
                assert_eq!(address, 0x7080_0000);
                assert!(jump);
                assert!(!no_header);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_reg_format_validation() {
        assert!(Args::try_parse_from(["sdp", "reg", "0x53FD400C", "--format", "16"]).is_ok());
        assert!(Args::try_parse_from(["sdp", "reg", "0x53FD400C", "--format", "12"]).is_err());
    }

    #[test]
    fn test_init_options_conflict() {
        let result = Args::try_parse_from([
            "sdp",
            "--init",
            "kindle-mddr",
            "--init-script",
            "board.toml",
            "init",
        ]);
        assert!(result.is_err());
    }
}
