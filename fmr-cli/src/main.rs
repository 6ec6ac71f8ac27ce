use anyhow::Result;
use clap::{Parser, Subcommand};
use fmr_cli::commands::{self, FollowUp};
use fmr_cli::connect::connect;
use fmr_cli::typed_arg::{parse_args, parse_ret};
use fmr_cli::{Connection, Target};
use fmr_client::{Host, SerialEndpoint};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fmr", author, version, about = "Talk to FMR devices", long_about = None)]
struct Cli {
    /// Serial port of the device; the in-process virtual device is used when absent
    #[arg(short, long, global = true)]
    serial: Option<String>,

    #[arg(long, default_value_t = 115_200, global = true)]
    baud: u32,

    /// JSON runtime configuration for the virtual device
    #[arg(long, global = true)]
    device_config: Option<PathBuf>,

    /// Increase logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the device configuration
    Info,

    /// Ping the device
    Ping,

    /// Call `module.function`, e.g. `sys.ping`, `0.2` or `gpio.1`
    Invoke {
        target: String,

        /// Return type: int8, int16, int32 or ptr
        #[arg(short, long, default_value = "int32")]
        ret: String,

        /// Arguments as type:value, e.g. u8:5 ptr:0x20000000
        args: Vec<String>,
    },

    /// Install an image on the device
    Load {
        file: PathBuf,

        /// Call this function of the loaded module afterwards
        #[arg(long)]
        call: Option<u8>,

        #[arg(short, long, default_value = "int32")]
        ret: String,

        args: Vec<String>,
    },

    /// List serial ports
    Ports,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn print<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Ports = cli.command {
        return print(&SerialEndpoint::available()?);
    }

    let connection = match cli.serial {
        Some(port) => Connection::Serial {
            port,
            baud_rate: cli.baud,
        },
        None => Connection::Virtual {
            config: cli.device_config,
        },
    };
    let mut host = Host::new();
    connect(&mut host, &connection)?;

    match cli.command {
        Commands::Info => print(&commands::info(&mut host)?),
        Commands::Ping => print(&commands::ping(&mut host)?),
        Commands::Invoke { target, ret, args } => {
            let target = Target::parse(&target)?;
            let report = commands::invoke(&mut host, &target, parse_ret(&ret)?, parse_args(&args)?)?;
            print(&report)
        }
        Commands::Load {
            file,
            call,
            ret,
            args,
        } => {
            let follow_up = match call {
                Some(function) => Some(FollowUp {
                    function,
                    ret: parse_ret(&ret)?,
                    args: parse_args(&args)?,
                }),
                None => None,
            };
            print(&commands::load(&mut host, &file, follow_up)?)
        }
        Commands::Ports => Ok(()),
    }
}
