#![deny(clippy::unwrap_used)]

use clap::{arg, command, value_parser, ArgMatches};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;
use tracing::Level;

use xdm1041ctrl::proto::command::{
    CapacitanceRange, Configure, CurrentAcRange, CurrentDcRange, Function, Rate, ResistanceRange,
    VoltageAcRange, VoltageDcRange,
};
use xdm1041ctrl::proto::conv::pretty_value;
use xdm1041ctrl::proto::serial::DEFAULT_READ_TIMEOUT;
use xdm1041ctrl::proto::{ProtoError, Result};
use xdm1041ctrl::{Device, DEFAULT_BAUDRATE, DEFAULT_TTY};

fn configure_command() -> clap::Command {
    let mut cmd = clap::Command::new("configure")
        .about("Select measurement function and range")
        .subcommand_required(true);
    for function in Function::ALL {
        let range = arg!(<range> "Range, AUTO or full scale value");
        let range = match function {
            Function::VoltageDc => range.value_parser(value_parser!(VoltageDcRange)),
            Function::VoltageAc => range.value_parser(value_parser!(VoltageAcRange)),
            Function::CurrentDc => range.value_parser(value_parser!(CurrentDcRange)),
            Function::CurrentAc => range.value_parser(value_parser!(CurrentAcRange)),
            Function::Resistance => range.value_parser(value_parser!(ResistanceRange)),
            Function::Capacitance => range.value_parser(value_parser!(CapacitanceRange)),
        };
        let name = clap::ValueEnum::to_possible_value(&function)
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        cmd = cmd.subcommand(
            clap::Command::new(name)
                .about(format!("Range in {}", function.unit()))
                .arg(range),
        );
    }
    cmd
}

#[tokio::main]
async fn main() {
    let matches = command!() // requires `cargo` feature
        .arg(
            arg!(
                -p --device <PORT> "Port for USB adapter"
            )
            .default_value(DEFAULT_TTY)
            .required(false)
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(
            -d --debug ... "Turn debugging information on"
        ))
        .arg(
            arg!(
                -b --baudrate <BAUDRATE> "Baudrate"
            )
            .default_value(DEFAULT_BAUDRATE.to_string())
            .value_parser(value_parser!(u32)),
        )
        .arg(
            arg!(
                -t --timeout <MS> "Read timeout in milliseconds"
            )
            .default_value(DEFAULT_READ_TIMEOUT.as_millis().to_string())
            .value_parser(value_parser!(u64)),
        )
        .subcommand(clap::Command::new("ident").about("Device identification"))
        .subcommand(
            clap::Command::new("rate")
                .about("Measurement rate")
                .arg(arg!([rate] "Set measurement rate").value_parser(value_parser!(Rate))),
        )
        .subcommand(clap::Command::new("range").about("Query current range"))
        .subcommand(configure_command())
        .subcommand(clap::Command::new("measure").about("Read value in current function"))
        .subcommand(
            clap::Command::new("power")
                .about("Measure DC current and voltage, print power")
                .arg(
                    arg!(-n --count <COUNT> "Number of measurements")
                        .default_value("1")
                        .value_parser(value_parser!(u32)),
                )
                .arg(arg!(--json "Print each measurement as a JSON line")),
        )
        .subcommand(clap::Command::new("local").about("Return to front panel control"))
        .subcommand(clap::Command::new("remote").about("Lock front panel, remote control"))
        .subcommand_required(true)
        .get_matches();

    let level = match matches.get_count("debug") {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = handle_args(&matches).await {
        let port = matches
            .get_one::<PathBuf>("device")
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        match e {
            ProtoError::Serial(err) => {
                if err.kind() == tokio_serial::ErrorKind::NoDevice
                    || matches!(err.kind(), tokio_serial::ErrorKind::Io(ErrorKind::NotFound))
                {
                    eprintln!("{}: File not found", port);
                } else {
                    eprintln!("I/O Error: {} [device: {}]", err, port);
                }
            }
            ProtoError::Io(err) => {
                if err.kind() == ErrorKind::NotFound {
                    eprintln!("{}: File not found", port);
                } else {
                    eprintln!("I/O Error: {} [device: {}]", err, port);
                }
            }
            ProtoError::Parse { reply } => {
                eprintln!("Unable to interpret device reply {:?}, aborting!", reply);
            }
            ProtoError::NoReply => {
                eprintln!("Device did not answer, aborting!");
            }
            err @ ProtoError::SequenceAbort { .. } => {
                eprintln!("{}", err);
            }
        }
        exit(-1);
    }
}

fn configuration(args: &ArgMatches) -> Option<Configure> {
    match args.subcommand() {
        Some(("volt-dc", a)) => a
            .get_one::<VoltageDcRange>("range")
            .map(|r| Configure::VoltageDc(*r)),
        Some(("volt-ac", a)) => a
            .get_one::<VoltageAcRange>("range")
            .map(|r| Configure::VoltageAc(*r)),
        Some(("curr-dc", a)) => a
            .get_one::<CurrentDcRange>("range")
            .map(|r| Configure::CurrentDc(*r)),
        Some(("curr-ac", a)) => a
            .get_one::<CurrentAcRange>("range")
            .map(|r| Configure::CurrentAc(*r)),
        Some(("res", a)) => a
            .get_one::<ResistanceRange>("range")
            .map(|r| Configure::Resistance(*r)),
        Some(("cap", a)) => a
            .get_one::<CapacitanceRange>("range")
            .map(|r| Configure::Capacitance(*r)),
        _ => None,
    }
}

async fn handle_args(matches: &ArgMatches) -> Result<()> {
    let baud_rate = matches
        .get_one::<u32>("baudrate")
        .unwrap_or(&DEFAULT_BAUDRATE);
    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or(DEFAULT_READ_TIMEOUT);

    if let Some(port_path) = matches.get_one::<PathBuf>("device") {
        let mut device =
            Device::with_read_timeout(port_path.to_string_lossy(), *baud_rate, timeout).await?;

        eprintln!("Connected to: {}\n", port_path.display());

        match matches.subcommand() {
            // Device ID
            Some(("ident", _args)) => match device.ident() {
                Ok(ident) => {
                    println!("Manufacturer: {}", ident.manufacturer);
                    println!("Model: {}", ident.model);
                    println!("Serial: {}", ident.serial);
                    println!("Firmware: {}", ident.firmware);
                }
                Err(_) => println!("Identity: {}", device.identity()),
            },
            // Measurement rate
            Some(("rate", args)) => {
                if let Some(rate) = args.get_one::<Rate>("rate") {
                    device.set_rate(*rate).await?;
                    println!("OK");
                } else {
                    println!("Rate: {}", device.rate_query().await?);
                }
            }
            Some(("range", _args)) => {
                let range = device.range_query().await?;
                if range.is_empty() {
                    println!("Range: NO_DATA");
                } else {
                    println!("Range: {}", range);
                }
            }
            Some(("configure", args)) => {
                if let Some(cfg) = configuration(args) {
                    device.configure(cfg).await?;
                    println!("OK");
                }
            }
            Some(("measure", _args)) => {
                let value = device.read_value().await?;
                match device.configuration() {
                    Some(cfg) => println!("{}", pretty_value(value, cfg.function().unit())),
                    None => println!("{}", value),
                }
            }
            Some(("power", args)) => {
                let count = args.get_one::<u32>("count").copied().unwrap_or(1);
                for _ in 0..count {
                    let mea = device.measure_dc().await?;
                    if args.get_flag("json") {
                        match serde_json::to_string(&mea) {
                            Ok(json) => println!("{}", json),
                            Err(err) => eprintln!("Unable to encode measurement: {}", err),
                        }
                    } else {
                        println!("{}", mea);
                    }
                }
            }
            Some(("local", _args)) => {
                device.set_local().await?;
                println!("OK");
            }
            Some(("remote", _args)) => {
                device.set_remote().await?;
                println!("OK");
            }
            _ => {}
        }
    }

    Ok(())
}
