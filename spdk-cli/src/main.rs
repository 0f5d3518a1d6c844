use std::io;
use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use clap_complete::Shell;
use colored_json::{Color, ColorMode, Output, Paint};
use log::debug;
use serde_json::Value;
use spdk_client::SpdkClient;
use spdk_jsonrpc::{blocking, Address, Config, DEFAULT_SOCKET_PATH, DEFAULT_TIMEOUT};

mod bdev;
mod nvmf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Where and how to reach the daemon.
pub struct Context {
    address: Address,
    timeout: Duration,
}

impl Context {
    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let socket = require_str(matches, "socket")?;
        let address = socket
            .parse::<Address>()
            .with_context(|| format!("Invalid socket address '{socket}'"))?;
        let timeout = matches
            .get_one::<u64>("rpc-timeout")
            .copied()
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        Ok(Context { address, timeout })
    }

    fn connect(&self) -> Result<blocking::Client> {
        debug!("connecting to {}", self.address);
        let config = Config {
            default_timeout: self.timeout,
            ..Config::default()
        };
        blocking::Client::connect_with(&self.address, config)
            .with_context(|| format!("Failed to connect to '{}'", self.address))
    }

    pub fn client(&self) -> Result<SpdkClient> {
        Ok(SpdkClient::new(self.connect()?))
    }
}

pub(crate) fn get_str<'a>(m: &'a ArgMatches, id: &str) -> Option<&'a str> {
    m.get_one::<String>(id).map(String::as_str)
}

pub(crate) fn require_str<'a>(m: &'a ArgMatches, id: &str) -> Result<&'a str> {
    get_str(m, id).ok_or_else(|| anyhow!("missing argument '{}'", id))
}

fn should_colorize(matches: &ArgMatches, output: Output) -> bool {
    match get_str(matches, "color") {
        Some("on") => true,
        Some("off") => false,
        _ => ColorMode::should_colorize(output),
    }
}

fn print_json(value: &Value, should_colorize: bool) -> Result<()> {
    let color_mode = if should_colorize {
        ColorMode::On
    } else {
        ColorMode::Off
    };

    println!(
        "{}",
        colored_json::to_colored_json(value, color_mode)
            .map_err(|e| anyhow!("Failed to print json for '{value}': {e}"))?
    );
    Ok(())
}

fn spdk_call(ctx: &Context, method: &str, params: Option<&str>) -> Result<Value> {
    let params = match params {
        Some(params) => serde_json::from_str(params)
            .with_context(|| format!("Failed to parse JSON for '{params}'"))?,
        None => Value::Null,
    };

    let conn = ctx.connect()?;
    conn.send(method, &params)
        .with_context(|| format!("Failed to call method '{method}'"))
}

fn cli() -> Command {
    Command::new("spdk-cli")
        .version(VERSION)
        .about("Drive the SPDK target over its JSON-RPC socket")
        .arg(
            Arg::new("socket")
                .short('s')
                .long("socket")
                .value_name("ADDRESS")
                .env("SPDK_RPC_SOCKET")
                .default_value(DEFAULT_SOCKET_PATH)
                .help("address of the SPDK socket, PATH, unix:PATH or tcp:HOST:PORT"),
        )
        .arg(
            Arg::new("rpc-timeout")
                .long("rpc-timeout")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .help("time in seconds to wait for a reply"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("print debug"),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .value_parser(["on", "off", "auto"])
                .default_value("auto")
                .help("colorize output"),
        )
        .subcommand(bdev::bdev_command())
        .subcommand(bdev::aio_command())
        .subcommand(bdev::lvstore_command())
        .subcommand(bdev::lvol_command())
        .subcommand(bdev::raid_command())
        .subcommand(bdev::nvme_command())
        .subcommand(nvmf::command())
        .subcommand(
            Command::new("call")
                .about("Call a method")
                .long_about("Call METHOD on the SPDK target. PARAMS must be valid JSON.")
                .arg(Arg::new("METHOD").required(true))
                .arg(Arg::new("PARAMS").required(false)),
        )
        .subcommand(
            Command::new("completions")
                .about("Generates completion scripts for your shell")
                .arg(
                    Arg::new("SHELL")
                        .required(true)
                        .value_parser(value_parser!(Shell))
                        .help("The shell to generate the script for"),
                ),
        )
}

fn do_main(app: &mut Command, matches: &ArgMatches) -> Result<()> {
    // needs no daemon, so no valid address either
    if let Some(("completions", sub)) = matches.subcommand() {
        if let Some(shell) = sub.get_one::<Shell>("SHELL").copied() {
            clap_complete::generate(shell, app, "spdk-cli", &mut io::stdout());
        }
        return Ok(());
    }

    let ctx = Context::from_matches(matches)?;

    let value = match matches.subcommand() {
        Some(("call", sub)) => spdk_call(&ctx, require_str(sub, "METHOD")?, get_str(sub, "PARAMS"))?,
        Some(("bdev", sub)) => bdev::bdev(&ctx, sub)?,
        Some(("bdev-aio", sub)) => bdev::aio(&ctx, sub)?,
        Some(("bdev-lvstore", sub)) => bdev::lvstore(&ctx, sub)?,
        Some(("bdev-lvol", sub)) => bdev::lvol(&ctx, sub)?,
        Some(("bdev-raid", sub)) => bdev::raid(&ctx, sub)?,
        Some(("bdev-nvme", sub)) => bdev::nvme(&ctx, sub)?,
        Some(("nvmf", sub)) => nvmf::run(&ctx, sub)?,
        _ => {
            app.print_help().context("Couldn't print help")?;
            println!();
            return Ok(());
        }
    };

    print_json(&value, should_colorize(matches, Output::StdOut))
}

fn main() {
    let mut app = cli();
    let matches = app.clone().get_matches();
    let debug = matches.get_flag("debug");

    let level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = do_main(&mut app, &matches) {
        let red_bold: fn(w: &str) -> String = if should_colorize(&matches, Output::StdErr) {
            |w| w.paint(Color::Red.bold()).to_string()
        } else {
            |w| w.to_string()
        };

        if debug {
            eprintln!("{:?}", e);
        } else {
            eprintln!("{} {:#}", red_bold("Error:"), e);
        }
        std::process::exit(1);
    }
}
