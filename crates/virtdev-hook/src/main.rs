//! virtdev-hook - Hook-side access to the domain description
//!
//! Reads the domain XML handed to a hook, locates devices in it and resolves
//! them against the host agent's device list.

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;
use virtdev_core::xml::indent;
use virtdev_core::{Device, DeviceConf, DomXmlChannel, Element, HwClass};

use commands::DiskKey;
use config::Config;

/// Exit status hooks use to report failure
const HOOK_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "virtdev-hook")]
#[command(about = "Inspect and locate devices in a hook's domain XML")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "virtdev-hook.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the normalized domain XML
    Show,
    /// Print the device element with the given alias
    FindDevice {
        #[arg(long)]
        alias: String,
    },
    /// Print the disk element with the given serial or alias
    FindDisk(DiskArgs),
    /// Map every disk element to a host drive
    ResolveDisks {
        /// JSON list of devices (defaults to the JSON hand-off file)
        #[arg(long)]
        devices: Option<PathBuf>,
    },
    /// Print the configuration record of a device
    Conf {
        /// JSON list of configuration records
        #[arg(long)]
        file: PathBuf,
        /// Hardware class (disk, interface, memory, sound, ...)
        #[arg(long)]
        class: HwClass,
        #[arg(long)]
        alias: String,
    },
    /// Rewrite the domain XML in normalized form
    Normalize,
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
struct DiskArgs {
    #[arg(long)]
    serial: Option<String>,
    #[arg(long)]
    alias: Option<String>,
}

impl DiskArgs {
    fn key(self) -> Option<DiskKey> {
        match (self.serial, self.alias) {
            (Some(serial), _) => Some(DiskKey::Serial(serial)),
            (None, Some(alias)) => Some(DiskKey::Alias(alias)),
            (None, None) => None,
        }
    }
}

fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    // stdout carries command output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn read_domain(config: &Config) -> Result<(DomXmlChannel, Element)> {
    let channel = config.domxml_channel()?;
    debug!(path = %channel.path().display(), "Using domain XML channel");
    let domain = channel.read_domxml()?;
    Ok((channel, domain))
}

fn run(args: Args) -> Result<()> {
    let config = config::load_config(&args.config)?;

    match args.command {
        Command::Show => {
            let (_, domain) = read_domain(&config)?;
            println!("{}", commands::show(&domain)?);
        }
        Command::FindDevice { alias } => {
            let (_, domain) = read_domain(&config)?;
            println!("{}", commands::find_device(&domain, &alias)?);
        }
        Command::FindDisk(disk) => {
            let key = disk.key().context("either --serial or --alias is required")?;
            let (_, domain) = read_domain(&config)?;
            println!("{}", commands::find_disk(&domain, &key)?);
        }
        Command::ResolveDisks { devices } => {
            let (_, domain) = read_domain(&config)?;
            let devices: Vec<Device> = match devices {
                Some(path) => read_json_file(&path)?,
                None => config.json_channel()?.read_json()?,
            };
            for line in commands::resolve_disks(&domain, &devices) {
                println!("{}", line);
            }
        }
        Command::Conf { file, class, alias } => {
            let records: Vec<DeviceConf> = read_json_file(&file)?;
            println!("{}", commands::conf(&records, class, &alias)?);
        }
        Command::Normalize => {
            let (channel, mut domain) = read_domain(&config)?;
            indent(&mut domain, 0);
            channel.write_domxml(&domain)?;
            info!(path = %channel.path().display(), "Normalized domain XML");
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("virtdev-hook: {:#}", e);
            ExitCode::from(HOOK_FAILURE)
        }
    }
}
