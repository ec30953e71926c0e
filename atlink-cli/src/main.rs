//! atlink CLI - Command-line tool for AT-command feature phones.
//!
//! ## Features
//!
//! - List, upload, download and delete stored objects
//! - Read, send and delete SMS
//! - Manage alarms, calls, ringer volume and the SIM PIN
//! - Run scripted AT command files
//! - Built-in simulated handset (`--fake`)
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::{Context, Result};
use atlink::error::codes;
use atlink::port::{DataBits, FlowControl, Parity, StopBits};
use atlink::{
    Category, Channel, ConnectionParams, ExchangeConfig, FakePhone, NativePort, Outcome,
    Transfer,
};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler, polled by the library.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;
mod config;

use commands::{Failed, Session};
use config::Config;

/// Default baud rate when neither flags nor config set one.
const DEFAULT_BAUD: u32 = 115_200;

/// atlink - Manage files, SMS and alarms on AT-command feature phones.
///
/// Environment variables:
///   ATLINK_PORT           - Default serial port
///   ATLINK_BAUD           - Default baud rate (default: 115200)
///   ATLINK_DATA_BITS      - Data bits (5-8)
///   ATLINK_STOP_BITS      - Stop bits (1, 1.5, 2)
///   ATLINK_PARITY         - Parity (none, even, odd, space, mark)
///   ATLINK_FLOW_CONTROL   - Flow control (none, soft, hard, soft+hard)
#[derive(Parser)]
#[command(name = "atlink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Serial port the phone is attached to.
    #[arg(short, long, global = true, env = "ATLINK_PORT")]
    port: Option<String>,

    /// Baud rate [default: 115200].
    #[arg(short, long, global = true, env = "ATLINK_BAUD")]
    baud: Option<u32>,

    /// Data bits (5-8) [default: 8].
    #[arg(long, global = true, env = "ATLINK_DATA_BITS")]
    data_bits: Option<u8>,

    /// Stop bits (1, 1.5, 2) [default: 1].
    #[arg(long, global = true, env = "ATLINK_STOP_BITS")]
    stop_bits: Option<String>,

    /// Parity (none, even, odd, space, mark) [default: none].
    #[arg(long, global = true, env = "ATLINK_PARITY")]
    parity: Option<String>,

    /// Flow control (none, soft, hard, soft+hard) [default: none].
    #[arg(long, global = true, env = "ATLINK_FLOW_CONTROL")]
    flow_control: Option<String>,

    /// Talk to a built-in simulated phone instead of a serial port.
    #[arg(long, global = true)]
    fake: bool,

    /// Print results as JSON to stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Object categories as accepted on the command line.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CategoryArg {
    /// Wallpapers and photos.
    Pictures,
    /// Ring tones and sounds.
    Rings,
    /// vCards.
    Address,
    /// vCalendar events.
    Events,
    /// vCalendar to-dos.
    Tasks,
    /// Animated images and video clips.
    Animations,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Pictures => Self::Pictures,
            CategoryArg::Rings => Self::Rings,
            CategoryArg::Address => Self::Address,
            CategoryArg::Events => Self::Events,
            CategoryArg::Tasks => Self::Tasks,
            CategoryArg::Animations => Self::Animations,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the phone answers.
    Test,

    /// Show firmware, IMEI, numbers, signal and SIM state.
    Info,

    /// List stored objects (all categories if none given).
    List {
        /// Category to list.
        #[arg(value_enum)]
        category: Option<CategoryArg>,
    },

    /// Upload a file to the phone.
    Upload {
        /// File to upload; the extension decides the object type.
        file: PathBuf,
    },

    /// Download a stored object.
    Download {
        /// Object id as shown by `list`.
        id: String,

        /// Directory to write into [default: config or current directory].
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Delete a stored object.
    Delete {
        /// Object id as shown by `list`.
        id: String,
    },

    /// Dial a number.
    Dial {
        /// Number to call.
        number: String,
    },

    /// Hang up the current call.
    Hangup,

    /// Answer an incoming call.
    Answer,

    /// Show or set the ringer volume.
    Volume {
        /// New level (0-5); omit to read the current level.
        level: Option<u8>,
    },

    /// List alarm slots.
    Alarms,

    /// Add an alarm.
    AlarmAdd {
        /// Time of day (HH:MM or HH:MM:SS).
        time: String,

        /// Ring once on this date (YYYY-MM-DD).
        #[arg(long, conflicts_with = "days")]
        date: Option<String>,

        /// Ring on these weekdays (comma-separated, 1 = Monday).
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,

        /// Alarm slot number.
        #[arg(long, default_value = "1")]
        slot: u32,
    },

    /// Delete an alarm slot.
    AlarmDelete {
        /// Alarm slot number.
        slot: u32,
    },

    /// List SMS messages.
    SmsList,

    /// Send an SMS.
    SmsSend {
        /// Recipient number.
        number: String,

        /// Message text.
        body: String,
    },

    /// Delete an SMS.
    SmsDelete {
        /// Message index as shown by `sms-list`.
        id: String,
    },

    /// Show the SIM lock state, or enter a PIN.
    Pin {
        /// PIN or PUK to enter.
        code: Option<String>,
    },

    /// Run the AT commands of a text file, one per line.
    Run {
        /// Command file (`#` starts a comment line).
        file: PathBuf,
    },

    /// Print a shell completion script.
    Completions {
        /// Shell type (detected from $SHELL if not specified).
        #[arg(value_enum)]
        shell: Option<Shell>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    init_logging(cli.verbose, cli.quiet);
    debug!(
        "atlink v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&cli, &err),
    }
}

/// Setup logging based on verbosity; `RUST_LOG` still wins.
fn init_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(verbose >= 2)
        .format_timestamp(if verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

/// Print the error and pick the exit status: the magnitude of the outcome
/// code for phone/transfer failures, 1 for everything else.
fn report(cli: &Cli, err: &anyhow::Error) -> ExitCode {
    let failed = err.downcast_ref::<Failed>();

    if cli.json {
        if let Some(failed) = failed {
            let outcome = Outcome {
                code: failed.code,
                response: None,
                error: Some(failed.to_string()),
            };
            if let Ok(text) = serde_json::to_string_pretty(&outcome) {
                println!("{text}");
            }
        }
    }

    eprintln!("{} {err:#}", style("Error:").red().bold());
    if let Some(detail) = failed.and_then(|f| f.detail.as_deref()) {
        eprintln!("  {}", style(detail).dim());
    }

    let status = failed.map_or(1, Failed::exit_status);
    ExitCode::from(status)
}

fn run(cli: &Cli) -> Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        return commands::completions::run(*shell);
    }

    ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;
    atlink::set_interrupt_checker(|| INTERRUPTED.load(Ordering::SeqCst));

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    let mut session = open_session(cli, &config)?;

    match &cli.command {
        Commands::Test => commands::device::test(&mut session),
        Commands::Info => commands::device::info(&mut session),
        Commands::List { category } => {
            commands::objects::list(&mut session, category.map(Category::from))
        },
        Commands::Upload { file } => commands::objects::upload(&mut session, file),
        Commands::Download { id, dir } => {
            let dir = dir
                .clone()
                .or_else(|| config.transfer.download_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            commands::objects::download(&mut session, id, &dir)
        },
        Commands::Delete { id } => commands::objects::delete(&mut session, id),
        Commands::Dial { number } => commands::device::dial(&mut session, number),
        Commands::Hangup => commands::device::hangup(&mut session),
        Commands::Answer => commands::device::answer(&mut session),
        Commands::Volume { level } => commands::device::volume(&mut session, *level),
        Commands::Alarms => commands::alarms::list(&mut session),
        Commands::AlarmAdd {
            time,
            date,
            days,
            slot,
        } => commands::alarms::add(&mut session, time, date.as_deref(), days, *slot),
        Commands::AlarmDelete { slot } => commands::alarms::delete(&mut session, *slot),
        Commands::SmsList => commands::messages::list(&mut session),
        Commands::SmsSend { number, body } => commands::messages::send(&mut session, number, body),
        Commands::SmsDelete { id } => commands::messages::delete(&mut session, id),
        Commands::Pin { code } => commands::device::pin(&mut session, code.as_deref()),
        Commands::Run { file } => commands::device::run_file(&mut session, file),
        Commands::Completions { shell } => commands::completions::run(*shell),
    }
}

/// Resolve connection settings (flags/env over config over defaults) and
/// pick the channel.
fn open_session(cli: &Cli, config: &Config) -> Result<Session> {
    let conn = &config.connection;

    let port = cli
        .port
        .clone()
        .or_else(|| conn.port.clone())
        .or_else(|| cli.fake.then(|| "fake".to_string()));
    let Some(port) = port else {
        return Err(Failed::new(
            codes::INVALID_PARAMETER,
            "No serial port given (use --port, ATLINK_PORT or the config file)",
        )
        .into());
    };
    let baud = cli.baud.or(conn.baud).unwrap_or(DEFAULT_BAUD);

    let data_bits = match cli.data_bits.or(conn.data_bits) {
        Some(bits) => DataBits::from_count(bits)
            .ok_or_else(|| invalid(format!("Invalid data bits: {bits}")))?,
        None => DataBits::default(),
    };
    let stop_bits = parse_setting(
        cli.stop_bits.as_deref().or(conn.stop_bits.as_deref()),
        StopBits::from_name,
        "stop bits",
    )?;
    let parity = parse_setting(
        cli.parity.as_deref().or(conn.parity.as_deref()),
        Parity::from_name,
        "parity",
    )?;
    let flow_control = parse_setting(
        cli.flow_control
            .as_deref()
            .or(conn.flow_control.as_deref()),
        FlowControl::from_name,
        "flow control",
    )?;

    let params = ConnectionParams::new(port.clone(), baud)
        .with_framing(data_bits, parity, stop_bits)
        .with_flow_control(flow_control);
    let mut transfer = Transfer::new(params).map_err(|e| Failed::from_error(&e))?;

    let channel: Box<dyn Channel> = if cli.fake {
        debug!("Using the simulated phone");
        transfer = transfer.with_exchange_config(ExchangeConfig {
            settle_delay: Duration::from_millis(5),
            poll_timeout: Duration::from_secs(1),
            ..ExchangeConfig::default()
        });
        Box::new(FakePhone::new())
    } else {
        debug!("Using serial port {port} at {baud} baud");
        Box::new(NativePort::new(port))
    };

    Ok(Session::new(transfer, channel, cli.json, cli.quiet))
}

fn parse_setting<T: Default>(
    value: Option<&str>,
    parse: fn(&str) -> Option<T>,
    what: &str,
) -> Result<T> {
    match value {
        Some(text) => parse(text).ok_or_else(|| invalid(format!("Invalid {what}: {text}"))),
        None => Ok(T::default()),
    }
}

fn invalid(message: String) -> anyhow::Error {
    Failed::new(codes::INVALID_PARAMETER, message).into()
}
