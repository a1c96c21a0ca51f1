use getopts::{Fail, Matches, Options};
use rocket::tokio::sync::mpsc::{channel, Receiver, Sender};
use rocket::{Build, Rocket, Shutdown};
use server::analyzer::Analyzer;
use server::checks::{default_checks, read_check_table, CheckTableError};
use server::classifier::chat_completion::{ChatCompletionClassifier, ChatCompletionConfiguration};
use server::classifier::ClassifierError;
use server::constants::{
    CARGO_VERSION, DEFAULT_MAX_CONCURRENT_CHECKS, DEFAULT_MODEL, DEFAULT_PORT, ENV_LLM_API_KEY,
    VERSION,
};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use std::{env, process, thread};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use super::error_codes::ERROR_CHANNEL_SENDER_DROPPED;
use super::state::ServerState;
use super::utils::get_current_timestamp_ms;

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {} [options]", program);
    print!("{}", opts.usage(&brief));
}

fn get_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("p", "port", "port to run the server on", "8128");
    opts.optopt("a", "address", "address to listen on", "0.0.0.0");
    opts.optopt(
        "u",
        "llm-url",
        "base URL of a local LLM with an OpenAI-compatible API. Without it, no analysis is done",
        "http://localhost:11434",
    );
    opts.optopt("m", "model", "model used for classification", DEFAULT_MODEL);
    opts.optopt(
        "t",
        "llm-timeout",
        "seconds to wait for each classification before giving up on it",
        "30",
    );
    opts.optopt(
        "c",
        "max-concurrent-checks",
        "how many classification requests may run at the same time",
        "1",
    );
    opts.optopt(
        "f",
        "checks-file",
        "YAML file replacing the built-in checks",
        "/path/to/checks.yaml",
    );
    opts.optopt(
        "k",
        "keep-alive-timeout",
        "how many seconds without a request the server will exit",
        "90",
    );
    opts.optflag("e", "enable-shutdown", "enables the shutdown endpoint");
    opts.optflag("h", "help", "print this help");
    opts.optflag("v", "version", "shows the tool version");
    opts.optflag(
        "l",
        "logs",
        "Enables logs to a file. Usually /tmp/mcp-analysis-server/logs",
    );
    opts
}

fn get_log_dir() -> PathBuf {
    let mut log_dir = env::temp_dir();
    log_dir.push("mcp-analysis-server/logs");
    log_dir
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Error parsing arguments: {0:?}")]
    Parsing(#[from] Fail),
    #[error("Invalid port argument {0:?}. It must be a number.")]
    InvalidPort(String),
    #[error("Invalid address argument {0:?}.")]
    InvalidAddress(String),
    #[error("Invalid timeout argument {0:?}. It must be a positive number of seconds.")]
    InvalidTimeout(String),
    #[error("Invalid max concurrent checks argument {0:?}. It must be a positive number.")]
    InvalidConcurrency(String),
    #[error("Invalid checks file: {0}")]
    CheckTable(#[from] CheckTableError),
    #[error("Cannot create the classifier: {0}")]
    Classifier(#[from] ClassifierError),
}

impl CliError {
    /// Whether the error comes from what the user passed on the command line.
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(self, Self::Classifier(ClassifierError::Transport(_)))
    }
}

pub enum RocketPreparation {
    ServerInfo {
        rocket: Box<Rocket<Build>>,
        state: ServerState,
        tx_rocket_shutdown: Sender<Shutdown>,
        guard: Option<WorkerGuard>,
    },
    NoServerInteraction,
}

/// Builds the analyzer from the command line. Without `--llm-url`, the analyzer is disabled.
pub fn build_analyzer(matches: &Matches) -> Result<Analyzer, CliError> {
    let checks = match matches.opt_str("f") {
        Some(path) => read_check_table(Path::new(&path))?,
        None => default_checks(),
    };

    let max_concurrent_checks = match matches.opt_str("c") {
        Some(value) => match value.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => return Err(CliError::InvalidConcurrency(value)),
        },
        None => DEFAULT_MAX_CONCURRENT_CHECKS,
    };

    let timeout = match matches.opt_str("t") {
        Some(value) => match value.parse::<u64>() {
            Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => return Err(CliError::InvalidTimeout(value)),
        },
        None => None,
    };

    let Some(base_url) = matches.opt_str("u") else {
        tracing::warn!("No LLM URL configured, tool descriptions will not be analyzed");
        return Ok(Analyzer::disabled());
    };

    let configuration = ChatCompletionConfiguration {
        base_url,
        model: matches
            .opt_str("m")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        timeout,
        api_key: env::var(ENV_LLM_API_KEY).ok().filter(|key| !key.is_empty()),
    };
    let classifier = ChatCompletionClassifier::new(&configuration)?;

    tracing::info!(
        "Classifying with model {} at {} ({} checks, up to {} at a time)",
        configuration.model,
        classifier.url(),
        checks.len(),
        max_concurrent_checks
    );

    Ok(Analyzer::new(Arc::new(classifier), checks).with_max_concurrent_checks(max_concurrent_checks))
}

/// Builds the rocket configuration (address and port) from the command line.
pub fn rocket_configuration(matches: &Matches) -> Result<rocket::Config, CliError> {
    let mut rocket_configuration = rocket::Config {
        address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        port: DEFAULT_PORT,
        ..rocket::Config::default()
    };

    if let Some(port_str) = matches.opt_str("p") {
        rocket_configuration.port = match port_str.parse::<u16>() {
            Ok(port) => port,
            Err(_e) => return Err(CliError::InvalidPort(port_str)),
        }
    }

    if let Some(addr) = matches.opt_str("a") {
        rocket_configuration.address = match addr.parse() {
            Ok(parsed_addr) => parsed_addr,
            Err(_) => return Err(CliError::InvalidAddress(addr)),
        };
    }

    Ok(rocket_configuration)
}

/// Installs the global tracing subscriber. With `-l`, JSON logs go to a daily
/// rolling file and the returned guard must outlive the server.
fn init_tracing(matches: &Matches) -> Option<WorkerGuard> {
    if !matches.opt_present("l") {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(
        get_log_dir(),
        format!("server.{}.log", process::id()),
    );
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .json()
        .with_writer(writer)
        .init();
    Some(guard)
}

/// Parses the `-k` value into milliseconds.
fn keep_alive_timeout_ms(value: String) -> Result<u128, CliError> {
    match value.parse::<u128>() {
        Ok(secs) if secs > 0 => Ok(secs.saturating_mul(1000)),
        _ => Err(CliError::InvalidTimeout(value)),
    }
}

/// Stops the server once no request arrived for `timeout_ms`.
///
/// The watcher waits for the shutdown handle of the launched rocket, then polls
/// the last activity timestamp every 5 seconds. When a graceful shutdown does
/// not finish within 10 seconds the process is aborted.
fn spawn_keep_alive_watcher(
    timeout_ms: u128,
    last_activity_ms: Arc<RwLock<u128>>,
    mut rx_rocket_shutdown: Receiver<Shutdown>,
    tx_keep_alive_error: Sender<i32>,
) {
    thread::spawn(move || {
        let Some(shutdown) = rx_rocket_shutdown.blocking_recv() else {
            let _ = tx_keep_alive_error.blocking_send(ERROR_CHANNEL_SENDER_DROPPED);
            return;
        };
        loop {
            let last_activity = last_activity_ms
                .try_read()
                .map(|timestamp| *timestamp)
                .unwrap_or_default();

            if last_activity > 0 && get_current_timestamp_ms() > last_activity + timeout_ms {
                eprintln!("no request in the last {timeout_ms} ms, shutting down");
                shutdown.notify();
                thread::sleep(Duration::from_secs(10));
                eprintln!("server did not shut down, aborting the process");
                process::abort();
            }
            thread::sleep(Duration::from_secs(5));
        }
    });
}

/// Reads the command line, sets up logging and builds the rocket with its managed state.
///
/// Returns [`RocketPreparation::NoServerInteraction`] for `--help` and `--version`.
pub fn prepare_rocket(tx_keep_alive_error: Sender<i32>) -> Result<RocketPreparation, CliError> {
    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_default();
    let opts = get_opts();

    let matches = opts.parse(args.iter().skip(1))?;

    if matches.opt_present("v") {
        println!("Version: {}, revision: {}", CARGO_VERSION, VERSION);
        return Ok(RocketPreparation::NoServerInteraction);
    }

    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return Ok(RocketPreparation::NoServerInteraction);
    }

    let guard = init_tracing(&matches);

    let rocket_configuration = rocket_configuration(&matches)?;
    let analyzer = build_analyzer(&matches)?;
    let mut server_state = ServerState::new(analyzer, matches.opt_present("e"));

    // the launched rocket sends its shutdown handle back through this channel
    let (tx_rocket_shutdown, rx_rocket_shutdown) = channel::<Shutdown>(1);

    if let Some(value) = matches.opt_str("k") {
        let timeout_ms = keep_alive_timeout_ms(value)?;
        server_state.is_keepalive_enabled = true;
        spawn_keep_alive_watcher(
            timeout_ms,
            server_state.last_ping_request_timestamp_ms.clone(),
            rx_rocket_shutdown,
            tx_keep_alive_error,
        );
    }

    let rocket = rocket::custom(rocket_configuration).manage(server_state.clone());

    Ok(RocketPreparation::ServerInfo {
        rocket: Box::new(rocket),
        state: server_state,
        tx_rocket_shutdown,
        guard,
    })
}
