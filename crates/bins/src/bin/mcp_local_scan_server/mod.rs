use std::process;

use cli::{CliError, RocketPreparation};
use endpoints::EndpointError;
use error_codes::{
    ERROR_BAD_ADDRESS, ERROR_CHANNEL_SENDER_DROPPED, ERROR_GENERAL, ERROR_INVALID_ARGUMENT,
};
use rocket::tokio::sync::mpsc::{channel, Receiver, Sender};
use rocket::{Build, Rocket, Shutdown};
use state::ServerState;
use tracing_appender::non_blocking::WorkerGuard;

mod cli;
mod endpoints;
mod error_codes;
mod fairings;
mod state;
mod utils;

/// Parses the command line and serves the analysis endpoints until shutdown.
///
/// # Panics
///
/// Exits the process with one of the `error_codes` on a startup or launch
/// failure, and panics when a launch failure has no dedicated code.
pub async fn start() {
    // the main task keeps its own sender so the receiver never reports a
    // dropped channel while the keep-alive watcher is disabled
    let (tx_keep_alive_error, rx_keep_alive_error) = channel::<i32>(1);

    match cli::prepare_rocket(tx_keep_alive_error.clone()) {
        Err(e) => {
            eprintln!("Error found: {e}");
            process::exit(startup_exit_code(&e));
        }
        Ok(RocketPreparation::NoServerInteraction) => {}
        Ok(RocketPreparation::ServerInfo {
            rocket,
            state,
            tx_rocket_shutdown,
            guard,
        }) => {
            let rocket = attach_fairings(*rocket, &state);
            serve(rocket, tx_rocket_shutdown, rx_keep_alive_error, guard).await;
        }
    }
}

fn startup_exit_code(error: &CliError) -> i32 {
    if error.is_invalid_argument() {
        ERROR_INVALID_ARGUMENT
    } else {
        ERROR_GENERAL
    }
}

fn attach_fairings(rocket: Rocket<Build>, state: &ServerState) -> Rocket<Build> {
    let rocket = rocket
        .attach(fairings::Cors)
        .attach(fairings::CustomHeaders)
        .attach(fairings::TracingFairing);
    if state.is_keepalive_enabled {
        rocket.attach(fairings::KeepAlive)
    } else {
        rocket
    }
}

/// Runs the server until it stops on its own or the keep-alive watcher reports an error.
async fn serve(
    rocket: Rocket<Build>,
    tx_rocket_shutdown: Sender<Shutdown>,
    mut rx_keep_alive_error: Receiver<i32>,
    guard: Option<WorkerGuard>,
) {
    let result = rocket::tokio::select! {
        launched = endpoints::launch_rocket_with_endpoints(rocket, tx_rocket_shutdown) => launched,
        code = rx_keep_alive_error.recv() => Err(EndpointError::ExitCode(
            code.unwrap_or(ERROR_CHANNEL_SENDER_DROPPED)
        )),
    };

    let Err(e) = result else {
        return;
    };

    let error_str = format!("{e:?}");
    tracing::error!("Error while running the analysis server: {error_str}");
    // pending file logs are only written when the guard is dropped
    drop(guard);

    match e {
        EndpointError::ExitCode(code) => process::exit(code),
        EndpointError::RocketError(re) if matches!(re.kind(), rocket::error::ErrorKind::Bind(_)) => {
            process::exit(ERROR_BAD_ADDRESS)
        }
        _ => panic!("Error while running the analysis server: {error_str}"),
    }
}
