use crate::mcp_local_scan_server::fairings::TraceSpan;
use rocket::{futures::FutureExt, http::Status, serde::json::Json, Build, Rocket, Shutdown, State};
use server::model::analysis_response::AnalysisServerResponse;
use server::model::verify_request::VerifyServerRequest;
use server::request::process_analysis_request;
use thiserror::Error;
use tracing::Instrument;

use crate::mcp_local_scan_server::state::ServerState;

use super::utils;

/// The shutdown endpoint, when a GET request is received, will return a 204 code if the shutdown mechanism is enabled.
/// It will return a 403 code otherwise.
///
/// The shutdown mechanism is optional, and the user starting the server decides
/// whether to enable it or not by using the `-e` or `--enable-shutdown` flag.
///
/// # Examples
///
/// ```sh
/// ./mcp-local-scan-server -p 8128 -k 30 -e
/// curl -i localhost:8128/shutdown
/// ```
#[rocket::get("/shutdown")]
fn shutdown_get(state: &State<ServerState>) -> Status {
    if state.is_shutdown_enabled {
        Status::NoContent
    } else {
        Status::Forbidden
    }
}

/// The shutdown endpoint, when receiving a POST request, will SHUTDOWN the server and return a 204 code if the shutdown mechanism is enabled.
/// It will return a 403 code otherwise.
///
/// Please, refer to the [`shutdown_get`] function's examples section to see how this would work.
#[rocket::post("/shutdown")]
fn shutdown_post(state: &State<ServerState>, shutdown: Shutdown) -> Status {
    if state.is_shutdown_enabled {
        shutdown.notify();
        Status::NoContent
    } else {
        Status::Forbidden
    }
}

/// Classifies the description of every tool in the request and returns the issues found.
///
/// The response is always `200 OK`; an unreachable classifier backend only means fewer issues.
///
/// ```sh
/// curl -X POST localhost:8128/api/v1/public/mcp-analysis \
///   -H 'Content-Type: application/json' \
///   -d '[{"metadata": {}, "tools": [{"name": "add", "description": "Adds two numbers", "inputSchema": {}}]}]'
/// ```
#[rocket::post("/mcp-analysis", format = "application/json", data = "<request>")]
async fn mcp_analysis(
    span: TraceSpan,
    state: &State<ServerState>,
    request: Json<VerifyServerRequest>,
) -> Json<AnalysisServerResponse> {
    let request = request.into_inner();
    {
        let _entered = span.enter();
        tracing::debug!(request_id = span.request_id.as_str(), "{:?}", &request);
    }
    let response = process_analysis_request(request, &state.analyzer)
        .instrument(span.span().clone())
        .await;
    Json(response)
}

#[rocket::get("/version", format = "text/plain")]
pub fn get_version() -> String {
    utils::get_version()
}

#[rocket::get("/revision", format = "text/plain")]
pub fn get_revision() -> String {
    utils::get_revision()
}

/// Catches all OPTION requests in order to get the CORS related Fairing triggered.
#[rocket::options("/<_..>")]
const fn get_options() -> String {
    /* Intentionally left empty */
    String::new()
}

/// Simple ping method that will return "pong" as response.
#[rocket::get("/ping", format = "text/plain")]
fn ping() -> String {
    "pong".to_string()
}

pub fn mount_endpoints(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount(
            "/",
            rocket::routes![
                get_version,
                get_revision,
                ping,
                get_options,
                shutdown_get,
                shutdown_post
            ],
        )
        .mount("/api/v1/public", rocket::routes![mcp_analysis])
}

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Error trying to start the rocket thread")]
    JoinHandleError,
    #[error("Rocket error {0:?}")]
    RocketError(#[from] rocket::Error),
    #[error("Error from exit code {0:?}")]
    ExitCode(i32),
}

/// Starts the rocket with endpoints
pub async fn launch_rocket_with_endpoints(
    rocket: Rocket<Build>,
    tx_rocket_shutdown: rocket::tokio::sync::mpsc::Sender<Shutdown>,
) -> Result<(), EndpointError> {
    let ignited = mount_endpoints(rocket).ignite().await?;
    let shutdown_handle = ignited.shutdown();
    let rocket_handle = rocket::tokio::spawn(async { ignited.launch().await });

    let _ = tx_rocket_shutdown.send(shutdown_handle.clone()).await;
    // Will shutdown if the keep alive option has been passed
    // or if the rocket thread stops.
    rocket::futures::select! {
        a = shutdown_handle.fuse() => Ok(a),
        b = rocket_handle.fuse() => match b {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(EndpointError::JoinHandleError),
        }
    }
}
