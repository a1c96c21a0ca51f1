use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::{Data, Request, Response, State};
use server::constants::{
    SERVER_HEADER_KEEPALIVE_ENABLED, SERVER_HEADER_SERVER_REVISION, SERVER_HEADER_SERVER_VERSION,
    SERVER_HEADER_SHUTDOWN_ENABLED,
};
use tracing::Span;
use uuid::Uuid;

use super::state::ServerState;
use super::utils::{get_revision, get_version};

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "POST, GET, OPTIONS"),
    ("Access-Control-Allow-Headers", "*"),
    ("Access-Control-Allow-Credentials", "true"),
];

/// Lets browser-based MCP clients call the scanner from any origin.
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        for (name, value) in CORS_HEADERS {
            response.set_header(Header::new(name, value));
        }
    }
}

/// Advertises the server version and which optional mechanisms are on.
pub struct CustomHeaders;

#[rocket::async_trait]
impl Fairing for CustomHeaders {
    fn info(&self) -> Info {
        Info {
            name: "Server headers",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new(SERVER_HEADER_SERVER_VERSION, get_version()));
        response.set_header(Header::new(SERVER_HEADER_SERVER_REVISION, get_revision()));

        if let Outcome::Success(state) = request.guard::<&State<ServerState>>().await {
            response.set_header(Header::new(
                SERVER_HEADER_SHUTDOWN_ENABLED,
                state.is_shutdown_enabled.to_string(),
            ));
            response.set_header(Header::new(
                SERVER_HEADER_KEEPALIVE_ENABLED,
                state.is_keepalive_enabled.to_string(),
            ));
        }
    }
}

/// Counts every incoming request as activity for the keep-alive watcher.
pub struct KeepAlive;

#[rocket::async_trait]
impl Fairing for KeepAlive {
    fn info(&self) -> Info {
        Info {
            name: "Keep alive",
            kind: Kind::Request,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut Data<'_>) {
        if let Outcome::Success(state) = request.guard::<&State<ServerState>>().await {
            state.record_activity();
        }
    }
}

/// Opens an `http_request` span for every request and tags it with a request id.
///
/// The id is the caller's `X-Request-Id` when present, a fresh UUID v4 otherwise,
/// and is echoed back on the response. Rocket 0.5.0 has no built-in request ids
/// (see: [#21](https://github.com/rwf2/Rocket/issues/21)).
pub struct TracingFairing;

/// Per-request data stored by [`TracingFairing`] in Rocket's request-local cache.
#[derive(Clone, Default)]
struct RequestTrace(Option<(String, Span)>);

impl RequestTrace {
    fn of(request: &Request<'_>) -> Self {
        request.local_cache(Self::default).clone()
    }
}

#[rocket::async_trait]
impl Fairing for TracingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request tracing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _data: &mut Data<'_>) {
        let request_id = match request.headers().get_one(REQUEST_ID_HEADER) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        let span = tracing::info_span!(
            "http_request",
            "http.request_id" = request_id.as_str(),
            "http.method" = request.method().as_str(),
            "http.uri" = request.uri().path().as_str(),
            "http.status_code" = tracing::field::Empty
        );
        request.local_cache(|| RequestTrace(Some((request_id, span))));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let RequestTrace(Some((request_id, span))) = RequestTrace::of(request) {
            span.record("http.status_code", response.status().code);
            response.set_header(Header::new(REQUEST_ID_HEADER, request_id));
        }
    }
}

/// Request guard handing the [`TracingFairing`] span and request id to a route.
pub struct TraceSpan {
    span: Span,
    /// Either supplied by the caller or generated as a UUID v4.
    pub request_id: String,
}

impl TraceSpan {
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    /// For instrumenting futures, which cannot hold an [`Entered`](tracing::span::Entered) guard across awaits.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TraceSpan {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match RequestTrace::of(request) {
            RequestTrace(Some((request_id, span))) => Outcome::Success(Self { span, request_id }),
            // TracingFairing is not attached
            RequestTrace(None) => Outcome::Error((Status::InternalServerError, ())),
        }
    }
}
