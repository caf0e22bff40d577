/// HTTP endpoint for querying the climate dataset
///
/// Endpoints (all GET; HEAD is answered like GET without a body):
/// - /                                 - HTML list of available routes
/// - /api/v1.0/precipitation          - date → precipitation for the last year of data
/// - /api/v1.0/stations               - every station as {station, name}
/// - /api/v1.0/tobs                   - date → temperature at the most active station
/// - /api/v1.0/{start}                - [min, avg, max] temperature from start
/// - /api/v1.0/{start}/{end}          - [min, avg, max] temperature from start through end
///
/// Handlers read through a single shared `ClimateStore`. Requests are
/// accepted on the calling thread and answered on a worker pool.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use threadpool::ThreadPool;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::model::{DateRange, TemperatureStats, DATE_FORMAT, ONE_YEAR_CUTOFF};
use crate::store::{ClimateStore, SharedStore, StoreError};

/// Prefix shared by every data route.
pub const API_PREFIX: &str = "/api/v1.0";

/// Route templates, as listed in 404 responses and the startup banner.
pub const AVAILABLE_ENDPOINTS: &[&str] = &[
    "/",
    "/api/v1.0/precipitation",
    "/api/v1.0/stations",
    "/api/v1.0/tobs",
    "/api/v1.0/{start}",
    "/api/v1.0/{start}/{end}",
];

const HOME_PAGE: &str = "Welcome to Climate App<br/>\
Available Routes:<br/>\
/api/v1.0/precipitation<br/>\
/api/v1.0/stations<br/>\
/api/v1.0/tobs<br/>\
/api/v1.0/&lt;start&gt; (replace &lt;start&gt; with start date in yyyy-mm-dd format)<br/>\
/api/v1.0/&lt;start&gt;/&lt;end&gt; (replace &lt;start&gt; and &lt;end&gt; with start and end dates in yyyy-mm-dd format)<br/>";

/// Methods every route answers. tiny_http drops the body for HEAD.
const ALLOWED_METHODS: &[&str] = &["GET", "HEAD"];

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_HTML: &str = "text/html; charset=utf-8";

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Station as exposed by /api/v1.0/stations
#[derive(Debug, Serialize, PartialEq)]
pub struct StationSummary {
    pub station: String,
    pub name: String,
}

/// Status, content type and body of a response, independent of the HTTP
/// library so handlers can be tested without a socket.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl ApiResponse {
    fn html(body: &str) -> Self {
        ApiResponse {
            status: 200,
            content_type: CONTENT_TYPE_HTML,
            body: body.to_string(),
        }
    }

    /// JSON response from an already built value.
    fn json_value(status: u16, json: serde_json::Value) -> Self {
        ApiResponse {
            status,
            content_type: CONTENT_TYPE_JSON,
            body: serde_json::to_string_pretty(&json).unwrap_or_default(),
        }
    }

    fn json<T: Serialize>(data: &T) -> Result<Self, RequestError> {
        Ok(ApiResponse {
            status: 200,
            content_type: CONTENT_TYPE_JSON,
            body: serde_json::to_string_pretty(data).map_err(RequestError::Encode)?,
        })
    }

    /// Converts into a tiny_http response, adding `Allow` on 405s.
    pub fn into_http(self) -> tiny_http::Response<Cursor<Vec<u8>>> {
        let mut response = tiny_http::Response::from_data(self.body.into_bytes())
            .with_status_code(tiny_http::StatusCode(self.status));

        if let Ok(header) =
            tiny_http::Header::from_bytes(&b"Content-Type"[..], self.content_type.as_bytes())
        {
            response.add_header(header);
        }
        if self.status == 405 {
            let allow = ALLOWED_METHODS.join(", ");
            if let Ok(header) = tiny_http::Header::from_bytes(&b"Allow"[..], allow.as_bytes()) {
                response.add_header(header);
            }
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure while answering a matched route. Every variant is reported to
/// the client as a generic 500; details only go to the log.
#[derive(Debug)]
pub enum RequestError {
    /// Path parameter is not a `YYYY-MM-DD` date
    InvalidDate { value: String, source: chrono::ParseError },
    /// Query against the store failed
    Store(StoreError),
    /// A worker panicked while holding the store
    SessionPoisoned,
    /// Response body could not be serialized
    Encode(serde_json::Error),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::InvalidDate { value, source } => {
                write!(f, "'{}' is not a date in yyyy-mm-dd format: {}", value, source)
            }
            RequestError::Store(e) => write!(f, "{}", e),
            RequestError::SessionPoisoned => write!(f, "store session lock poisoned"),
            RequestError::Encode(e) => write!(f, "failed to encode response: {}", e),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<StoreError> for RequestError {
    fn from(e: StoreError) -> Self {
        RequestError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Precipitation,
    Stations,
    Tobs,
    TemperatureFrom { start: String },
    TemperatureBetween { start: String, end: String },
}

/// Matches a request URL to a route. The query string is ignored and
/// every path segment is percent-decoded before matching, so
/// `/api/v1.0/st%61tions` is the stations route. Fixed routes win over
/// `{start}`.
pub fn match_route(url: &str) -> Option<Route> {
    let path = url.split(['?', '#']).next().unwrap_or_default();

    if path == "/" {
        return Some(Route::Home);
    }

    let rest = path.strip_prefix(API_PREFIX)?.strip_prefix('/')?;
    let decoded = rest
        .split('/')
        .map(decode_segment)
        .collect::<Option<Vec<String>>>()?;
    if decoded.iter().any(|s| s.is_empty()) {
        return None;
    }

    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();
    match segments.as_slice() {
        ["precipitation"] => Some(Route::Precipitation),
        ["stations"] => Some(Route::Stations),
        ["tobs"] => Some(Route::Tobs),
        [start] => Some(Route::TemperatureFrom { start: start.to_string() }),
        [start, end] => Some(Route::TemperatureBetween {
            start: start.to_string(),
            end: end.to_string(),
        }),
        _ => None,
    }
}

/// Percent-decodes one path segment; `None` if it is not valid UTF-8.
fn decode_segment(segment: &str) -> Option<String> {
    urlencoding::decode(segment).ok().map(|d| d.into_owned())
}

/// Parses a `YYYY-MM-DD` path parameter.
pub fn parse_date(value: &str) -> Result<NaiveDate, RequestError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| RequestError::InvalidDate {
        value: value.to_string(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Data Fetching
// ---------------------------------------------------------------------------

/// Precipitation by date for the year ending at the last observation.
/// Later rows overwrite earlier ones when a date repeats across stations.
pub fn fetch_precipitation(
    store: &mut dyn ClimateStore,
) -> Result<BTreeMap<String, Option<f64>>, StoreError> {
    let values = store.precipitation_since(ONE_YEAR_CUTOFF)?;
    Ok(values.into_iter().map(|v| (v.date, v.value)).collect())
}

/// Every station, reduced to identifier and name.
pub fn fetch_stations(store: &mut dyn ClimateStore) -> Result<Vec<StationSummary>, StoreError> {
    let stations = store.stations()?;
    Ok(stations
        .into_iter()
        .map(|s| StationSummary {
            station: s.station,
            name: s.name,
        })
        .collect())
}

/// Temperature by date at the most active station over the last year of
/// data. Empty when there are no measurements at all; a NULL reading is
/// reported as `null`.
pub fn fetch_tobs(
    store: &mut dyn ClimateStore,
) -> Result<BTreeMap<String, Option<f64>>, StoreError> {
    let Some(most_active) = store.most_active_station()? else {
        return Ok(BTreeMap::new());
    };

    let values = store.temperatures_since(&most_active.station, ONE_YEAR_CUTOFF)?;
    Ok(values.into_iter().map(|v| (v.date, v.value)).collect())
}

pub fn fetch_temperature_stats(
    store: &mut dyn ClimateStore,
    range: DateRange,
) -> Result<TemperatureStats, StoreError> {
    store.temperature_stats(range)
}

// ---------------------------------------------------------------------------
// Request Handling
// ---------------------------------------------------------------------------

/// Answers one request. Never panics on bad input: unknown paths get 404,
/// methods other than GET and HEAD 405, and handler failures 500.
pub fn handle_request(store: &Mutex<Box<dyn ClimateStore>>, method: &str, url: &str) -> ApiResponse {
    let Some(route) = match_route(url) else {
        return not_found();
    };

    if !ALLOWED_METHODS.contains(&method) {
        return ApiResponse::json_value(
            405,
            serde_json::json!({
                "error": "Method not allowed",
                "allowed": ALLOWED_METHODS
            }),
        );
    }

    match dispatch(store, route) {
        Ok(response) => response,
        Err(e @ RequestError::InvalidDate { .. }) => {
            warn!(url, error = %e, "rejecting malformed date");
            server_error()
        }
        Err(e) => {
            error!(url, error = %e, "request failed");
            server_error()
        }
    }
}

fn dispatch(store: &Mutex<Box<dyn ClimateStore>>, route: Route) -> Result<ApiResponse, RequestError> {
    match route {
        Route::Home => Ok(ApiResponse::html(HOME_PAGE)),
        Route::Precipitation => {
            let data = fetch_precipitation(lock(store)?.as_mut())?;
            ApiResponse::json(&data)
        }
        Route::Stations => {
            let data = fetch_stations(lock(store)?.as_mut())?;
            ApiResponse::json(&data)
        }
        Route::Tobs => {
            let data = fetch_tobs(lock(store)?.as_mut())?;
            ApiResponse::json(&data)
        }
        Route::TemperatureFrom { start } => {
            let range = DateRange::from(parse_date(&start)?);
            let stats = fetch_temperature_stats(lock(store)?.as_mut(), range)?;
            ApiResponse::json(&stats)
        }
        Route::TemperatureBetween { start, end } => {
            let range = DateRange::between(parse_date(&start)?, parse_date(&end)?);
            let stats = fetch_temperature_stats(lock(store)?.as_mut(), range)?;
            ApiResponse::json(&stats)
        }
    }
}

fn lock(
    store: &Mutex<Box<dyn ClimateStore>>,
) -> Result<MutexGuard<'_, Box<dyn ClimateStore>>, RequestError> {
    store.lock().map_err(|_| RequestError::SessionPoisoned)
}

fn not_found() -> ApiResponse {
    ApiResponse::json_value(
        404,
        serde_json::json!({
            "error": "Not found",
            "available_endpoints": AVAILABLE_ENDPOINTS
        }),
    )
}

fn server_error() -> ApiResponse {
    ApiResponse::json_value(500, serde_json::json!({ "error": "Internal Server Error" }))
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

pub type ServerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Binds the listening socket. Port 0 picks a free port.
pub fn bind(address: &str) -> Result<tiny_http::Server, ServerError> {
    tiny_http::Server::http(address)
}

/// Accepts requests until the server is dropped or unblocked, answering
/// each on a pool of `workers` threads.
pub fn serve(server: &tiny_http::Server, store: SharedStore, workers: usize) {
    let pool = ThreadPool::with_name("climate-http".to_string(), workers.max(1));

    for request in server.incoming_requests() {
        let store = Arc::clone(&store);
        pool.execute(move || respond(request, &store));
    }

    pool.join();
}

fn respond(request: tiny_http::Request, store: &Mutex<Box<dyn ClimateStore>>) {
    let started = Instant::now();
    let method = request.method().to_string();
    let url = request.url().to_string();

    let response = handle_request(store, &method, &url);
    let status = response.status;

    if let Err(e) = request.respond(response.into_http()) {
        warn!(%method, %url, error = %e, "failed to send response");
        return;
    }

    info!(
        %method,
        %url,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request served"
    );
}

/// Start HTTP endpoint server per `config` and block serving requests
pub fn start_endpoint_server(config: &ServerConfig, store: SharedStore) -> Result<(), ServerError> {
    let address = config.bind_address();
    let server = bind(&address)?;

    println!("📡 HTTP endpoint listening on http://{}", address);
    for endpoint in AVAILABLE_ENDPOINTS {
        println!("   GET {}", endpoint);
    }
    println!();

    info!(%address, workers = config.workers, "endpoint server started");
    serve(&server, store, config.workers);
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
