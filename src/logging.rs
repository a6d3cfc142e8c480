//! Per-request tracing: every request gets an ID that prefixes its log lines,
//! and its response is logged with the route that served it and how long it took.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use log::Level;
use rocket::{
    fairing::{Fairing, Info, Kind},
    http::{Status, StatusClass},
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket, Route,
};

/// Identifies one request in the logs, shown as `req<n>`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl RequestId {
    /// The next unused ID. Wraps back to zero on overflow.
    pub fn next() -> Self {
        static ISSUED: AtomicUsize = AtomicUsize::new(0);
        Self(ISSUED.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req{}", self.0)
    }
}

/// What we remember about a request while it is in flight.
#[derive(Debug)]
struct Trace {
    id: RequestId,
    received: Instant,
}

impl Trace {
    fn start() -> Self {
        Self {
            id: RequestId::next(),
            received: Instant::now(),
        }
    }

    fn of<'r>(req: &'r Request<'_>) -> &'r Self {
        req.local_cache(Self::start)
    }
}

/// Handlers take `&RequestId` to prefix their own log lines with it.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(&Trace::of(req).id)
    }
}

/// Failures are errors, refusals are warnings, and everything else is routine.
fn level_for(status: Status) -> Level {
    match status.class() {
        StatusClass::ServerError => Level::Error,
        StatusClass::ClientError => Level::Warn,
        _ => Level::Info,
    }
}

fn describe_route(route: Option<&Route>) -> String {
    match route {
        Some(Route {
            name: Some(name),
            uri,
            ..
        }) => format!("{name} {uri}"),
        Some(route) => route.uri.to_string(),
        None => "no route".to_string(),
    }
}

/// Traces every request and response, and logs launch and shutdown.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request tracing",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Serving {} routes on {scheme}://{}:{}",
            rocket.routes().count(),
            config.address,
            config.port
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let trace = Trace::of(req);
        info!("{} {} {}", trace.id, req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let trace = Trace::of(req);
        let status = res.status();
        log!(
            level_for(status),
            "{} {status} from {} after {}ms",
            trace.id,
            describe_route(req.route()),
            trace.received.elapsed().as_millis()
        );
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutting down once in-flight requests finish");
    }
}
