use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use once_cell::sync::Lazy;
use prometheus::core::Collector;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};
use tracing::warn;

pub const ERROR_CODE_HEADER: &str = "X-Error-Code";
/// Upper bound on distinct `code` label values before folding into [`OVERFLOW_CODE`].
pub const MAX_ERROR_CODES: usize = 40;
pub const OVERFLOW_CODE: &str = "other";

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "http_errors_total",
            "Count of HTTP error responses emitted (status >= 400)",
        ),
        &["service", "code", "status"],
    )
    .unwrap_or_else(|err| panic!("http_errors_total definition: {err}"));
    register_collector("http_errors_total", Box::new(counter.clone()));
    counter
});

static DISTINCT_CODES: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "http_error_codes_distinct",
        "Distinct error codes currently tracked as labels",
    )
    .unwrap_or_else(|err| panic!("http_error_codes_distinct definition: {err}"));
    register_collector("http_error_codes_distinct", Box::new(gauge.clone()));
    gauge
});

static OVERFLOW_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "http_error_code_overflow_total",
        "Error responses whose code was folded into the overflow label",
    )
    .unwrap_or_else(|err| panic!("http_error_code_overflow_total definition: {err}"));
    register_collector("http_error_code_overflow_total", Box::new(counter.clone()));
    counter
});

/// Registers with the process-wide registry, logging instead of failing when
/// the name is already taken.
pub(crate) fn register_collector(name: &str, collector: Box<dyn Collector>) -> bool {
    match prometheus::register(collector) {
        Ok(()) => true,
        Err(err) => {
            warn!(metric = name, error = %err, "failed to register metric");
            false
        }
    }
}

static SEEN_CODES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

pub(crate) fn label_for(code: &str) -> String {
    let mut seen = SEEN_CODES.lock().unwrap_or_else(PoisonError::into_inner);
    if seen.contains(code) {
        return code.to_string();
    }
    if seen.len() < MAX_ERROR_CODES {
        seen.insert(code.to_string());
        DISTINCT_CODES.set(seen.len() as i64);
        return code.to_string();
    }
    OVERFLOW_TOTAL.inc();
    OVERFLOW_CODE.to_string()
}

pub(crate) fn distinct_codes() -> i64 {
    DISTINCT_CODES.get()
}

pub(crate) fn overflow_total() -> u64 {
    OVERFLOW_TOTAL.get()
}

/// Counts an error response. Non-error statuses are ignored.
pub fn record_http_error(service: &str, status: StatusCode, code: Option<&str>) {
    if status.as_u16() < 400 {
        return;
    }
    let label = label_for(code.unwrap_or("unknown"));
    HTTP_ERRORS_TOTAL
        .with_label_values(&[service, label.as_str(), status.as_str()])
        .inc();
}

/// Middleware for `axum::middleware::from_fn` recording every error response
/// by its `X-Error-Code` header.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send + Sync + 'static
{
    move |req: Request, next: Next| -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let resp = next.run(req).await;
            let code = resp
                .headers()
                .get(ERROR_CODE_HEADER)
                .and_then(|value| value.to_str().ok());
            record_http_error(service, resp.status(), code);
            resp
        })
    }
}
