//! Hooks for exercising the error-code cardinality guard from tests.

pub fn simulate_error_code(code: &str) {
    crate::metrics::record_http_error("test", axum::http::StatusCode::BAD_REQUEST, Some(code));
}

pub fn distinct_gauge() -> i64 {
    crate::metrics::distinct_codes()
}

pub fn overflow_count() -> u64 {
    crate::metrics::overflow_total()
}
