//! Client-side metrics
//!
//! Emitted through the `metrics` facade; the embedding application decides
//! whether to install a recorder. Without one every call is a no-op.
//!
//! - `crease_requests_total` (counter): labels `method`, `status`
//! - `crease_transport_errors_total` (counter): label `error_type`
//! - `crease_scheme_retries_total` (counter): label `scheme`
//! - `crease_refresh_total` (counter): label `outcome`

use crease_auth::AuthScheme;
use reqwest::Method;

/// Record one HTTP attempt that produced a response.
pub fn record_request(method: &Method, status: u16) {
    metrics::counter!(
        "crease_requests_total",
        "method" => method.as_str().to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an attempt that produced no response (`timeout` or `network`).
pub fn record_transport_error(error_type: &'static str) {
    metrics::counter!("crease_transport_errors_total", "error_type" => error_type).increment(1);
}

/// Record a 401 probe with an alternate scheme.
pub fn record_scheme_retry(scheme: AuthScheme) {
    metrics::counter!("crease_scheme_retries_total", "scheme" => scheme.as_str()).increment(1);
}

/// Record a refresh network call outcome (`success` or `failure`).
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("crease_refresh_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request(&Method::GET, 200);
        record_transport_error("timeout");
        record_scheme_retry(AuthScheme::Jwt);
        record_refresh("success");
    }

    #[test]
    fn request_counter_carries_method_and_status() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request(&Method::GET, 200);
        record_request(&Method::POST, 401);

        let output = handle.render();
        assert!(output.contains("crease_requests_total"));
        assert!(output.contains("method=\"GET\""));
        assert!(output.contains("status=\"401\""));
    }

    #[test]
    fn auth_counters_carry_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_scheme_retry(AuthScheme::Token);
        record_refresh("failure");
        record_transport_error("network");

        let output = handle.render();
        assert!(output.contains("crease_scheme_retries_total"));
        assert!(output.contains("scheme=\"Token\""));
        assert!(output.contains("crease_refresh_total"));
        assert!(output.contains("outcome=\"failure\""));
        assert!(output.contains("error_type=\"network\""));
    }
}
