//! Prometheus metrics for reservation attempts.
//!
//! # Example
//!
//! ```rust,no_run
//! use seatlock_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.serve()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use seatlock_core::FailureKind;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for a process, optionally with an HTTP scrape endpoint.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server. `addr` is only bound by [`MetricsServer::serve`].
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    fn builder() -> Result<PrometheusBuilder, MetricsError> {
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))
    }

    /// Describe all metrics and install the Prometheus recorder without an HTTP
    /// endpoint; read the metrics with [`MetricsServer::render`].
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder that is
    /// already installed (e.g. by another test) is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        match Self::builder()?.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Describe all metrics, install the Prometheus recorder and serve the scrape
    /// text over HTTP on the configured address.
    ///
    /// Must be called from within a Tokio runtime; the listener runs as a spawned task.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Build`] if the address cannot be bound and
    /// [`MetricsError::Install`] if the recorder cannot be installed. A recorder that
    /// is already installed is not an error; nothing is served in that case.
    pub fn serve(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = Self::builder()?
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            let err_msg = e.to_string();
            if err_msg.contains("already initialized") {
                tracing::warn!("Metrics recorder already initialized, not serving metrics");
                return Ok(());
            }
            return Err(MetricsError::Install(err_msg));
        }

        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "Metrics endpoint stopped");
            }
        });

        self.handle = Some(handle);
        tracing::info!(addr = %self.addr, "Serving Prometheus metrics");
        Ok(())
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "seat_reservation_attempts_total",
        "Total number of reservation attempts (one per transaction)"
    );
    describe_counter!(
        "seat_reservation_attempt_failures_total",
        "Total number of failed reservation attempts, labelled by failure kind"
    );
    describe_counter!(
        "seat_reservation_succeeded_total",
        "Total number of reservations that committed"
    );
    describe_counter!(
        "seat_reservation_exhausted_total",
        "Total number of reservations that spent their attempt budget"
    );
    describe_counter!(
        "seat_reservation_sold_out_total",
        "Total number of reservations stopped early on a sold-out theatre"
    );
    describe_gauge!(
        "seat_reservation_in_flight",
        "Reservations currently being processed"
    );
    describe_histogram!(
        "seat_reservation_duration_seconds",
        "Time taken by a reservation, retries included"
    );
}

/// Holds `seat_reservation_in_flight` raised by one until dropped.
///
/// Dropping the guard also covers a `reserve` future that is cancelled mid-retry.
#[derive(Debug)]
#[must_use = "the in-flight gauge is lowered as soon as the guard is dropped"]
pub struct InFlightGuard(());

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("seat_reservation_in_flight").decrement(1.0);
    }
}

/// Reservation metrics recorder.
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record the start of a reservation.
    pub fn record_started() -> InFlightGuard {
        gauge!("seat_reservation_in_flight").increment(1.0);
        InFlightGuard(())
    }

    /// Record one attempt.
    pub fn record_attempt() {
        counter!("seat_reservation_attempts_total").increment(1);
    }

    /// Record a failed attempt.
    pub fn record_attempt_failure(kind: FailureKind) {
        counter!("seat_reservation_attempt_failures_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record a committed reservation.
    pub fn record_success(duration: Duration) {
        counter!("seat_reservation_succeeded_total").increment(1);
        Self::record_finished(duration);
    }

    /// Record a reservation that ran out of attempts.
    pub fn record_exhausted(duration: Duration) {
        counter!("seat_reservation_exhausted_total").increment(1);
        Self::record_finished(duration);
    }

    /// Record a reservation stopped on a sold-out theatre.
    pub fn record_sold_out(duration: Duration) {
        counter!("seat_reservation_sold_out_total").increment(1);
        Self::record_finished(duration);
    }

    fn record_finished(duration: Duration) {
        histogram!("seat_reservation_duration_seconds").record(duration.as_secs_f64());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn server_starts_without_handle() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let server = MetricsServer::new(addr);
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[tokio::test]
    async fn serve_reports_an_address_in_use() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut server = MetricsServer::new(taken.local_addr().unwrap());

        let err = server.serve().unwrap_err();
        assert!(matches!(err, MetricsError::Build(_)), "{err}");
        assert!(server.render().is_none());
    }

    #[test]
    fn reservation_metrics_render() {
        let addr = "127.0.0.1:0".parse().unwrap();
        let mut server = MetricsServer::new(addr);
        server.start().unwrap();

        let _in_flight = ReservationMetrics::record_started();
        ReservationMetrics::record_attempt();
        ReservationMetrics::record_attempt_failure(FailureKind::Contention);
        ReservationMetrics::record_attempt();
        ReservationMetrics::record_success(Duration::from_millis(20));

        // The recorder is process-global; another test may have installed it first.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("seat_reservation_attempts_total"));
            assert!(rendered.contains("kind=\"contention\""));
            assert!(rendered.contains("seat_reservation_succeeded_total"));
        }
    }

    #[test]
    fn in_flight_gauge_follows_guard_lifetime() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        ::metrics::with_local_recorder(&recorder, || {
            let first = ReservationMetrics::record_started();
            let second = ReservationMetrics::record_started();
            assert_eq!(in_flight(&handle.render()), Some(2.0));

            drop(first);
            assert_eq!(in_flight(&handle.render()), Some(1.0));
            drop(second);
        });

        assert_eq!(in_flight(&handle.render()), Some(0.0));
    }

    fn in_flight(rendered: &str) -> Option<f64> {
        rendered
            .lines()
            .find(|line| line.starts_with("seat_reservation_in_flight "))
            .and_then(|line| line.split_whitespace().last())
            .and_then(|value| value.parse().ok())
    }
}
