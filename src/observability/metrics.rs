//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusRecorder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::thread;

/// Counter of repository operations, labelled by operation and status.
pub const OPERATIONS_TOTAL: &str = "itemdb_repository_operations_total";

/// Histogram of repository operation latency in seconds.
pub const OPERATION_DURATION_SECONDS: &str = "itemdb_repository_operation_duration_seconds";

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,
    /// Address to bind the metrics exporter.
    pub listen_addr: SocketAddr,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings.
    #[must_use]
    pub const fn from_settings(settings: &MetricsSettings) -> Self {
        Self {
            enabled: settings.enabled,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), settings.port),
        }
    }
}

/// Installs the Prometheus recorder and, when `expose` is set, its HTTP
/// listener.
///
/// # Returns
///
/// `false` when metrics are disabled and nothing was installed.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed or the
/// listener cannot be started.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<bool> {
    if !config.enabled {
        return Ok(false);
    }

    let builder = PrometheusBuilder::new();
    if expose {
        install_listener(builder.with_http_listener(config.listen_addr))?;
    } else {
        builder.install_recorder().map_err(|e| Error::OperationFailed {
            operation: "metrics_recorder_install".to_string(),
            cause: e.to_string(),
        })?;
    }

    describe_metrics();
    if expose {
        tracing::info!(addr = %config.listen_addr, "Prometheus exporter listening");
    }

    Ok(true)
}

/// Registers help text for the metrics this crate emits.
fn describe_metrics() {
    metrics::describe_counter!(
        OPERATIONS_TOTAL,
        "Repository operations by operation and outcome"
    );
    metrics::describe_histogram!(
        OPERATION_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Repository operation latency"
    );
}

fn install_listener(builder: PrometheusBuilder) -> Result<()> {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        return install_with_runtime(builder, &handle);
    }

    // One-shot commands run outside a runtime; give the exporter its own.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_runtime_init".to_string(),
            cause: e.to_string(),
        })?;
    let handle = runtime.handle().clone();
    install_with_runtime(builder, &handle)?;
    thread::Builder::new()
        .name("itemdb-metrics-exporter".to_string())
        .spawn(move || runtime.block_on(std::future::pending::<()>()))
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_runtime_thread".to_string(),
            cause: e.to_string(),
        })?;
    Ok(())
}

fn install_with_runtime(
    builder: PrometheusBuilder,
    runtime_handle: &tokio::runtime::Handle,
) -> Result<()> {
    let (recorder, exporter) = {
        let _guard = runtime_handle.enter();
        builder.build().map_err(|e| Error::OperationFailed {
            operation: "metrics_exporter_build".to_string(),
            cause: e.to_string(),
        })?
    };
    set_global_recorder(recorder)?;
    runtime_handle.spawn(exporter);
    Ok(())
}

fn set_global_recorder(recorder: PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder).map_err(|e| Error::OperationFailed {
        operation: "metrics_recorder_install".to_string(),
        cause: e.to_string(),
    })
}
