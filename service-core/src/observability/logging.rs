use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber: env filter, JSON fmt output and, when an
/// OTLP endpoint is given, span export through OpenTelemetry.
///
/// `RUST_LOG` takes precedence over `log_level`. Calling this twice is
/// harmless; the second subscriber is not installed.
pub fn init_tracing(service_name: &str, log_level: &str, otlp_endpoint: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let tracer = otlp_endpoint.and_then(|endpoint| {
        let otlp_exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint);

        match opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(otlp_exporter)
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", service_name.to_string()),
            ])))
            .install_batch(runtime::Tokio)
        {
            Ok(t) => Some(t),
            Err(e) => {
                eprintln!(
                    "Failed to initialize OTLP tracer for '{}' at '{}': {}; using local logs only",
                    service_name, endpoint, e
                );
                None
            }
        }
    });

    let telemetry = tracer.map(|t| tracing_opentelemetry::layer().with_tracer(t));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("Tracing subscriber for '{}' not installed: {}", service_name, e);
    }
}
