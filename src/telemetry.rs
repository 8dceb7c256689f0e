use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Build the JSON subscriber used by both services.
///
/// `RUST_LOG` wins over `default_filter`.
pub fn get_subscriber(default_filter: &str) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json()
        .with_current_span(true);

    Registry::default().with(env_filter).with(formatting_layer)
}

/// Install the subscriber globally. Call once, at the top of `main`.
pub fn init_telemetry(service_name: &str) {
    if get_subscriber("info").try_init().is_err() {
        tracing::warn!("Global tracing subscriber was already installed");
    }
    tracing::info!(service = service_name, "Telemetry initialised");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_can_be_used_as_default() {
        let subscriber = get_subscriber("debug");
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("request", request_id = "req-1");
            let _guard = span.enter();
            tracing::info!(user_id = "abc", "inside request span");
        });
    }
}
