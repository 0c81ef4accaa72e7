//! Ready-made plugins: structured logging and request timing.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use futures::future::{ready, BoxFuture};
use serde_json::Value;

use crate::{error::ExecError, plugin::Plugin};

/// Logs every request, response and error through [`tracing`].
pub struct LoggingPlugin;

impl Plugin for LoggingPlugin {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_request<'a>(&'a self, key: &'a str, input: &'a Value) -> BoxFuture<'a, ()> {
        tracing::info!(key = %key, input = %input, "rpc request");
        Box::pin(ready(()))
    }

    fn on_response<'a>(
        &'a self,
        key: &'a str,
        _input: &'a Value,
        output: &'a Value,
    ) -> BoxFuture<'a, ()> {
        tracing::info!(key = %key, output = %output, "rpc response");
        Box::pin(ready(()))
    }

    fn on_error<'a>(&'a self, key: &'a str, error: &'a ExecError) -> BoxFuture<'a, ()> {
        tracing::error!(key = %key, error = %error, "rpc error");
        Box::pin(ready(()))
    }
}

/// Where [`MetricsPlugin`] reports request durations.
pub trait MetricsSink: Send + Sync {
    fn record(&self, key: &str, duration: Duration);
}

/// Times requests from `on_request` to `on_response` and reports each
/// duration to an explicitly injected [`MetricsSink`].
///
/// Timing is keyed by procedure key, so concurrent in-flight requests to the
/// same key overwrite each other's start mark; durations are approximate
/// under that kind of contention.
pub struct MetricsPlugin {
    sink: Arc<dyn MetricsSink>,
    in_flight: Mutex<HashMap<String, Instant>>,
}

impl MetricsPlugin {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            sink,
            in_flight: Mutex::new(HashMap::new()),
        }
    }
}

impl Plugin for MetricsPlugin {
    fn name(&self) -> &str {
        "metrics"
    }

    fn on_request<'a>(&'a self, key: &'a str, _input: &'a Value) -> BoxFuture<'a, ()> {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.insert(key.to_string(), Instant::now());
        }
        Box::pin(ready(()))
    }

    fn on_response<'a>(
        &'a self,
        key: &'a str,
        _input: &'a Value,
        _output: &'a Value,
    ) -> BoxFuture<'a, ()> {
        let started = match self.in_flight.lock() {
            Ok(mut in_flight) => in_flight.remove(key),
            Err(_) => None,
        };
        if let Some(started) = started {
            self.sink.record(key, started.elapsed());
        }
        Box::pin(ready(()))
    }
}
