use std::{borrow::Cow, future::Future, sync::Arc};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{Error, ExecError},
    middleware,
    plugin::Plugin,
    router::{Handlers, Router},
};

/// Transport-level request metadata handed to the context factory: which
/// channel the request arrived on and, where the transport knows it, an
/// opaque identifier for the sender.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub channel: Cow<'static, str>,
    pub sender: Option<String>,
}

/// The wire request: an address (either a flat dotted `key` or an explicit
/// `path` of segments) plus the raw input value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    #[serde(default)]
    pub input: Value,
}

impl Request {
    pub fn by_key(key: impl Into<String>, input: Value) -> Self {
        Self {
            key: Some(key.into()),
            path: None,
            input,
        }
    }

    pub fn by_path(path: Vec<String>, input: Value) -> Self {
        Self {
            key: None,
            path: Some(path),
            input,
        }
    }

    /// The address as path segments; an explicit `path` wins over `key`.
    pub(crate) fn segments(&self) -> Vec<String> {
        if let Some(path) = &self.path {
            path.clone()
        } else if let Some(key) = &self.key {
            key.split('.').map(str::to_string).collect()
        } else {
            Vec::new()
        }
    }
}

/// The uniform wire envelope: exactly one of `data` or `error`, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Data { data: Value },
    Error { error: Error },
}

/// Produces a fresh context for each request. A structured failure (e.g. an
/// `UNAUTHORIZED` from a session lookup) passes to the client verbatim.
pub type ContextFactory<TCtx> =
    Arc<dyn Fn(RequestMeta) -> BoxFuture<'static, Result<TCtx, Error>> + Send + Sync>;

/// The server-side entry point bound to one transport channel name.
///
/// For every inbound request it resolves the procedure, runs the plugin
/// hooks, creates a fresh context, validates the input, drives the middleware
/// chain around the handler, validates the output and returns the uniform
/// [`Response`] envelope. It holds no cross-request state: concurrent
/// in-flight requests each own their context, validated input and chain
/// cursor.
pub struct RouterExecutor<TCtx> {
    router: Router<TCtx>,
    handlers: Handlers<TCtx>,
    ctx_fn: ContextFactory<TCtx>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl<TCtx: Send + Sync + 'static> RouterExecutor<TCtx> {
    pub fn new<F, Fut>(router: Router<TCtx>, ctx_fn: F) -> Self
    where
        F: Fn(RequestMeta) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TCtx, Error>> + Send + 'static,
    {
        Self {
            router,
            handlers: Handlers::new(),
            ctx_fn: Arc::new(move |meta| Box::pin(ctx_fn(meta))),
            plugins: Vec::new(),
        }
    }

    /// Supply the external handler map consulted for procedures without an
    /// inline handler.
    pub fn handlers(mut self, handlers: Handlers<TCtx>) -> Self {
        self.handlers = handlers;
        self
    }

    /// Register a plugin. Hooks run in registration order.
    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Execute one request through the full lifecycle. Never fails across
    /// the transport boundary: every error becomes an `{ error }` envelope.
    pub async fn execute(&self, meta: RequestMeta, request: Request) -> Response {
        let segments = request.segments();
        let key = segments.join(".");
        tracing::debug!(key = %key, "handling request");

        match self.run(meta, &key, &segments, &request.input).await {
            Ok(data) => Response::Data { data },
            Err(err) => {
                for plugin in &self.plugins {
                    plugin.on_error(&key, &err).await;
                }
                tracing::error!(key = %key, error = %err, "request failed");
                Response::Error { error: err.into() }
            }
        }
    }

    async fn run(
        &self,
        meta: RequestMeta,
        key: &str,
        segments: &[String],
        raw_input: &Value,
    ) -> Result<Value, ExecError> {
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let procedure = self
            .router
            .resolve(&segments)
            .ok_or_else(|| ExecError::ProcedureNotFound(key.to_string()))?;

        for plugin in &self.plugins {
            plugin.on_request(key, raw_input).await;
        }

        let ctx = (self.ctx_fn)(meta)
            .await
            .map_err(ExecError::ContextFactory)?;
        let ctx = Arc::new(ctx);

        let input = procedure
            .input
            .parse(raw_input)
            .map_err(ExecError::InputValidation)?;

        // Inline handler wins; the external map is the fallback.
        let handler = procedure
            .handler
            .clone()
            .or_else(|| self.handlers.get(key).cloned())
            .ok_or_else(|| ExecError::ProcedureNotFound(key.to_string()))?;

        let output = middleware::execute(&procedure.middlewares, ctx, input.clone(), handler).await?;

        let output = procedure
            .output
            .parse(&output)
            .map_err(ExecError::OutputValidation)?;

        for plugin in &self.plugins {
            plugin.on_response(key, &input, &output).await;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_addressing_forms_agree() {
        let by_key = Request::by_key("user.getById", json!({}));
        let by_path = Request::by_path(vec!["user".into(), "getById".into()], json!({}));
        assert_eq!(by_key.segments(), by_path.segments());

        let unaddressed = Request {
            key: None,
            path: None,
            input: json!({}),
        };
        assert!(unaddressed.segments().is_empty());
    }

    #[test]
    fn response_envelope_is_exactly_one_of_data_or_error() {
        let data = serde_json::to_value(Response::Data { data: json!(1) }).unwrap();
        assert_eq!(data, json!({ "data": 1 }));

        let error = serde_json::to_value(Response::Error {
            error: Error::forbidden(),
        })
        .unwrap();
        assert_eq!(error, json!({ "error": { "code": "FORBIDDEN" } }));

        // And both round-trip.
        assert_eq!(
            serde_json::from_value::<Response>(data).unwrap(),
            Response::Data { data: json!(1) }
        );
        assert_eq!(
            serde_json::from_value::<Response>(error).unwrap(),
            Response::Error {
                error: Error::forbidden()
            }
        );
    }
}
