use futures::future::{ready, BoxFuture};
use serde_json::Value;

use crate::error::ExecError;

/// A named observer of the request lifecycle.
///
/// Plugins run in registration order, each hook awaited before the next. All
/// hooks default to no-ops and receive read-only views; a plugin can never
/// alter the request or the response. `on_error` observes the original,
/// unmasked [`ExecError`] before the client-facing envelope is masked.
///
/// Hooks are infallible by construction: a plugin that can fail internally
/// must handle that failure itself.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Invoked after the procedure resolved, before context creation and
    /// input validation. Receives the raw (unvalidated) input.
    fn on_request<'a>(&'a self, key: &'a str, input: &'a Value) -> BoxFuture<'a, ()> {
        let _ = (key, input);
        Box::pin(ready(()))
    }

    /// Invoked after output validation, with the validated input and output.
    fn on_response<'a>(
        &'a self,
        key: &'a str,
        input: &'a Value,
        output: &'a Value,
    ) -> BoxFuture<'a, ()> {
        let _ = (key, input, output);
        Box::pin(ready(()))
    }

    /// Invoked for every failed request, before masking.
    fn on_error<'a>(&'a self, key: &'a str, error: &'a ExecError) -> BoxFuture<'a, ()> {
        let _ = (key, error);
        Box::pin(ready(()))
    }
}
