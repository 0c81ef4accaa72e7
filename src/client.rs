use std::{borrow::Cow, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    error::Error,
    exec::{Request, Response},
    transport::Transport,
};

/// The caller-side surface mirroring the router's key/path structure.
///
/// Each [`Client::path`] call accumulates one path segment; [`Client::call`]
/// treats the accumulated path as the callable leaf, sends exactly one
/// transport invocation and unwraps the reply envelope. A sub-path client is
/// an inert value until `call` is invoked, so holding (or cloning) one never
/// triggers a request.
///
/// The client has no retry, batching or caching; richer behavior is layered
/// on via [`Client::extend`], using [`Client::query_key`] where a cache wants
/// a stable key.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    channel: Cow<'static, str>,
    path: Vec<String>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, channel: impl Into<Cow<'static, str>>) -> Self {
        Self {
            transport,
            channel: channel.into(),
            path: Vec::new(),
        }
    }

    /// A client one path segment deeper.
    pub fn path(&self, segment: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Self {
            transport: self.transport.clone(),
            channel: self.channel.clone(),
            path,
        }
    }

    /// The accumulated path as a dotted key.
    pub fn key(&self) -> String {
        self.path.join(".")
    }

    /// Call the remote procedure at the accumulated path.
    ///
    /// A `{ data }` reply resolves to the deserialized output; an `{ error }`
    /// reply surfaces as `Err` with code, message and issues preserved.
    pub async fn call<TInput, TOutput>(&self, input: TInput) -> Result<TOutput, Error>
    where
        TInput: Serialize,
        TOutput: DeserializeOwned,
    {
        let input = serde_json::to_value(input)
            .map_err(|err| Error::internal(format!("failed to serialize input: {err}")))?;
        let output = self.call_value(input).await?;
        serde_json::from_value(output)
            .map_err(|err| Error::internal(format!("failed to deserialize output: {err}")))
    }

    /// Untyped variant of [`Client::call`].
    pub async fn call_value(&self, input: Value) -> Result<Value, Error> {
        let request = Request::by_path(self.path.clone(), input);
        match self.transport.invoke(&self.channel, request).await? {
            Response::Data { data } => Ok(data),
            Response::Error { error } => Err(error),
        }
    }

    /// Derive a `(dotted key, input)` cache key for this path, for
    /// data-fetching caches layered on top of the client.
    pub fn query_key<TInput: Serialize>(&self, input: &TInput) -> (String, Value) {
        (
            self.key(),
            serde_json::to_value(input).unwrap_or_default(),
        )
    }

    /// Consume the base client into a richer wrapper without altering the
    /// underlying call mechanics.
    pub fn extend<T>(self, wrap: impl FnOnce(Self) -> T) -> T {
        wrap(self)
    }
}
