//! The narrow host↔frontend transport interface the core consumes, plus an
//! in-process implementation for tests and single-process deployments.
//!
//! The core makes no delivery, ordering or retry guarantees across
//! independent requests; those are the transport's (or its caller's)
//! concern.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::{
    error::Error,
    exec::{Request, RequestMeta, Response, RouterExecutor},
};

/// The caller side of the transport: one invocation, one reply.
pub trait Transport: Send + Sync {
    fn invoke(&self, channel: &str, request: Request) -> BoxFuture<'static, Result<Response, Error>>;
}

/// The handler a [`Channel`] dispatches inbound requests to.
pub type ChannelHandler =
    Arc<dyn Fn(RequestMeta, Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// The receiver side of the transport: binds a handler to a channel name.
pub trait Channel: Send + Sync {
    fn handle(&self, channel: &str, handler: ChannelHandler);
}

/// Bind a [`RouterExecutor`] to one channel name on the receiver side of a
/// transport. Every inbound request on that channel runs one full request
/// lifecycle.
pub fn attach<TCtx>(channel: &str, executor: RouterExecutor<TCtx>, transport: &dyn Channel)
where
    TCtx: Send + Sync + 'static,
{
    let executor = Arc::new(executor);
    transport.handle(
        channel,
        Arc::new(move |meta, request| {
            let executor = executor.clone();
            Box::pin(async move { executor.execute(meta, request).await })
        }),
    );
}

#[derive(Default)]
struct Registry {
    handlers: RwLock<HashMap<String, ChannelHandler>>,
}

/// An in-process transport whose caller and receiver sides share one handler
/// registry. Each invocation is spawned onto the runtime, so a request that
/// never resolves blocks only its own caller.
#[derive(Clone)]
pub struct LocalTransport(Arc<Registry>);

/// Create a new in-process transport. Clone it to hand one end to the host
/// ([`Channel`]) and the other to the client ([`Transport`]).
pub fn local() -> LocalTransport {
    LocalTransport(Arc::new(Registry::default()))
}

impl Channel for LocalTransport {
    fn handle(&self, channel: &str, handler: ChannelHandler) {
        if let Ok(mut handlers) = self.0.handlers.write() {
            handlers.insert(channel.to_string(), handler);
        }
    }
}

impl Transport for LocalTransport {
    fn invoke(&self, channel: &str, request: Request) -> BoxFuture<'static, Result<Response, Error>> {
        let handler = match self.0.handlers.read() {
            Ok(handlers) => handlers.get(channel).cloned(),
            Err(_) => None,
        };
        let channel = channel.to_string();

        Box::pin(async move {
            let handler = handler
                .ok_or_else(|| Error::internal(format!("no handler bound to channel '{channel}'")))?;
            let meta = RequestMeta {
                channel: channel.into(),
                sender: None,
            };

            let (tx, rx) = oneshot::channel();
            tokio::spawn(async move {
                let _ = tx.send(handler(meta, request).await);
            });
            rx.await
                .map_err(|_| Error::internal("transport channel closed before a reply was sent"))
        })
    }
}
