use std::{
    future::Future,
    sync::{
        atomic::{AtomicIsize, Ordering},
        Arc,
    },
};

use futures::future::{ready, BoxFuture};
use serde_json::Value;

use crate::error::ExecError;

/// A type-erased terminal handler: the innermost stage of the chain.
///
/// Handlers are built from typed resolver functions by the procedure builder
/// or a [`Handlers`](crate::Handlers) map, both of which erase the input and
/// output types down to [`Value`].
pub type Handler<TCtx> =
    Arc<dyn Fn(Arc<TCtx>, Value) -> BoxFuture<'static, Result<Value, ExecError>> + Send + Sync>;

type MiddlewareFn<TCtx> = Arc<
    dyn Fn(Arc<TCtx>, Value, Next<TCtx>) -> BoxFuture<'static, Result<Value, ExecError>>
        + Send
        + Sync,
>;

/// Composable pre/post logic wrapped around a handler.
///
/// A middleware receives the per-request context, the validated input and a
/// [`Next`] continuation. Returning without invoking `next` short-circuits
/// the chain (e.g. a policy rejection returning `Err(Error::forbidden())`).
pub struct Middleware<TCtx>(MiddlewareFn<TCtx>);

impl<TCtx> Clone for Middleware<TCtx> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<TCtx: Send + Sync + 'static> Middleware<TCtx> {
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Arc<TCtx>, Value, Next<TCtx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ExecError>> + Send + 'static,
    {
        Self(Arc::new(move |ctx, input, next| {
            Box::pin(func(ctx, input, next))
        }))
    }
}

struct Chain<TCtx> {
    middlewares: Vec<Middleware<TCtx>>,
    handler: Handler<TCtx>,
    ctx: Arc<TCtx>,
    input: Value,
    // Highest stage dispatched so far. Each stage may be entered at most once.
    cursor: AtomicIsize,
}

/// The single-use continuation handed to each middleware.
///
/// The chain keeps one monotonically increasing cursor per request, so
/// invoking the same `Next` a second time fails with
/// [`ExecError::NextCalledMultipleTimes`] before any stage runs again. That
/// failure signals a programming error in the middleware, not a bad request.
pub struct Next<TCtx> {
    chain: Arc<Chain<TCtx>>,
    index: usize,
}

impl<TCtx> Clone for Next<TCtx> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            index: self.index,
        }
    }
}

impl<TCtx: Send + Sync + 'static> Next<TCtx> {
    pub async fn exec(&self) -> Result<Value, ExecError> {
        dispatch(self.chain.clone(), self.index).await
    }
}

/// Run `middlewares` around `handler` in strict onion order: the first
/// middleware is outermost, the last is closest to the handler. An empty list
/// runs the handler directly.
pub(crate) fn execute<TCtx: Send + Sync + 'static>(
    middlewares: &[Middleware<TCtx>],
    ctx: Arc<TCtx>,
    input: Value,
    handler: Handler<TCtx>,
) -> BoxFuture<'static, Result<Value, ExecError>> {
    let chain = Arc::new(Chain {
        middlewares: middlewares.to_vec(),
        handler,
        ctx,
        input,
        cursor: AtomicIsize::new(-1),
    });
    dispatch(chain, 0)
}

fn dispatch<TCtx: Send + Sync + 'static>(
    chain: Arc<Chain<TCtx>>,
    index: usize,
) -> BoxFuture<'static, Result<Value, ExecError>> {
    let prev = chain.cursor.fetch_max(index as isize, Ordering::SeqCst);
    if prev >= index as isize {
        return Box::pin(ready(Err(ExecError::NextCalledMultipleTimes)));
    }

    match chain.middlewares.get(index) {
        Some(mw) => {
            let next = Next {
                chain: chain.clone(),
                index: index + 1,
            };
            (mw.0)(chain.ctx.clone(), chain.input.clone(), next)
        }
        None => (chain.handler)(chain.ctx.clone(), chain.input.clone()),
    }
}
