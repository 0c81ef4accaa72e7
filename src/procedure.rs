use std::{future::Future, marker::PhantomData, sync::Arc};

use futures::future::{ready, BoxFuture};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    error::ExecError,
    middleware::{Handler, Middleware},
    schema::Schema,
};

/// A single named remote operation: input schema, output schema, an ordered
/// middleware list and optionally an inline handler.
///
/// Immutable once built. A procedure finalized with
/// [`WithOutput::build`] carries no inline handler and is resolved against
/// the [`Handlers`](crate::Handlers) map at dispatch time; one finalized with
/// [`WithOutput::query`] or [`WithOutput::mutation`] carries its handler
/// inline, which takes precedence over any map entry for the same key.
pub struct Procedure<TCtx> {
    pub(crate) input: Arc<dyn Schema>,
    pub(crate) output: Arc<dyn Schema>,
    pub(crate) middlewares: Vec<Middleware<TCtx>>,
    pub(crate) handler: Option<Handler<TCtx>>,
}

impl<TCtx> Procedure<TCtx> {
    pub const fn builder() -> ProcedureBuilder<TCtx> {
        ProcedureBuilder(PhantomData)
    }
}

/// Entry point of the staged procedure builder.
///
/// The stages are enforced by the type system: an input schema must be
/// declared before an output schema, and an output schema before middleware
/// or a handler can be attached. Finalizers take the builder by value, so a
/// builder cannot be reused and every produced procedure owns its own
/// middleware list.
///
/// ```rust
/// use ripc::{schema, Error, Procedure};
///
/// const T: ripc::ProcedureBuilder<()> = Procedure::builder();
///
/// let get_answer = T
///     .input(schema::json::<()>())
///     .output(schema::json::<u32>())
///     .query(|_ctx, _input: ()| async move { Ok::<_, Error>(42) });
/// ```
pub struct ProcedureBuilder<TCtx>(PhantomData<fn() -> TCtx>);

impl<TCtx> Clone for ProcedureBuilder<TCtx> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<TCtx> Copy for ProcedureBuilder<TCtx> {}

impl<TCtx> Default for ProcedureBuilder<TCtx> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TCtx> ProcedureBuilder<TCtx> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }

    pub fn input(self, schema: impl Schema + 'static) -> WithInput<TCtx> {
        WithInput {
            input: Arc::new(schema),
            phantom: PhantomData,
        }
    }
}

/// Builder stage after the input schema has been declared.
pub struct WithInput<TCtx> {
    input: Arc<dyn Schema>,
    phantom: PhantomData<fn() -> TCtx>,
}

impl<TCtx> WithInput<TCtx> {
    pub fn output(self, schema: impl Schema + 'static) -> WithOutput<TCtx> {
        WithOutput {
            input: self.input,
            output: Arc::new(schema),
            middlewares: Vec::new(),
        }
    }
}

/// Builder stage after both schemas have been declared; middleware and a
/// handler may now be attached.
pub struct WithOutput<TCtx> {
    input: Arc<dyn Schema>,
    output: Arc<dyn Schema>,
    middlewares: Vec<Middleware<TCtx>>,
}

impl<TCtx: Send + Sync + 'static> WithOutput<TCtx> {
    /// Attach a middleware. Middleware run in attachment order; the last one
    /// attached is innermost, closest to the handler.
    pub fn with(mut self, middleware: Middleware<TCtx>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Finalize without an inline handler. The handler is looked up in the
    /// external [`Handlers`](crate::Handlers) map at dispatch time.
    pub fn build(self) -> Procedure<TCtx> {
        Procedure {
            input: self.input,
            output: self.output,
            middlewares: self.middlewares,
            handler: None,
        }
    }

    /// Finalize with an inline handler.
    pub fn query<TInput, TResult, TErr, F, Fut>(self, handler: F) -> Procedure<TCtx>
    where
        TInput: DeserializeOwned + Send + 'static,
        TResult: Serialize + Send + 'static,
        TErr: Into<ExecError> + Send + 'static,
        F: Fn(Arc<TCtx>, TInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResult, TErr>> + Send + 'static,
    {
        self.resolver(handler)
    }

    /// Finalize with an inline handler. Identical in effect to
    /// [`WithOutput::query`]; the two names exist so call sites read like
    /// what they do.
    pub fn mutation<TInput, TResult, TErr, F, Fut>(self, handler: F) -> Procedure<TCtx>
    where
        TInput: DeserializeOwned + Send + 'static,
        TResult: Serialize + Send + 'static,
        TErr: Into<ExecError> + Send + 'static,
        F: Fn(Arc<TCtx>, TInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResult, TErr>> + Send + 'static,
    {
        self.resolver(handler)
    }

    fn resolver<TInput, TResult, TErr, F, Fut>(self, handler: F) -> Procedure<TCtx>
    where
        TInput: DeserializeOwned + Send + 'static,
        TResult: Serialize + Send + 'static,
        TErr: Into<ExecError> + Send + 'static,
        F: Fn(Arc<TCtx>, TInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResult, TErr>> + Send + 'static,
    {
        Procedure {
            input: self.input,
            output: self.output,
            middlewares: self.middlewares,
            handler: Some(erase(handler)),
        }
    }
}

/// Erase a typed resolver into a [`Handler`] operating on raw [`Value`]s.
///
/// The input reaching the handler has already passed the procedure's input
/// schema, so a deserialization failure here is a host programming error
/// (schema and resolver types out of sync) and is masked as `INTERNAL`.
pub(crate) fn erase<TCtx, TInput, TResult, TErr, F, Fut>(handler: F) -> Handler<TCtx>
where
    TCtx: Send + Sync + 'static,
    TInput: DeserializeOwned + Send + 'static,
    TResult: Serialize + Send + 'static,
    TErr: Into<ExecError> + Send + 'static,
    F: Fn(Arc<TCtx>, TInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TResult, TErr>> + Send + 'static,
{
    Arc::new(
        move |ctx, input| -> BoxFuture<'static, Result<Value, ExecError>> {
            match serde_json::from_value::<TInput>(input) {
                Ok(input) => {
                    let fut = handler(ctx, input);
                    Box::pin(async move {
                        let output = fut.await.map_err(Into::into)?;
                        serde_json::to_value(output).map_err(ExecError::unexpected)
                    })
                }
                Err(err) => Box::pin(ready(Err(ExecError::unexpected(err)))),
            }
        },
    )
}
