//! ripc: a typesafe RPC layer between a privileged host process and an
//! untrusted frontend.
//!
//! A host builds a [`Router`] of [`Procedure`]s (validated input/output plus
//! an ordered middleware chain), binds it to one named transport channel with
//! [`attach`], and a [`Client`] on the other side of the transport calls the
//! procedures as if they were local async functions. Every reply is the
//! uniform `{ data } | { error }` envelope; anything that fails host-side
//! outside the fixed error taxonomy is logged and masked before it crosses
//! the transport boundary.
#![warn(
    clippy::all,
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::panic_in_result_fn
)]
#![forbid(unsafe_code)]
#![allow(clippy::module_inception)]

mod client;
mod error;
mod exec;
mod middleware;
mod plugin;
pub mod plugins;
mod procedure;
mod router;
pub mod schema;
mod transport;

pub use client::Client;
pub use error::{Error, ErrorCode, ExecError};
pub use exec::{ContextFactory, Request, RequestMeta, Response, RouterExecutor};
pub use middleware::{Handler, Middleware, Next};
pub use plugin::Plugin;
pub use procedure::{Procedure, ProcedureBuilder, WithInput, WithOutput};
pub use router::{BuildError, Handlers, Router, RouterBuilder, RouterNode};
pub use schema::{Issue, Schema};
pub use transport::{attach, local, Channel, ChannelHandler, LocalTransport, Transport};
