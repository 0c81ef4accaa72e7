use std::{borrow::Cow, collections::BTreeMap, future::Future, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    error::ExecError,
    middleware::Handler,
    procedure::{self, Procedure},
};

/// An error collected while assembling a router.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("the key '{0}' is already registered in this scope")]
    DuplicateKey(String),
    #[error("a procedure or router key must be between 1 and 255 characters ('{0}')")]
    InvalidKeyLength(String),
    #[error("the key '{0}' contains '.' which is reserved as the path separator")]
    InvalidKeyChar(String),
}

/// Every node of the router tree is explicitly a procedure leaf or a nested
/// router; there is no ambiguous plain-value node.
pub enum RouterNode<TCtx> {
    Procedure(Procedure<TCtx>),
    Router(Router<TCtx>),
}

/// Assembles a [`Router`]. Key problems (duplicates, reserved characters) are
/// collected and reported together by [`RouterBuilder::build`] instead of
/// failing midway through a fluent chain.
pub struct RouterBuilder<TCtx> {
    nodes: BTreeMap<Cow<'static, str>, RouterNode<TCtx>>,
    errors: Vec<BuildError>,
}

impl<TCtx> Default for RouterBuilder<TCtx> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

impl<TCtx> RouterBuilder<TCtx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn procedure(
        mut self,
        key: impl Into<Cow<'static, str>>,
        procedure: Procedure<TCtx>,
    ) -> Self {
        let key = key.into();
        if self.check_key(&key) {
            self.nodes.insert(key, RouterNode::Procedure(procedure));
        }
        self
    }

    /// Nest another router under `key`. Its procedures become addressable as
    /// `key.<inner key>`.
    pub fn merge(mut self, key: impl Into<Cow<'static, str>>, other: RouterBuilder<TCtx>) -> Self {
        let key = key.into();
        if !self.check_key(&key) {
            return self;
        }
        match other.build() {
            Ok(router) => {
                self.nodes.insert(key, RouterNode::Router(router));
            }
            Err(mut errors) => self.errors.append(&mut errors),
        }
        self
    }

    pub fn build(self) -> Result<Router<TCtx>, Vec<BuildError>> {
        if self.errors.is_empty() {
            Ok(Router { nodes: self.nodes })
        } else {
            Err(self.errors)
        }
    }

    fn check_key(&mut self, key: &Cow<'static, str>) -> bool {
        if key.is_empty() || key.len() > 255 {
            self.errors.push(BuildError::InvalidKeyLength(key.to_string()));
            false
        } else if key.contains('.') {
            self.errors.push(BuildError::InvalidKeyChar(key.to_string()));
            false
        } else if self.nodes.contains_key(key.as_ref()) {
            self.errors.push(BuildError::DuplicateKey(key.to_string()));
            false
        } else {
            true
        }
    }
}

/// The immutable mapping from keys (optionally nested) to procedures exposed
/// under one transport channel name. Constructed once at startup and
/// read-only for the remainder of the process.
pub struct Router<TCtx> {
    nodes: BTreeMap<Cow<'static, str>, RouterNode<TCtx>>,
}

impl<TCtx> std::fmt::Debug for Router<TCtx> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("keys", &self.nodes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<TCtx> Router<TCtx> {
    /// Walk the tree along `segments`. Only a procedure leaf reached by the
    /// full path resolves; stopping early on a sub-router or walking through
    /// a leaf is a miss.
    pub(crate) fn resolve(&self, segments: &[&str]) -> Option<&Procedure<TCtx>> {
        let (first, rest) = segments.split_first()?;
        match self.nodes.get(*first)? {
            RouterNode::Procedure(procedure) if rest.is_empty() => Some(procedure),
            RouterNode::Router(router) if !rest.is_empty() => router.resolve(rest),
            _ => None,
        }
    }
}

/// The external handler map: resolver functions keyed by dotted path, used
/// for procedures that were finalized without an inline handler.
pub struct Handlers<TCtx> {
    map: BTreeMap<Cow<'static, str>, Handler<TCtx>>,
}

impl<TCtx> Default for Handlers<TCtx> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }
}

impl<TCtx: Send + Sync + 'static> Handlers<TCtx> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<TInput, TResult, TErr, F, Fut>(
        mut self,
        key: impl Into<Cow<'static, str>>,
        handler: F,
    ) -> Self
    where
        TInput: DeserializeOwned + Send + 'static,
        TResult: Serialize + Send + 'static,
        TErr: Into<ExecError> + Send + 'static,
        F: Fn(Arc<TCtx>, TInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TResult, TErr>> + Send + 'static,
    {
        self.map.insert(key.into(), procedure::erase(handler));
        self
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Handler<TCtx>> {
        self.map.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, schema};

    fn noop() -> Procedure<()> {
        Procedure::builder()
            .input(schema::json::<()>())
            .output(schema::json::<()>())
            .query(|_ctx, _input: ()| async move { Ok::<_, Error>(()) })
    }

    #[test]
    fn resolves_nested_paths() {
        let router = RouterBuilder::new()
            .procedure("ping", noop())
            .merge("user", RouterBuilder::new().procedure("getById", noop()))
            .build()
            .unwrap();

        assert!(router.resolve(&["ping"]).is_some());
        assert!(router.resolve(&["user", "getById"]).is_some());
        // A sub-router is not a callable leaf and a leaf has no children.
        assert!(router.resolve(&["user"]).is_none());
        assert!(router.resolve(&["ping", "extra"]).is_none());
        assert!(router.resolve(&["missing"]).is_none());
        assert!(router.resolve(&[]).is_none());
    }

    #[test]
    fn rejects_duplicate_keys_in_one_scope() {
        let errors = RouterBuilder::new()
            .procedure("a", noop())
            .procedure("a", noop())
            .build()
            .unwrap_err();
        assert_eq!(errors, vec![BuildError::DuplicateKey("a".into())]);
    }

    #[test]
    fn rejects_reserved_and_empty_keys() {
        let errors = RouterBuilder::new()
            .procedure("", noop())
            .procedure("a.b", noop())
            .build()
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                BuildError::InvalidKeyLength("".into()),
                BuildError::InvalidKeyChar("a.b".into()),
            ]
        );
    }
}
