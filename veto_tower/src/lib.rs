//! Tower middleware that guards requests with [`veto`] voter decisions.
//!
//! An [`Authorizer`] wraps a [`veto::Roles`] registry and produces guard
//! layers for use with `tower_http`-compatible stacks such as `axum`. Each
//! guard is fixed to one action (or a list of alternatives): when a request
//! arrives, the registry's voters are polled in order and the request either
//! proceeds to the inner service or is answered by the configured failure
//! handler.
//!
//! The request's authorization context is read from the request extensions:
//! whatever middleware authenticates the request (session lookup, token
//! verification, ...) inserts a context value of type `Ctx`, and the guard
//! hands that same value to every voter. Requests without a context are
//! rejected.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use veto::{voter, Decision, Roles};
//! use veto_tower::Authorizer;
//!
//! #[derive(Clone, Debug)]
//! struct Visitor {
//!     role: Option<String>,
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roles = Roles::new();
//! roles.register_for(
//!     "access home page".parse()?,
//!     voter::from_fn(|_: &Visitor, _| Decision::Allow),
//! );
//! roles.register_for(
//!     "access admin page".parse()?,
//!     voter::from_fn(|v: &Visitor, _| Decision::from(v.role.as_deref() == Some("admin"))),
//! );
//!
//! let authorizer = Authorizer::new(roles)
//!     .with_default_error_handler::<axum::body::Body>();
//!
//! let app: Router = Router::new()
//!     .route(
//!         "/",
//!         get(|| async { "home" }).route_layer(authorizer.can("access home page".parse()?)),
//!     )
//!     .route(
//!         "/admin",
//!         get(|| async { "admin" }).route_layer(authorizer.can("access admin page".parse()?)),
//!     )
//!     // Handlers can run ad-hoc checks through the attached tester.
//!     .layer(authorizer.context_layer());
//! # let _ = app;
//! # Ok(())
//! # }
//! ```
//!
//! See the `examples` folder in the repository for a complete `axum` server.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;

mod authorizer;
mod context;
mod guard;
pub mod util;

pub use crate::authorizer::Authorizer;
pub use crate::context::{AttachTester, ContextLayer};
pub use crate::guard::{CanGuard, OnDenied};

/// Default responder for authorization failures
///
/// Denials are answered with a `403 Forbidden` carrying an
/// `Access Denied - You don't have permission to: <action>` message,
/// rendered as JSON or plain text depending on the request's `Accept`
/// header. Voter failures are answered with an empty `500`.
pub struct DefaultFailureHandler<ResBody> {
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> DefaultFailureHandler<ResBody> {
    /// Instantiates a new instance over a given body type
    #[inline]
    pub fn new() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> fmt::Debug for DefaultFailureHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("DefaultFailureHandler")
    }
}

impl<ResBody> Default for DefaultFailureHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Clone for DefaultFailureHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        Self { _ty: PhantomData }
    }
}

impl<ResBody> Copy for DefaultFailureHandler<ResBody> {}
