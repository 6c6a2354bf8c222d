use std::{
    fmt,
    task::{Context, Poll},
};

use http::Request;
use tower_layer::Layer;
use tower_service::Service;
use veto::Roles;

/// Layer exposing ad-hoc role checks to request handlers
///
/// For each request carrying an authorization context of type `Ctx` in its
/// extensions, the wrapped service inserts a [`veto::RoleTester`] bound to
/// that context. Handlers can then extract the tester (with `axum`, via
/// `Extension<RoleTester<Ctx>>`) and run secondary checks that answer
/// true/false without rejecting the request. Requests without a context are
/// passed through untouched.
#[must_use]
pub struct ContextLayer<Ctx> {
    roles: Roles<Ctx>,
}

impl<Ctx> ContextLayer<Ctx> {
    pub(crate) fn new(roles: Roles<Ctx>) -> Self {
        Self { roles }
    }
}

impl<Ctx> Clone for ContextLayer<Ctx> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            roles: self.roles.clone(),
        }
    }
}

impl<Ctx> fmt::Debug for ContextLayer<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ContextLayer")
            .field("roles", &self.roles)
            .finish()
    }
}

impl<S, Ctx> Layer<S> for ContextLayer<Ctx> {
    type Service = AttachTester<S, Ctx>;

    fn layer(&self, inner: S) -> Self::Service {
        AttachTester {
            inner,
            roles: self.roles.clone(),
        }
    }
}

/// Service produced by [`ContextLayer`]
pub struct AttachTester<S, Ctx> {
    inner: S,
    roles: Roles<Ctx>,
}

impl<S, Ctx> Clone for AttachTester<S, Ctx>
where
    S: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            roles: self.roles.clone(),
        }
    }
}

impl<S, Ctx> fmt::Debug for AttachTester<S, Ctx>
where
    S: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AttachTester")
            .field("inner", &self.inner)
            .field("roles", &self.roles)
            .finish()
    }
}

impl<S, Ctx, B> Service<Request<B>> for AttachTester<S, Ctx>
where
    S: Service<Request<B>>,
    Ctx: Clone + Send + Sync + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        if let Some(ctx) = request.extensions().get::<Ctx>().cloned() {
            let _ = request.extensions_mut().insert(self.roles.tester(ctx));
        }
        self.inner.call(request)
    }
}
