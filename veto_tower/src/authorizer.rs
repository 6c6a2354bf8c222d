use std::fmt;

use tower_http::auth::AsyncRequireAuthorizationLayer;
use veto::{ActionName, Roles};

use crate::{context::ContextLayer, guard::CanGuard, DefaultFailureHandler};

/// Builder for generating guard layers over a [`Roles`] registry
///
/// The authorizer pairs a registry handle with a failure handler; every
/// guard it produces shares both. Because the registry handle is shared,
/// voters registered after a guard was built still take part in that
/// guard's decisions.
#[must_use]
pub struct Authorizer<Ctx, OnDeny> {
    roles: Roles<Ctx>,
    on_deny: OnDeny,
}

impl<Ctx, OnDeny> Clone for Authorizer<Ctx, OnDeny>
where
    OnDeny: Clone,
{
    fn clone(&self) -> Self {
        Self {
            roles: self.roles.clone(),
            on_deny: self.on_deny.clone(),
        }
    }
}

impl<Ctx, OnDeny> fmt::Debug for Authorizer<Ctx, OnDeny>
where
    OnDeny: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("roles", &self.roles)
            .field("on_deny", &self.on_deny)
            .finish()
    }
}

impl<Ctx> Authorizer<Ctx, ()> {
    /// Constructs a new authorizer over a registry, with no failure handler
    ///
    /// Attach one with [`with_error_handler`][Authorizer::with_error_handler]
    /// or [`with_default_error_handler`][Authorizer::with_default_error_handler]
    /// before building guards.
    #[inline]
    pub fn new(roles: Roles<Ctx>) -> Self {
        Self {
            roles,
            on_deny: (),
        }
    }
}

impl<Ctx, OnDeny> Authorizer<Ctx, OnDeny> {
    /// Attaches a custom handler to generate responses for rejected requests
    #[inline]
    pub fn with_error_handler<NewOnDeny>(self, on_deny: NewOnDeny) -> Authorizer<Ctx, NewOnDeny> {
        Authorizer {
            roles: self.roles,
            on_deny,
        }
    }

    /// Attaches the default handler: [`DefaultFailureHandler`]
    ///
    /// Denials become `403` responses with a content-negotiated
    /// `Access Denied` message; voter failures become empty `500`s.
    #[inline]
    pub fn with_default_error_handler<ResBody>(
        self,
    ) -> Authorizer<Ctx, DefaultFailureHandler<ResBody>> {
        Authorizer {
            roles: self.roles,
            on_deny: DefaultFailureHandler::new(),
        }
    }
}

impl<Ctx, OnDeny> Authorizer<Ctx, OnDeny>
where
    OnDeny: Clone,
{
    /// Guard layer permitting only requests allowed to perform `action`
    ///
    /// On denial the failure handler answers the request and the inner
    /// service is never invoked.
    pub fn can(&self, action: ActionName) -> AsyncRequireAuthorizationLayer<CanGuard<Ctx, OnDeny>> {
        self.can_any([action])
    }

    /// Alias of [`can`][Authorizer::can]
    #[inline]
    pub fn is(&self, action: ActionName) -> AsyncRequireAuthorizationLayer<CanGuard<Ctx, OnDeny>> {
        self.can(action)
    }

    /// Guard layer permitting requests allowed to perform any listed action
    ///
    /// Actions are evaluated in the order given with short-circuit on the
    /// first allowed. The denial message names every alternative, joined by
    /// `" or "`. An empty list always denies.
    pub fn can_any<I>(&self, actions: I) -> AsyncRequireAuthorizationLayer<CanGuard<Ctx, OnDeny>>
    where
        I: IntoIterator<Item = ActionName>,
    {
        AsyncRequireAuthorizationLayer::new(CanGuard::new(
            self.roles.clone(),
            actions.into_iter().collect(),
            self.on_deny.clone(),
        ))
    }

    /// Layer attaching a [`veto::RoleTester`] to each request's extensions
    ///
    /// See [`ContextLayer`].
    pub fn context_layer(&self) -> ContextLayer<Ctx> {
        ContextLayer::new(self.roles.clone())
    }
}
