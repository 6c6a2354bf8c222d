use std::{fmt, future::Future, pin::Pin, sync::Arc};

use bytes::Bytes;
use http::{HeaderMap, Request, Response, StatusCode};
use tower_http::auth::AsyncAuthorizeRequest;
use veto::{ActionName, Roles, VoterError};

use crate::{util, DefaultFailureHandler};

/// A guard fixing one action (or a list of alternatives) for a route
///
/// The guard reads the request's authorization context of type `Ctx` from
/// the request extensions, asks the [`Roles`] registry to evaluate its
/// action against that context, and either lets the request through to the
/// inner service or answers it with the configured [`OnDenied`] handler.
/// Voters run asynchronously; the inner service is never polled for a
/// rejected request.
pub struct CanGuard<Ctx, OnDeny> {
    roles: Roles<Ctx>,
    actions: Arc<[ActionName]>,
    label: Arc<str>,
    on_deny: OnDeny,
}

impl<Ctx, OnDeny> CanGuard<Ctx, OnDeny> {
    pub(crate) fn new(roles: Roles<Ctx>, actions: Vec<ActionName>, on_deny: OnDeny) -> Self {
        let label = actions
            .iter()
            .map(|a| a.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        Self {
            roles,
            actions: actions.into(),
            label: label.into(),
            on_deny,
        }
    }
}

impl<Ctx, OnDeny> Clone for CanGuard<Ctx, OnDeny>
where
    OnDeny: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            roles: self.roles.clone(),
            actions: Arc::clone(&self.actions),
            label: Arc::clone(&self.label),
            on_deny: self.on_deny.clone(),
        }
    }
}

impl<Ctx, OnDeny> fmt::Debug for CanGuard<Ctx, OnDeny>
where
    OnDeny: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CanGuard")
            .field("actions", &self.actions)
            .field("on_deny", &self.on_deny)
            .finish()
    }
}

impl<Ctx, OnDeny, B> AsyncAuthorizeRequest<B> for CanGuard<Ctx, OnDeny>
where
    Ctx: Clone + Send + Sync + 'static,
    OnDeny: OnDenied + Clone + Send + Sync + 'static,
    OnDeny::Body: Send + 'static,
    B: Send + 'static,
{
    type RequestBody = B;
    type ResponseBody = OnDeny::Body;
    type Future =
        Pin<Box<dyn Future<Output = Result<Request<B>, Response<OnDeny::Body>>> + Send>>;

    fn authorize(&mut self, request: Request<B>) -> Self::Future {
        let roles = self.roles.clone();
        let actions = Arc::clone(&self.actions);
        let label = Arc::clone(&self.label);
        let on_deny = self.on_deny.clone();

        Box::pin(async move {
            let ctx = match request.extensions().get::<Ctx>() {
                Some(ctx) => ctx.clone(),
                None => {
                    tracing::debug!(action = %label, "no authorization context on request");
                    return Err(on_deny.on_missing_context());
                }
            };

            match roles.evaluate_any(&ctx, &actions).await {
                Ok(true) => Ok(request),
                Ok(false) => {
                    tracing::debug!(action = %label, "access denied");
                    Err(on_deny.on_denied(request.headers(), &label))
                }
                Err(error) => {
                    tracing::error!(action = %label, %error, "voter failed during evaluation");
                    Err(on_deny.on_voter_failure(error))
                }
            }
        })
    }
}

/// Handler for responding to requests rejected by a guard
pub trait OnDenied {
    /// The body type returned on a rejection
    type Body;

    /// Response when the request carries no authorization context
    ///
    /// This happens when no earlier middleware inserted the expected
    /// context value into the request extensions.
    fn on_missing_context(&self) -> Response<Self::Body>;

    /// Response when the voters denied the action
    ///
    /// `action` is the guarded action name, or the names joined by `" or "`
    /// for a multi-action guard.
    fn on_denied(&self, headers: &HeaderMap, action: &str) -> Response<Self::Body>;

    /// Response when a voter failed while the decision was being made
    ///
    /// This is an error, not a denial: the evaluation was aborted and no
    /// verdict exists.
    fn on_voter_failure(&self, error: VoterError) -> Response<Self::Body>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> OnDenied for $ty
            where
                T: OnDenied,
            {
                type Body = T::Body;

                fn on_missing_context(&self) -> Response<Self::Body> {
                    T::on_missing_context(self)
                }

                fn on_denied(&self, headers: &HeaderMap, action: &str) -> Response<Self::Body> {
                    T::on_denied(self, headers, action)
                }

                fn on_voter_failure(&self, error: VoterError) -> Response<Self::Body> {
                    T::on_voter_failure(self, error)
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    std::rc::Rc<T>
    Arc<T>
);

impl<ResBody> OnDenied for DefaultFailureHandler<ResBody>
where
    ResBody: From<Bytes> + Default,
{
    type Body = ResBody;

    #[inline]
    fn on_missing_context(&self) -> Response<Self::Body> {
        util::empty_status(StatusCode::FORBIDDEN)
    }

    #[inline]
    fn on_denied(&self, headers: &HeaderMap, action: &str) -> Response<Self::Body> {
        util::access_denied(headers, action)
    }

    #[inline]
    fn on_voter_failure(&self, _: VoterError) -> Response<Self::Body> {
        util::empty_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use http::header;
    use http_body_util::{BodyExt, Full};
    use tower::{Layer, ServiceExt};
    use veto::{voter, Decision};

    use super::*;
    use crate::Authorizer;

    #[derive(Clone, Debug, Default)]
    struct Query {
        role: Option<String>,
    }

    fn with_role(role: &str) -> Query {
        Query {
            role: Some(role.to_owned()),
        }
    }

    fn action(s: &str) -> ActionName {
        s.parse().unwrap()
    }

    fn test_roles() -> Roles<Query> {
        let roles = Roles::new();

        roles.register_for(action("every one"), voter::from_fn(|_: &Query, _| Decision::Allow));

        roles.register_for(
            action("user or admin"),
            voter::from_async_fn(|q: &Query, _| {
                let role = q.role.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    let role = role.as_deref();
                    Ok(Decision::from(role == Some("user") || role == Some("admin")))
                }
            }),
        );

        roles.register_for(
            action("user"),
            voter::from_fn(|q: &Query, _| Decision::from(q.role.as_deref() == Some("user"))),
        );
        roles.register_for(
            action("friend"),
            voter::from_fn(|q: &Query, _| Decision::from(q.role.as_deref() == Some("bar"))),
        );

        roles
    }

    fn request(ctx: Option<Query>, accept: Option<&str>) -> Request<Full<Bytes>> {
        let mut builder = Request::get("/");
        if let Some(accept) = accept {
            builder = builder.header(header::ACCEPT, accept);
        }
        let mut request = builder.body(Full::<Bytes>::default()).unwrap();
        if let Some(ctx) = ctx {
            request.extensions_mut().insert(ctx);
        }
        request
    }

    async fn run(
        roles: &Roles<Query>,
        guarded: &[&str],
        req: Request<Full<Bytes>>,
        inner_calls: &Arc<AtomicUsize>,
    ) -> Response<Full<Bytes>> {
        let authorizer = Authorizer::new(roles.clone())
            .with_default_error_handler::<Full<Bytes>>();
        let layer = authorizer.can_any(guarded.iter().map(|a| action(a)));

        let inner_calls = Arc::clone(inner_calls);
        let service = layer.layer(tower::service_fn(move |_req: Request<Full<Bytes>>| {
            let inner_calls = Arc::clone(&inner_calls);
            async move {
                inner_calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(Response::new(Full::from("passed")))
            }
        }));

        service.oneshot(req).await.unwrap()
    }

    async fn body_json(resp: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn guard_passes_allowed_requests_to_the_inner_service() {
        let roles = test_roles();
        let calls = Arc::new(AtomicUsize::new(0));

        let resp = run(&roles, &["every one"], request(Some(Query::default()), None), &calls).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denied_request_gets_the_default_json_body() {
        let roles = test_roles();
        let calls = Arc::new(AtomicUsize::new(0));

        let resp = run(
            &roles,
            &["user or admin"],
            request(Some(with_role("guest")), Some("application/json")),
            &calls,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({
                "message": "Access Denied - You don't have permission to: user or admin"
            })
        );
    }

    #[tokio::test]
    async fn denied_request_gets_plain_text_when_json_is_not_accepted() {
        let roles = test_roles();
        let calls = Arc::new(AtomicUsize::new(0));

        let resp = run(
            &roles,
            &["user or admin"],
            request(Some(with_role("guest")), Some("text/html")),
            &calls,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            bytes,
            "Access Denied - You don't have permission to: user or admin"
        );
    }

    #[tokio::test]
    async fn allowed_after_suspension() {
        let roles = test_roles();
        let calls = Arc::new(AtomicUsize::new(0));

        let resp = run(
            &roles,
            &["user or admin"],
            request(Some(with_role("admin")), None),
            &calls,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn multi_action_guard_is_allowed_by_either_action() {
        let roles = test_roles();

        for role in ["user", "bar"] {
            let calls = Arc::new(AtomicUsize::new(0));
            let resp = run(
                &roles,
                &["user", "friend"],
                request(Some(with_role(role)), None),
                &calls,
            )
            .await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let resp = run(
            &roles,
            &["user", "friend"],
            request(Some(with_role("stranger")), None),
            &calls,
        )
        .await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({
                "message": "Access Denied - You don't have permission to: user or friend"
            })
        );
    }

    #[tokio::test]
    async fn override_governs_guarded_requests() {
        let roles = test_roles();

        // `friend` was registered for "bar"; override it.
        roles.register_for(
            action("friend"),
            voter::from_fn(|q: &Query, _| Decision::from(q.role.as_deref() == Some("baz"))),
        );

        let calls = Arc::new(AtomicUsize::new(0));
        let resp = run(&roles, &["friend"], request(Some(with_role("baz")), None), &calls).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = run(&roles, &["friend"], request(Some(with_role("bar")), None), &calls).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_context_is_rejected_without_running_voters() {
        let roles = test_roles();
        let calls = Arc::new(AtomicUsize::new(0));

        let resp = run(&roles, &["every one"], request(None, None), &calls).await;

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn voter_failure_surfaces_as_a_server_error() {
        let roles: Roles<Query> = Roles::new();
        roles.register(voter::from_try_fn(|_: &Query, _| {
            Err::<Decision, _>("role backend unavailable".into())
        }));

        let calls = Arc::new(AtomicUsize::new(0));
        let resp = run(&roles, &["anything"], request(Some(Query::default()), None), &calls).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failure_handler_is_invoked_exactly_once_per_denial() {
        #[derive(Clone, Debug)]
        struct CountingHandler {
            denials: Arc<AtomicUsize>,
        }

        impl OnDenied for CountingHandler {
            type Body = Full<Bytes>;

            fn on_missing_context(&self) -> Response<Self::Body> {
                util::empty_status(StatusCode::FORBIDDEN)
            }

            fn on_denied(&self, _: &HeaderMap, _: &str) -> Response<Self::Body> {
                self.denials.fetch_add(1, Ordering::SeqCst);
                util::empty_status(StatusCode::FORBIDDEN)
            }

            fn on_voter_failure(&self, _: VoterError) -> Response<Self::Body> {
                util::empty_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }

        let roles = test_roles();
        let denials = Arc::new(AtomicUsize::new(0));
        let authorizer = Authorizer::new(roles).with_error_handler(CountingHandler {
            denials: Arc::clone(&denials),
        });

        let inner_calls = Arc::new(AtomicUsize::new(0));
        let inner_count = Arc::clone(&inner_calls);
        let service = authorizer.can(action("user")).layer(tower::service_fn(
            move |_req: Request<Full<Bytes>>| {
                let inner_count = Arc::clone(&inner_count);
                async move {
                    inner_count.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(Response::new(Full::<Bytes>::default()))
                }
            },
        ));

        let resp = service
            .oneshot(request(Some(with_role("guest")), None))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(denials.load(Ordering::SeqCst), 1);
        assert_eq!(inner_calls.load(Ordering::SeqCst), 0);
    }
}
