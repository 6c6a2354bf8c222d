//! Voters and adapters for building them from plain functions
//!
//! A voter is any rule that can look at a request context and an action name
//! and cast a [`Decision`]. Voters are polled strictly sequentially, so a
//! voter is free to perform I/O or otherwise suspend; no voter after the
//! first definite vote is ever invoked.

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{ActionNameRef, Decision};

/// A type-erased error produced by a failing voter
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A rule that votes on whether a context may perform an action
///
/// Returning `Ok(Decision::Abstain)` casts no vote and lets evaluation
/// continue; returning `Err` aborts the evaluation entirely. A failure is
/// never converted into a denial: an authorization rule that cannot run is a
/// bug that should fail loudly, not a reason to silently reject (or admit)
/// a request.
#[async_trait]
pub trait Voter<Ctx>: Send + Sync {
    /// Casts this voter's vote for the given context and action
    async fn vote(&self, ctx: &Ctx, action: &ActionNameRef) -> Result<Decision, BoxError>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            #[async_trait]
            impl<Ctx, T> Voter<Ctx> for $ty
            where
                Ctx: Sync,
                T: Voter<Ctx> + ?Sized,
            {
                async fn vote(
                    &self,
                    ctx: &Ctx,
                    action: &ActionNameRef,
                ) -> Result<Decision, BoxError> {
                    T::vote(self, ctx, action).await
                }
            }
        )*
    }
}

delegate_impls!(
    Box<T>
    Arc<T>
);

/// Wraps an infallible synchronous function as a [`Voter`]
///
/// ```
/// use veto::{voter, Decision, Roles};
///
/// #[derive(Clone)]
/// struct Session { admin: bool }
///
/// let roles = Roles::new();
/// roles.register(voter::from_fn(|s: &Session, _| Decision::from(s.admin)));
/// ```
pub fn from_fn<Ctx, F>(f: F) -> FnVoter<F>
where
    F: Fn(&Ctx, &ActionNameRef) -> Decision,
{
    FnVoter(f)
}

/// Wraps a fallible synchronous function as a [`Voter`]
pub fn from_try_fn<Ctx, F>(f: F) -> TryFnVoter<F>
where
    F: Fn(&Ctx, &ActionNameRef) -> Result<Decision, BoxError>,
{
    TryFnVoter(f)
}

/// Wraps a function returning a future as a [`Voter`]
///
/// The function itself runs synchronously with access to the borrowed
/// context; the future it returns must be self-contained, so extract
/// whatever the asynchronous part needs before constructing it.
///
/// ```
/// use veto::{voter, Decision, Roles};
///
/// #[derive(Clone)]
/// struct Session { role: String }
///
/// let roles = Roles::new();
/// roles.register(voter::from_async_fn(|s: &Session, _| {
///     let role = s.role.clone();
///     async move {
///         // e.g. consult an external service here
///         Ok(Decision::from(role == "employee"))
///     }
/// }));
/// ```
pub fn from_async_fn<Ctx, F, Fut>(f: F) -> AsyncFnVoter<F>
where
    F: Fn(&Ctx, &ActionNameRef) -> Fut,
    Fut: Future<Output = Result<Decision, BoxError>>,
{
    AsyncFnVoter(f)
}

/// A [`Voter`] backed by an infallible synchronous function
pub struct FnVoter<F>(F);

#[async_trait]
impl<Ctx, F> Voter<Ctx> for FnVoter<F>
where
    Ctx: Sync,
    F: Fn(&Ctx, &ActionNameRef) -> Decision + Send + Sync,
{
    async fn vote(&self, ctx: &Ctx, action: &ActionNameRef) -> Result<Decision, BoxError> {
        Ok((self.0)(ctx, action))
    }
}

impl<F> fmt::Debug for FnVoter<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("FnVoter")
    }
}

/// A [`Voter`] backed by a fallible synchronous function
pub struct TryFnVoter<F>(F);

#[async_trait]
impl<Ctx, F> Voter<Ctx> for TryFnVoter<F>
where
    Ctx: Sync,
    F: Fn(&Ctx, &ActionNameRef) -> Result<Decision, BoxError> + Send + Sync,
{
    async fn vote(&self, ctx: &Ctx, action: &ActionNameRef) -> Result<Decision, BoxError> {
        (self.0)(ctx, action)
    }
}

impl<F> fmt::Debug for TryFnVoter<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("TryFnVoter")
    }
}

/// A [`Voter`] backed by a function returning a future
pub struct AsyncFnVoter<F>(F);

#[async_trait]
impl<Ctx, F, Fut> Voter<Ctx> for AsyncFnVoter<F>
where
    Ctx: Sync,
    F: Fn(&Ctx, &ActionNameRef) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Decision, BoxError>> + Send,
{
    async fn vote(&self, ctx: &Ctx, action: &ActionNameRef) -> Result<Decision, BoxError> {
        (self.0)(ctx, action).await
    }
}

impl<F> fmt::Debug for AsyncFnVoter<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AsyncFnVoter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionName;

    struct Ctx {
        admin: bool,
    }

    fn action(s: &str) -> ActionName {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn fn_voter_casts_the_functions_verdict() {
        let rule = from_fn(|c: &Ctx, _| Decision::from(c.admin));
        let vote = rule.vote(&Ctx { admin: true }, &action("x")).await.unwrap();
        assert_eq!(vote, Decision::Allow);

        let vote = rule.vote(&Ctx { admin: false }, &action("x")).await.unwrap();
        assert_eq!(vote, Decision::Deny);
    }

    #[tokio::test]
    async fn async_voter_resolves_after_suspension() {
        let rule = from_async_fn(|c: &Ctx, _| {
            let admin = c.admin;
            async move {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                Ok(Decision::from(admin))
            }
        });
        let vote = rule.vote(&Ctx { admin: true }, &action("x")).await.unwrap();
        assert_eq!(vote, Decision::Allow);
    }

    #[tokio::test]
    async fn try_voter_propagates_failure() {
        let rule = from_try_fn(|_: &Ctx, _| Err::<Decision, _>("backend unavailable".into()));
        let err = rule
            .vote(&Ctx { admin: true }, &action("x"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "backend unavailable");
    }

    #[tokio::test]
    async fn boxed_voters_delegate() {
        let rule: Box<dyn Voter<Ctx>> = Box::new(from_fn(|_: &Ctx, _| Decision::Allow));
        let vote = rule.vote(&Ctx { admin: false }, &action("x")).await.unwrap();
        assert_eq!(vote, Decision::Allow);
    }
}
