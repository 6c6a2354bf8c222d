use std::{collections::HashMap, fmt, sync::Arc};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use thiserror::Error;

use crate::{
    voter::{BoxError, Voter},
    ActionName, ActionNameRef, Decision,
};

type ArcVoter<Ctx> = Arc<dyn Voter<Ctx>>;
type ActionTable<Ctx> = HashMap<ActionName, ArcVoter<Ctx>>;

/// A voter's computation failed while a decision was being made
///
/// The engine performs no recovery: the failure aborts the decision and is
/// surfaced to whatever invoked the evaluation. Voters registered after the
/// failing one are not consulted.
#[derive(Debug, Error)]
#[error("voter {index} failed while deciding action `{action}`")]
pub struct VoterError {
    action: ActionName,
    index: usize,
    #[source]
    source: BoxError,
}

impl VoterError {
    /// The action that was being decided when the voter failed
    #[inline]
    pub fn action(&self) -> &ActionNameRef {
        &self.action
    }

    /// The position of the failing voter in registration order
    #[inline]
    pub fn voter_index(&self) -> usize {
        self.index
    }
}

struct Inner<Ctx> {
    voters: ArcSwap<Vec<ArcVoter<Ctx>>>,
    actions: Arc<ArcSwap<ActionTable<Ctx>>>,
}

/// An ordered registry of voters and the decision engine polling them
///
/// `Roles` is a cheap handle over shared state: clones observe the same
/// registry, and registration takes `&self`, so the same handle can be held
/// by middleware and still accept late registrations. Voters registered
/// after a decision has begun are visible to subsequent decisions only.
///
/// Registration updates the ordered voter list and the named-voter table as
/// two separate atomic steps. Registering while decisions are in flight is
/// memory-safe, but a concurrent decision may observe one step and not the
/// other; synchronize externally if registration must appear atomic. The
/// intended pattern is to register during application setup.
///
/// Decisions are computed fresh on every evaluation and never cached.
#[must_use]
pub struct Roles<Ctx> {
    inner: Arc<Inner<Ctx>>,
}

impl<Ctx> Clone for Roles<Ctx> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Ctx> fmt::Debug for Roles<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Roles")
            .field("voters", &self.inner.voters.load().len())
            .field("actions", &self.inner.actions.load().len())
            .finish()
    }
}

impl<Ctx> Roles<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    /// Constructs an empty registry
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                voters: ArcSwap::from_pointee(Vec::new()),
                actions: Arc::new(ArcSwap::from_pointee(ActionTable::new())),
            }),
        }
    }

    /// Appends a global voter
    ///
    /// A global voter is consulted for every action, in registration order,
    /// and receives the action name so it can scope itself.
    pub fn register<V>(&self, voter: V)
    where
        V: Voter<Ctx> + 'static,
    {
        self.push(Arc::new(voter));
    }

    /// Registers a voter for a single named action
    ///
    /// The first registration for a name claims one slot in the ordered
    /// voter list; that slot abstains for every other action. A later
    /// registration for the same name replaces the rule behind the existing
    /// slot rather than adding a second one, so repeated overrides never
    /// slow a decision down, and the replacement governs every subsequent
    /// evaluation, including through guards built before the override.
    pub fn register_for<V>(&self, action: ActionName, voter: V)
    where
        V: Voter<Ctx> + 'static,
    {
        let voter: ArcVoter<Ctx> = Arc::new(voter);

        let mut replaced = false;
        self.inner.actions.rcu(|table| {
            let mut table = ActionTable::clone(table);
            replaced = table.insert(action.clone(), Arc::clone(&voter)).is_some();
            table
        });

        if replaced {
            tracing::trace!(action = %action, "replaced named voter");
            return;
        }

        tracing::trace!(action = %action, "registered named voter");
        self.push(Arc::new(ActionDispatcher {
            action,
            table: Arc::clone(&self.inner.actions),
        }));
    }

    /// The number of slots in the ordered voter list
    ///
    /// Named actions occupy one slot each regardless of how many times they
    /// have been overridden.
    pub fn voter_count(&self) -> usize {
        self.inner.voters.load().len()
    }

    /// Whether no voter has been registered yet
    pub fn is_empty(&self) -> bool {
        self.inner.voters.load().is_empty()
    }

    /// Decides whether `ctx` may perform `action`
    ///
    /// Voters are polled strictly sequentially in registration order, each
    /// awaited in turn; the first definite vote is returned and no later
    /// voter is invoked. If every voter abstains, the decision fails closed
    /// and `Ok(false)` is returned.
    ///
    /// A voter failure aborts the decision; see [`VoterError`].
    pub async fn evaluate(&self, ctx: &Ctx, action: &ActionNameRef) -> Result<bool, VoterError> {
        let voters = self.inner.voters.load_full();
        for (index, voter) in voters.iter().enumerate() {
            let vote = voter
                .vote(ctx, action)
                .await
                .map_err(|source| VoterError {
                    action: action.to_owned(),
                    index,
                    source,
                })?;

            match vote {
                Decision::Allow => {
                    tracing::trace!(%action, index, "voter allowed");
                    return Ok(true);
                }
                Decision::Deny => {
                    tracing::debug!(%action, index, "voter denied");
                    return Ok(false);
                }
                Decision::Abstain => {}
            }
        }

        tracing::debug!(%action, "no voter cast a definite vote; denying");
        Ok(false)
    }

    /// Decides whether `ctx` may perform any of the listed actions
    ///
    /// Actions are evaluated in the order given, short-circuiting on the
    /// first that is allowed. An empty list is always denied.
    pub async fn evaluate_any(
        &self,
        ctx: &Ctx,
        actions: &[ActionName],
    ) -> Result<bool, VoterError> {
        for action in actions {
            if self.evaluate(ctx, action).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Produces an ad-hoc tester bound to the given context
    ///
    /// The tester answers true/false only; unlike a guard, a negative answer
    /// triggers no failure handling, which makes it suitable for secondary,
    /// non-rejecting checks inside a request handler.
    pub fn tester(&self, ctx: Ctx) -> RoleTester<Ctx> {
        RoleTester {
            roles: self.clone(),
            ctx,
        }
    }

    fn push(&self, voter: ArcVoter<Ctx>) {
        self.inner.voters.rcu(|voters| {
            let mut voters = Vec::clone(voters);
            voters.push(Arc::clone(&voter));
            voters
        });
    }
}

impl<Ctx> Default for Roles<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// The voting slot claimed by the first named registration for an action
///
/// The table lookup happens at evaluation time, not registration time, so a
/// later override for the same name takes effect retroactively for the slot
/// already in the ordered list.
struct ActionDispatcher<Ctx> {
    action: ActionName,
    table: Arc<ArcSwap<ActionTable<Ctx>>>,
}

#[async_trait]
impl<Ctx> Voter<Ctx> for ActionDispatcher<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    async fn vote(&self, ctx: &Ctx, action: &ActionNameRef) -> Result<Decision, BoxError> {
        if self.action.as_str() != action.as_str() {
            return Ok(Decision::Abstain);
        }

        let entry = self.table.load().get(&self.action).cloned();
        match entry {
            Some(voter) => voter.vote(ctx, action).await,
            None => Ok(Decision::Abstain),
        }
    }
}

/// An ad-hoc role check bound to one request's context
///
/// Produced by [`Roles::tester`]; usable wherever a plain boolean answer is
/// wanted without a guard's reject-with-response behavior.
#[must_use]
pub struct RoleTester<Ctx> {
    roles: Roles<Ctx>,
    ctx: Ctx,
}

impl<Ctx> Clone for RoleTester<Ctx>
where
    Ctx: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            roles: self.roles.clone(),
            ctx: self.ctx.clone(),
        }
    }
}

impl<Ctx> fmt::Debug for RoleTester<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RoleTester")
            .field("roles", &self.roles)
            .finish()
    }
}

impl<Ctx> RoleTester<Ctx>
where
    Ctx: Send + Sync + 'static,
{
    /// Decides whether the bound context may perform `action`
    pub async fn can(&self, action: &ActionNameRef) -> Result<bool, VoterError> {
        self.roles.evaluate(&self.ctx, action).await
    }

    /// Alias of [`can`][RoleTester::can]
    pub async fn is(&self, action: &ActionNameRef) -> Result<bool, VoterError> {
        self.can(action).await
    }

    /// The context this tester is bound to
    #[inline]
    pub fn context(&self) -> &Ctx {
        &self.ctx
    }
}
