//! Reconciliation of desired state against the current match.
//!
//! A reconciler knows how to resolve the current resource for a desired
//! state and how to create, update or delete it. [`reconcile`] drives the
//! decision:
//! - apply, nothing resolved → create, then re-resolve
//! - apply, already in desired state → no provider mutation
//! - apply, differs → update, then re-resolve
//! - remove, nothing resolved → no-op
//! - remove, resolved → delete (benign provider conditions are success)

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{HandlerError, ProviderError, Result};
use crate::wait::{WaitOutcome, Waiter};

/// What the caller wants done with the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Apply,
    Remove,
}

/// An accepted mutation. `change_id` is set when the provider reports an
/// asynchronous change that can be polled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutation {
    pub change_id: Option<String>,
}

impl Mutation {
    pub fn applied() -> Self {
        Self::default()
    }

    pub fn pending(change_id: impl Into<String>) -> Self {
        Self {
            change_id: Some(change_id.into()),
        }
    }
}

/// Result of a reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<C> {
    /// Already in desired state; nothing was changed.
    Unchanged(C),
    Created(C),
    Updated(C),
    /// Deleted; carries the record as it was before deletion.
    Removed(C),
    /// Nothing to remove.
    Absent,
}

impl<C> Outcome<C> {
    /// The authoritative record, if the resource exists (or existed).
    pub fn resource(&self) -> Option<&C> {
        match self {
            Outcome::Unchanged(c) | Outcome::Created(c) | Outcome::Updated(c) | Outcome::Removed(c) => {
                Some(c)
            }
            Outcome::Absent => None,
        }
    }

    /// True if a mutating provider call was issued.
    pub fn mutated(&self) -> bool {
        matches!(
            self,
            Outcome::Created(_) | Outcome::Updated(_) | Outcome::Removed(_)
        )
    }
}

/// Trait for resource reconcilers.
#[async_trait]
pub trait Reconciler: Send + Sync {
    /// Caller-supplied target configuration.
    type Desired: Send + Sync;
    /// Current provider record.
    type Current: Send;

    /// Human-readable description used in logs and timeout messages.
    fn describe(&self, desired: &Self::Desired) -> String;

    /// Find the current record for `desired`, if any.
    async fn resolve(&self, desired: &Self::Desired) -> Result<Option<Self::Current>>;

    /// Whether `current` already matches `desired`.
    fn in_desired_state(&self, desired: &Self::Desired, current: &Self::Current) -> bool;

    async fn create(&self, desired: &Self::Desired) -> std::result::Result<Mutation, ProviderError>;

    async fn update(
        &self,
        desired: &Self::Desired,
        current: &Self::Current,
    ) -> std::result::Result<Mutation, ProviderError>;

    async fn delete(
        &self,
        desired: &Self::Desired,
        current: &Self::Current,
    ) -> std::result::Result<Mutation, ProviderError>;

    /// Delete failures that mean "nothing left to do".
    fn is_benign_delete_error(&self, _error: &ProviderError) -> bool {
        false
    }

    /// Whether an asynchronous change has become visible.
    async fn is_converged(&self, _change_id: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Drive `reconciler` toward `desired`.
///
/// With a `waiter`, mutations that report a change id are polled until the
/// provider considers them converged.
pub async fn reconcile<R: Reconciler>(
    reconciler: &R,
    desired: &R::Desired,
    operation: Operation,
    waiter: Option<&Waiter>,
) -> Result<Outcome<R::Current>> {
    let label = reconciler.describe(desired);
    let current = reconciler.resolve(desired).await?;

    match (operation, current) {
        (Operation::Apply, None) => {
            info!(resource = %label, "Creating");
            let mutation = reconciler.create(desired).await?;
            settle(reconciler, &label, &mutation, waiter).await?;
            re_resolve(reconciler, desired, &label).await.map(Outcome::Created)
        }
        (Operation::Apply, Some(current)) if reconciler.in_desired_state(desired, &current) => {
            info!(resource = %label, "Already in desired state, nothing to do");
            Ok(Outcome::Unchanged(current))
        }
        (Operation::Apply, Some(current)) => {
            info!(resource = %label, "Updating");
            let mutation = reconciler.update(desired, &current).await?;
            settle(reconciler, &label, &mutation, waiter).await?;
            re_resolve(reconciler, desired, &label).await.map(Outcome::Updated)
        }
        (Operation::Remove, None) => {
            info!(resource = %label, "Does not exist, nothing to remove");
            Ok(Outcome::Absent)
        }
        (Operation::Remove, Some(current)) => {
            info!(resource = %label, "Deleting");
            match reconciler.delete(desired, &current).await {
                Ok(mutation) => settle(reconciler, &label, &mutation, waiter).await?,
                Err(e) if reconciler.is_benign_delete_error(&e) => {
                    info!(resource = %label, code = %e.code, "{}, nothing to do", e.message);
                }
                Err(e) => return Err(e.into()),
            }
            Ok(Outcome::Removed(current))
        }
    }
}

async fn settle<R: Reconciler>(
    reconciler: &R,
    label: &str,
    mutation: &Mutation,
    waiter: Option<&Waiter>,
) -> Result<()> {
    let (Some(waiter), Some(change_id)) = (waiter, mutation.change_id.as_deref()) else {
        return Ok(());
    };

    info!(resource = %label, change = %change_id, "Waiting for change to converge");
    match waiter.wait(|| reconciler.is_converged(change_id)).await? {
        WaitOutcome::Converged { ticks } => {
            info!(resource = %label, ticks, "Change converged");
            Ok(())
        }
        WaitOutcome::TimedOut { ticks } => {
            warn!(resource = %label, ticks, "Timed out waiting for change");
            Err(HandlerError::Timeout(format!(
                "Timed out waiting for {label}, aborting."
            )))
        }
    }
}

async fn re_resolve<R: Reconciler>(
    reconciler: &R,
    desired: &R::Desired,
    label: &str,
) -> Result<R::Current> {
    reconciler.resolve(desired).await?.ok_or_else(|| {
        HandlerError::NotFound(format!(
            "The {label} could not be found after the change was applied."
        ))
    })
}
