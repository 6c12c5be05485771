//! Candidate enrichment.
//!
//! Some list endpoints omit attributes needed for scoring. The detail calls
//! for all candidates run concurrently and the fetch waits for every one of
//! them; the first failure aborts the whole group.

use std::collections::HashMap;
use std::future::Future;

use futures::future::try_join_all;
use tracing::debug;

use crate::error::{HandlerError, ProviderError};
use crate::matching::Candidate;

/// Fetch one detail record per candidate and merge it back by identifier.
///
/// `detail` returns the identifier the provider reports alongside the record.
/// Every candidate must receive a record, otherwise the fetch fails rather
/// than scoring against partial attributes.
pub async fn enrich<C, D, F, Fut, M>(
    candidates: Vec<C>,
    detail: F,
    mut merge: M,
) -> Result<Vec<C>, HandlerError>
where
    C: Candidate,
    F: Fn(&C) -> Fut,
    Fut: Future<Output = Result<(String, D), ProviderError>>,
    M: FnMut(&mut C, D),
{
    if candidates.is_empty() {
        return Ok(candidates);
    }

    let results = try_join_all(candidates.iter().map(&detail)).await?;
    debug!(count = results.len(), "Fetched candidate details");

    let mut by_id: HashMap<String, D> = results.into_iter().collect();

    let mut enriched = candidates;
    for candidate in enriched.iter_mut() {
        let Some(d) = by_id.remove(candidate.id()) else {
            return Err(ProviderError::new(
                "MissingDetail",
                format!("No details were returned for \"{}\".", candidate.id()),
            )
            .into());
        };
        merge(candidate, d);
    }

    Ok(enriched)
}

/// Run one provider call per item concurrently, preserving input order.
pub async fn fan_out<T, R, F, Fut>(items: &[T], call: F) -> Result<Vec<R>, ProviderError>
where
    F: Fn(&T) -> Fut,
    Fut: Future<Output = Result<R, ProviderError>>,
{
    try_join_all(items.iter().map(call)).await
}
