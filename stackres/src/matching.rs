//! Candidate matching.
//!
//! Every candidate is scored against the criteria. The mandatory criterion
//! gates eligibility; each satisfied optional criterion adds one point. The
//! highest-scoring group decides the result:
//! - no eligible candidate → [`MatchResult::NoMatch`]
//! - exactly one at the top → [`MatchResult::Unique`]
//! - a tie at the top → [`MatchResult::Ambiguous`]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::HandlerError;

/// Lifecycle states in which a matched resource is usable.
pub const AVAILABLE_STATES: [&str; 3] = ["available", "creating", "modifying"];

/// A provider record under evaluation.
pub trait Candidate {
    /// Stable provider identifier.
    fn id(&self) -> &str;

    /// Provider lifecycle status, if the resource family has one.
    fn lifecycle(&self) -> Option<&str> {
        None
    }
}

/// Candidate score. Zero means excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score(u32);

impl Score {
    pub const EXCLUDED: Score = Score(0);

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_excluded(self) -> bool {
        self.0 == 0
    }
}

/// Builder for a single candidate's score.
///
/// ```
/// use stackres::matching::ScoreCard;
///
/// let score = ScoreCard::gate(true)
///     .point(true)
///     .optional(None::<&str>, |_| true)
///     .score();
/// assert_eq!(score.value(), 2);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScoreCard {
    eligible: bool,
    points: u32,
}

impl ScoreCard {
    /// Start from the mandatory criterion.
    pub fn gate(eligible: bool) -> Self {
        Self {
            eligible,
            points: 0,
        }
    }

    pub fn point(mut self, satisfied: bool) -> Self {
        if satisfied {
            self.points += 1;
        }
        self
    }

    /// Optional criterion: contributes nothing when not supplied.
    pub fn optional<T>(self, wanted: Option<T>, check: impl FnOnce(T) -> bool) -> Self {
        match wanted {
            Some(w) => {
                let satisfied = check(w);
                self.point(satisfied)
            }
            None => self,
        }
    }

    pub fn score(self) -> Score {
        if self.eligible {
            Score(1 + self.points)
        } else {
            Score::EXCLUDED
        }
    }
}

/// Result of matching candidates against criteria.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult<C> {
    NoMatch,
    Unique(C),
    /// Tied candidates, ordered by identifier.
    Ambiguous(Vec<C>),
}

impl<C: Candidate> MatchResult<C> {
    /// Resolve a tie with a caller-supplied ordering; the greatest wins.
    /// Remaining ties fall back to the highest identifier.
    pub fn prefer(self, mut order: impl FnMut(&C, &C) -> Ordering) -> Self {
        match self {
            MatchResult::Ambiguous(tied) => tied
                .into_iter()
                .max_by(|a, b| order(a, b).then_with(|| a.id().cmp(b.id())))
                .map_or(MatchResult::NoMatch, MatchResult::Unique),
            other => other,
        }
    }

    /// Turn the result into the single usable candidate.
    ///
    /// `noun` names the resource family in error messages.
    pub fn into_unique(self, noun: &str) -> Result<C, HandlerError> {
        match self {
            MatchResult::Unique(c) => Ok(c),
            MatchResult::NoMatch => Err(HandlerError::NotFound(format!(
                "Matching {noun} could not be found."
            ))),
            MatchResult::Ambiguous(_) => Err(HandlerError::Ambiguous(format!(
                "More than one matching {noun} was found."
            ))),
        }
    }

    pub fn is_unique(&self) -> bool {
        matches!(self, MatchResult::Unique(_))
    }
}

/// Score every candidate and select the top group.
pub fn select<C, I, F>(candidates: I, mut score: F) -> MatchResult<C>
where
    C: Candidate,
    I: IntoIterator<Item = C>,
    F: FnMut(&C) -> Score,
{
    let mut groups: BTreeMap<Score, Vec<C>> = BTreeMap::new();

    for candidate in candidates {
        let s = score(&candidate);
        debug!(candidate = %candidate.id(), score = s.value(), "Scored candidate");
        if !s.is_excluded() {
            groups.entry(s).or_default().push(candidate);
        }
    }

    let Some((_, mut top)) = groups.pop_last() else {
        return MatchResult::NoMatch;
    };

    if top.len() == 1 {
        return top.pop().map_or(MatchResult::NoMatch, MatchResult::Unique);
    }

    top.sort_by(|a, b| a.id().cmp(b.id()));
    MatchResult::Ambiguous(top)
}

/// Fail with `NotAvailable` unless the candidate's status is in `accepted`.
///
/// Candidates without a lifecycle status are always accepted.
pub fn require_status<C: Candidate>(
    candidate: &C,
    accepted: &[&str],
    message: impl FnOnce() -> String,
) -> Result<(), HandlerError> {
    match candidate.lifecycle() {
        Some(status) if !accepted.contains(&status) => Err(HandlerError::NotAvailable(message())),
        _ => Ok(()),
    }
}
