//! Identity resolution: maps "who should approve" to a concrete participant.
//!
//! The model says things like "Alice" or "smith"; RPCs need an identity.
//! Matching runs through ordered tiers and stops at the first tier with a hit:
//!
//! 1. exact identity
//! 2. exact display name (case-sensitive)
//! 3. case-insensitive exact name or identity
//! 4. case-insensitive substring of name or identity, only when exactly one
//!    participant matches
//!
//! An ambiguous substring never resolves. Asking the wrong person to approve
//! is worse than asking nobody.

use crate::participants::types::Participant;
use thiserror::Error;

/// Why a descriptor did not resolve to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no participant matching \"{0}\" is in the meeting")]
    NotFound(String),

    #[error("\"{descriptor}\" matches {matches} participants")]
    Ambiguous { descriptor: String, matches: usize },
}

/// Resolve a human-supplied descriptor against a participant snapshot.
///
/// Participants whose identity starts with `reserved_prefix` (other agents,
/// recorders) are never candidates.
pub fn resolve(
    descriptor: &str,
    candidates: &[Participant],
    reserved_prefix: &str,
) -> Result<Participant, ResolveError> {
    let descriptor = descriptor.trim();
    if descriptor.is_empty() {
        return Err(ResolveError::NotFound(String::new()));
    }

    let humans: Vec<&Participant> = candidates
        .iter()
        .filter(|p| reserved_prefix.is_empty() || !p.identity.starts_with(reserved_prefix))
        .collect();

    if let Some(p) = humans.iter().find(|p| p.identity == descriptor) {
        return Ok((*p).clone());
    }

    if let Some(p) = humans.iter().find(|p| p.name == descriptor) {
        return Ok((*p).clone());
    }

    let needle = descriptor.to_lowercase();

    if let Some(p) = humans
        .iter()
        .find(|p| p.name.to_lowercase() == needle || p.identity.to_lowercase() == needle)
    {
        return Ok((*p).clone());
    }

    let partial: Vec<&&Participant> = humans
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle) || p.identity.to_lowercase().contains(&needle)
        })
        .collect();

    match partial.as_slice() {
        [only] => Ok((**only).clone()),
        [] => Err(ResolveError::NotFound(descriptor.to_string())),
        many => Err(ResolveError::Ambiguous {
            descriptor: descriptor.to_string(),
            matches: many.len(),
        }),
    }
}
