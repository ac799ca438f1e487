//! A single reconciliation pass
//!
//! Inner-joins records to reference candidates on the record's site
//! identifier and merges the match set back with first-claim-wins semantics.

use std::collections::HashMap;

use super::types::{JoinCandidate, JoinKey, Record};

/// How a pass compares and merges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPredicate {
    /// Reference attribute the record's site id must equal
    pub key: JoinKey,
    /// Set the duplicate flag on every matched record, claimed or not
    pub flag_duplicates: bool,
}

impl JoinPredicate {
    pub fn on(key: JoinKey) -> Self {
        JoinPredicate {
            key,
            flag_duplicates: false,
        }
    }

    pub fn lab_duplicates() -> Self {
        JoinPredicate {
            key: JoinKey::LabSiteId,
            flag_duplicates: true,
        }
    }
}

/// More than one reference event matched the same record within a pass
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub row: usize,
    pub site_id: String,
    /// Every distinct matching event id, in query order. The first one won.
    pub event_ids: Vec<String>,
}

/// What a pass did to the record set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassOutcome {
    /// Records present in the join result
    pub matched: usize,
    /// Records that received an event in this pass
    pub claimed: usize,
    /// Matched records left alone because an earlier pass owns them
    pub already_claimed: usize,
    pub flagged_duplicates: usize,
    pub collisions: Vec<Collision>,
}

/// Run one pass of the cascade over `records`
///
/// `candidates` should already be restricted to `year` and the pass's visit
/// type; any candidate from another hydrologic year is ignored. Candidates
/// are consumed in the order given, so when several events share a key the
/// first one wins and the rest are reported as a collision.
pub fn reconcile_pass(
    records: &mut [Record],
    candidates: &[JoinCandidate],
    year: i32,
    predicate: JoinPredicate,
) -> PassOutcome {
    let mut index: HashMap<&str, Vec<&JoinCandidate>> = HashMap::new();
    let mut off_year = 0usize;

    for candidate in candidates {
        if candidate.event.hydrologic_year != year {
            off_year += 1;
            continue;
        }
        index
            .entry(candidate.key.as_str())
            .or_default()
            .push(candidate);
    }

    if off_year > 0 {
        log::warn!(
            "Ignoring {} reference rows outside hydrologic year {} (join on {})",
            off_year,
            year,
            predicate.key
        );
    }

    let mut outcome = PassOutcome::default();

    for record in records.iter_mut() {
        let Some(matches) = index.get(record.site_id.as_str()) else {
            continue;
        };
        let Some(winner) = matches.first() else {
            continue;
        };

        outcome.matched += 1;

        let mut event_ids: Vec<String> = Vec::new();
        for candidate in matches {
            if !event_ids.contains(&candidate.event.event_id) {
                event_ids.push(candidate.event.event_id.clone());
            }
        }
        if event_ids.len() > 1 {
            log::warn!(
                "Row {} (site '{}') matches {} events on {}: {:?} - using '{}' (start {})",
                record.row,
                record.site_id,
                event_ids.len(),
                predicate.key,
                event_ids,
                winner.event.event_id,
                winner.event.start_date.as_deref().unwrap_or("unknown")
            );
            outcome.collisions.push(Collision {
                row: record.row,
                site_id: record.site_id.clone(),
                event_ids,
            });
        }

        if record.claim(&winner.event) {
            outcome.claimed += 1;
        } else {
            outcome.already_claimed += 1;
            log::debug!(
                "Row {} (site '{}') already assigned to event '{}', keeping it",
                record.row,
                record.site_id,
                record.event_id.as_deref().unwrap_or_default()
            );
        }

        if predicate.flag_duplicates {
            record.duplicate = true;
            outcome.flagged_duplicates += 1;
        }
    }

    outcome
}
