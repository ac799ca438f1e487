//! The reconciliation cascade
//!
//! Runs the fixed sequence of passes (Standard, Extra Sample, Pilot-Spatial,
//! QAQC, Lab Duplicate) against the reference database. Each pass queries its
//! own candidates, so a failed query stops the cascade instead of leaving one
//! visit type silently unreconciled.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::pass::{Collision, JoinPredicate, PassOutcome, reconcile_pass};
use super::types::{JoinCandidate, JoinKey, LabDuplicateEvent, Record, ReferenceEvent, VisitType};
use super::unmatched::count_unmatched;

/// Read access to the reference event metadata
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Events of one visit type in one hydrologic year, ordered by start
    /// date, site name and visit type
    async fn events(&self, year: i32, visit_type: VisitType) -> Result<Vec<ReferenceEvent>>;

    /// Events reached through lab duplicate mappings of `duplicate_type`,
    /// ordered by start date, lab site id and visit type
    async fn lab_duplicates(&self, year: i32, duplicate_type: &str) -> Result<Vec<LabDuplicateEvent>>;
}

/// One step of the cascade, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Standard,
    ExtraSample,
    PilotSpatial,
    Qaqc,
    LabDuplicate,
}

impl PassKind {
    /// Cascade order. Earlier passes win.
    pub const ORDER: [PassKind; 5] = [
        PassKind::Standard,
        PassKind::ExtraSample,
        PassKind::PilotSpatial,
        PassKind::Qaqc,
        PassKind::LabDuplicate,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PassKind::Standard => "Standard",
            PassKind::ExtraSample => "Extra Sample",
            PassKind::PilotSpatial => "Pilot - Spatial",
            PassKind::Qaqc => "QAQC",
            PassKind::LabDuplicate => "Lab Duplicate",
        }
    }

    /// Visit type the reference query filters on (`None` for lab duplicates,
    /// which filter on duplicate type instead)
    pub fn visit_type(&self) -> Option<VisitType> {
        match self {
            PassKind::Standard => Some(VisitType::Standard),
            PassKind::ExtraSample => Some(VisitType::ExtraSample),
            PassKind::PilotSpatial => Some(VisitType::PilotSpatial),
            PassKind::Qaqc => Some(VisitType::Qaqc),
            PassKind::LabDuplicate => None,
        }
    }

    pub fn predicate(&self) -> JoinPredicate {
        match self {
            PassKind::Standard | PassKind::ExtraSample | PassKind::PilotSpatial => {
                JoinPredicate::on(JoinKey::SiteName)
            }
            PassKind::Qaqc => JoinPredicate::on(JoinKey::QcExtraSiteId),
            PassKind::LabDuplicate => JoinPredicate::lab_duplicates(),
        }
    }
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome of one pass plus the cascade's running state after it
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    pub kind: PassKind,
    /// Reference rows returned for this pass
    pub candidates: usize,
    pub outcome: PassOutcome,
    /// Records still without an event once this pass finished
    pub unmatched_after: usize,
}

/// Result of a complete cascade
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeReport {
    pub passes: Vec<PassSummary>,
    pub unmatched: usize,
}

impl CascadeReport {
    /// Every record reconciled
    pub fn is_complete(&self) -> bool {
        self.unmatched == 0
    }

    pub fn collisions(&self) -> impl Iterator<Item = &Collision> {
        self.passes.iter().flat_map(|p| p.outcome.collisions.iter())
    }

    pub fn duplicates_flagged(&self) -> usize {
        self.passes.iter().map(|p| p.outcome.flagged_duplicates).sum()
    }
}

/// Cascade settings for one run
#[derive(Debug, Clone)]
pub struct Cascade {
    year: i32,
    duplicate_type: String,
}

impl Cascade {
    pub fn new(year: i32, duplicate_type: impl Into<String>) -> Self {
        Cascade {
            year,
            duplicate_type: duplicate_type.into(),
        }
    }

    /// Run every pass in order, mutating `records` in place
    pub async fn run(
        &self,
        source: &dyn ReferenceSource,
        records: &mut [Record],
    ) -> Result<CascadeReport> {
        let mut report = CascadeReport::default();

        log::info!(
            "Reconciling {} records against hydrologic year {}",
            records.len(),
            self.year
        );

        for kind in PassKind::ORDER {
            let candidates = self
                .candidates_for(kind, source)
                .await
                .with_context(|| {
                    format!("Reference query failed during the {} pass - aborting", kind)
                })?;

            let outcome = reconcile_pass(records, &candidates, self.year, kind.predicate());
            let unmatched_after = count_unmatched(records);

            log::info!(
                "{} pass: {} reference rows, {} matched, {} newly assigned, {} already assigned",
                kind,
                candidates.len(),
                outcome.matched,
                outcome.claimed,
                outcome.already_claimed
            );
            if outcome.flagged_duplicates > 0 {
                log::info!(
                    "{} pass: {} records flagged as lab duplicates",
                    kind,
                    outcome.flagged_duplicates
                );
            }
            log::info!(
                "Records with no event after the {} pass: {}",
                kind,
                unmatched_after
            );

            report.passes.push(PassSummary {
                kind,
                candidates: candidates.len(),
                outcome,
                unmatched_after,
            });
        }

        report.unmatched = count_unmatched(records);
        Ok(report)
    }

    async fn candidates_for(
        &self,
        kind: PassKind,
        source: &dyn ReferenceSource,
    ) -> Result<Vec<JoinCandidate>> {
        match kind.visit_type() {
            Some(visit_type) => {
                let events = source.events(self.year, visit_type).await?;
                Ok(JoinCandidate::from_events(events, kind.predicate().key))
            }
            None => {
                let duplicates = source
                    .lab_duplicates(self.year, &self.duplicate_type)
                    .await?;
                Ok(JoinCandidate::from_lab_duplicates(duplicates))
            }
        }
    }
}
