//! Matching lab records to reference events

pub mod cascade;
pub mod pass;
pub mod types;
pub mod unmatched;

pub use cascade::{Cascade, CascadeReport, ReferenceSource};
pub use types::{LabDuplicateEvent, Record, ReferenceEvent, VisitType};
pub use unmatched::export_unmatched;

#[cfg(test)]
pub(crate) mod fixtures {
    use anyhow::{Result, bail};
    use async_trait::async_trait;

    use super::ReferenceSource;
    use super::types::{JoinCandidate, JoinKey, LabDuplicateEvent, ReferenceEvent, VisitType};

    /// A 2021 Standard event for `site_name`
    pub fn event(id: &str, site_name: &str) -> ReferenceEvent {
        event_of(id, site_name, "Standard")
    }

    pub fn event_of(id: &str, site_name: &str, visit_type: &str) -> ReferenceEvent {
        ReferenceEvent {
            event_id: id.to_string(),
            event_group_id: format!("G-{}", id),
            hydrologic_year: 2021,
            start_date: Some("2021-11-15".to_string()),
            site_id: format!("S-{}", site_name),
            site_name: Some(site_name.to_string()),
            qc_extra_site_id: None,
            visit_type: visit_type.to_string(),
        }
    }

    pub fn lab_duplicate(event: ReferenceEvent, lab_site_id: &str) -> LabDuplicateEvent {
        LabDuplicateEvent {
            event,
            lab_site_id: lab_site_id.to_string(),
            duplicate_type: "Total Phosphorus".to_string(),
        }
    }

    pub fn candidates(events: Vec<ReferenceEvent>, key: JoinKey) -> Vec<JoinCandidate> {
        JoinCandidate::from_events(events, key)
    }

    /// In-memory reference data, filtered the way the database queries are
    #[derive(Default)]
    pub struct FakeReferenceSource {
        events: Vec<ReferenceEvent>,
        lab_duplicates: Vec<LabDuplicateEvent>,
        fail_on: Option<VisitType>,
        fail_on_duplicates: bool,
    }

    impl FakeReferenceSource {
        pub fn new(events: Vec<ReferenceEvent>, lab_duplicates: Vec<LabDuplicateEvent>) -> Self {
            FakeReferenceSource {
                events,
                lab_duplicates,
                ..Default::default()
            }
        }

        pub fn failing_on(mut self, visit_type: VisitType) -> Self {
            self.fail_on = Some(visit_type);
            self
        }

        pub fn failing_on_duplicates(mut self) -> Self {
            self.fail_on_duplicates = true;
            self
        }
    }

    #[async_trait]
    impl ReferenceSource for FakeReferenceSource {
        async fn events(&self, year: i32, visit_type: VisitType) -> Result<Vec<ReferenceEvent>> {
            if self.fail_on == Some(visit_type) {
                bail!("connection reset");
            }
            Ok(self
                .events
                .iter()
                .filter(|e| e.hydrologic_year == year && e.visit_type == visit_type.db_value())
                .cloned()
                .collect())
        }

        async fn lab_duplicates(&self, year: i32, duplicate_type: &str) -> Result<Vec<LabDuplicateEvent>> {
            if self.fail_on_duplicates {
                bail!("connection reset");
            }
            Ok(self
                .lab_duplicates
                .iter()
                .filter(|d| d.event.hydrologic_year == year && d.duplicate_type == duplicate_type)
                .cloned()
                .collect())
        }
    }
}
