//! Records, reference events and the join predicates that link them

/// Visit type of a monitoring event, as stored in `tbl_Event.Visit_Type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitType {
    Standard,
    ExtraSample,
    PilotSpatial,
    Qaqc,
}

impl VisitType {
    /// Value used in the reference database
    pub fn db_value(&self) -> &'static str {
        match self {
            VisitType::Standard => "Standard",
            VisitType::ExtraSample => "Extra Sample",
            VisitType::PilotSpatial => "Pilot - Spatial",
            VisitType::Qaqc => "QAQC",
        }
    }
}

impl std::fmt::Display for VisitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.db_value())
    }
}

/// One measured sample row from the lab EDD
///
/// The reconciliation fields start out unset and are filled in by the
/// cascade. `event_id` doubles as the claim marker: once it is `Some`, the
/// record belongs to the pass that set it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    /// 1-based row number in the source sheet
    pub row: usize,
    pub sampling: String,
    /// Site identifier as reported by the lab
    pub site_id: String,
    pub date: Option<String>,
    pub sample_plus_bottle_weight_g: Option<f64>,
    pub bottle_weight_g: Option<f64>,
    pub sample_wet_weight_g: Option<f64>,
    /// Kept as text so qualifier flags (e.g. "<0.01") survive
    pub total_phosphorus: Option<String>,
    pub plant_weight_g: Option<f64>,

    pub event_id: Option<String>,
    pub event_group_id: Option<String>,
    pub assigned_site_id: Option<String>,
    pub visit_type: Option<String>,
    pub duplicate: bool,
}

impl Record {
    /// Create an unreconciled record for a site
    pub fn new(row: usize, site_id: impl Into<String>) -> Self {
        Record {
            row,
            site_id: site_id.into(),
            ..Default::default()
        }
    }

    /// Whether an earlier pass has already assigned an event
    pub fn is_claimed(&self) -> bool {
        self.event_id.is_some()
    }

    /// Assign event metadata unless the record is already claimed.
    /// Returns `true` if the assignment happened.
    pub fn claim(&mut self, event: &ReferenceEvent) -> bool {
        if self.is_claimed() {
            return false;
        }
        self.event_id = Some(event.event_id.clone());
        self.event_group_id = Some(event.event_group_id.clone());
        self.assigned_site_id = Some(event.site_id.clone());
        self.visit_type = Some(event.visit_type.clone());
        true
    }
}

/// One monitoring visit from the reference database (read-only)
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEvent {
    pub event_id: String,
    pub event_group_id: String,
    pub hydrologic_year: i32,
    pub start_date: Option<String>,
    /// Internal site identifier (`tbl_Event.Site_ID`)
    pub site_id: String,
    pub site_name: Option<String>,
    /// Alternate site key used for QA/QC samples
    pub qc_extra_site_id: Option<String>,
    pub visit_type: String,
}

/// A reference event reached through a lab duplicate mapping
#[derive(Debug, Clone, PartialEq)]
pub struct LabDuplicateEvent {
    pub event: ReferenceEvent,
    /// Site identifier the lab used for the duplicate sample
    pub lab_site_id: String,
    pub duplicate_type: String,
}

/// Which reference attribute a record's site identifier is compared against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKey {
    /// `tbl_Site.Site_Name`
    SiteName,
    /// `tbl_Event.Site_IDLab_QCExtra`
    QcExtraSiteId,
    /// `tbl_LabDuplicates.LabSiteID`
    LabSiteId,
}

impl std::fmt::Display for JoinKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKey::SiteName => write!(f, "site name"),
            JoinKey::QcExtraSiteId => write!(f, "QC/extra site id"),
            JoinKey::LabSiteId => write!(f, "lab site id"),
        }
    }
}

/// A reference event paired with the key value a record must equal to match it
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCandidate {
    pub key: String,
    pub event: ReferenceEvent,
}

impl JoinCandidate {
    /// Build candidates from plain reference events. Events without a value
    /// for the requested key cannot match anything and are dropped.
    pub fn from_events(events: Vec<ReferenceEvent>, key: JoinKey) -> Vec<JoinCandidate> {
        events
            .into_iter()
            .filter_map(|event| {
                let value = match key {
                    JoinKey::SiteName => event.site_name.clone(),
                    JoinKey::QcExtraSiteId => event.qc_extra_site_id.clone(),
                    // lab site ids live on the mapping, see `from_lab_duplicates`
                    JoinKey::LabSiteId => None,
                };
                value
                    .filter(|v| !v.trim().is_empty())
                    .map(|key| JoinCandidate { key, event })
            })
            .collect()
    }

    /// Build candidates from lab duplicate events, keyed by the lab site id
    pub fn from_lab_duplicates(duplicates: Vec<LabDuplicateEvent>) -> Vec<JoinCandidate> {
        duplicates
            .into_iter()
            .filter(|d| !d.lab_site_id.trim().is_empty())
            .map(|d| JoinCandidate {
                key: d.lab_site_id,
                event: d.event,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::fixtures::event;

    #[test]
    fn test_visit_type_database_values() {
        assert_eq!(VisitType::ExtraSample.db_value(), "Extra Sample");
        assert_eq!(VisitType::PilotSpatial.to_string(), "Pilot - Spatial");
        assert_eq!(VisitType::Qaqc.db_value(), "QAQC");
    }

    #[test]
    fn test_claim_only_once() {
        let mut record = Record::new(2, "A");
        assert!(!record.is_claimed());

        assert!(record.claim(&event("E1", "A")));
        assert!(!record.claim(&event("E2", "A")));

        assert_eq!(record.event_id.as_deref(), Some("E1"));
        assert_eq!(record.event_group_id.as_deref(), Some("G-E1"));
        assert_eq!(record.assigned_site_id.as_deref(), Some("S-A"));
        assert_eq!(record.visit_type.as_deref(), Some("Standard"));
    }

    #[test]
    fn test_candidates_skip_missing_keys() {
        let mut with_qc = event("E1", "A");
        with_qc.qc_extra_site_id = Some("V".to_string());
        let without_qc = event("E2", "B");

        let by_name = JoinCandidate::from_events(vec![with_qc.clone(), without_qc.clone()], JoinKey::SiteName);
        assert_eq!(by_name.len(), 2);

        let by_qc = JoinCandidate::from_events(vec![with_qc, without_qc], JoinKey::QcExtraSiteId);
        assert_eq!(by_qc.len(), 1);
        assert_eq!(by_qc[0].key, "V");
        assert_eq!(by_qc[0].event.event_id, "E1");
    }
}
