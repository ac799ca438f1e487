//! Lab Electronic Data Deliverable (EDD) loading

mod reader;

pub use reader::load_edd;

/// Ordered EDD columns. Sheet columns are assigned to these by position.
pub const COLUMNS: [&str; 8] = [
    "Sampling",
    "Site ID",
    "Date",
    "Sample (wet weight) + bottle weight (g)",
    "Bottle weight (g)",
    "Sample wet weight (g)",
    "TP µg/g",
    "Plant weight (g)",
];

/// Column indices into [`COLUMNS`]
pub mod cols {
    pub const SAMPLING: usize = 0;
    pub const SITE_ID: usize = 1;
    pub const DATE: usize = 2;
    pub const SAMPLE_PLUS_BOTTLE: usize = 3;
    pub const BOTTLE: usize = 4;
    pub const SAMPLE_WET: usize = 5;
    pub const TOTAL_PHOSPHORUS: usize = 6;
    pub const PLANT: usize = 7;
}
