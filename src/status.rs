//! Status Deriver
//!
//! Pure combination of a taxon's distribution records with per-record
//! containment flags into the sample's establishment verdict.

use serde::Serialize;

use crate::types::RegionId;

/// Status reported when no record's region contains the sample
pub const UNRECORDED: &str = "Unrecorded";
/// Region placeholder paired with [`UNRECORDED`]
pub const NO_REGION: &str = "None";
pub const INTRODUCED: &str = "Introduced";
/// Status for records that carry no establishment means
pub const RECORDED: &str = "Recorded";
/// WRiMS spelling of introduced
pub const ALIEN: &str = "Alien";

/// Map a raw establishment means onto the reported vocabulary.
///
/// "Alien" becomes "Introduced"; a missing or blank value becomes
/// "Recorded". Everything else passes through unchanged.
pub fn normalize_establishment(means: Option<&str>) -> String {
    match means.map(str::trim) {
        None | Some("") => RECORDED.to_string(),
        Some(ALIEN) => INTRODUCED.to_string(),
        Some(other) => other.to_string(),
    }
}

/// One (status, region) pair; serialized as a two-element array
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "(String, String)")]
pub struct StatusEntry {
    pub status: String,
    pub within: String,
}

impl StatusEntry {
    pub fn new(status: impl Into<String>, region: RegionId) -> Self {
        Self {
            status: status.into(),
            within: region.to_string(),
        }
    }

    pub fn unrecorded() -> Self {
        Self {
            status: UNRECORDED.to_string(),
            within: NO_REGION.to_string(),
        }
    }

    pub fn is_introduced(&self) -> bool {
        self.status == INTRODUCED
    }
}

impl From<StatusEntry> for (String, String) {
    fn from(entry: StatusEntry) -> Self {
        (entry.status, entry.within)
    }
}

/// Derive the status list from `(establishment means, region, contains)`
/// triples.
///
/// Containing records contribute their normalized status paired with
/// their region, de-duplicated in first-seen order. With no containing
/// record the result is exactly `[("Unrecorded", "None")]`.
pub fn derive_status<'a, I>(records: I) -> Vec<StatusEntry>
where
    I: IntoIterator<Item = (Option<&'a str>, RegionId, bool)>,
{
    let mut entries: Vec<StatusEntry> = Vec::new();
    for (means, region, contains) in records {
        if !contains {
            continue;
        }
        let entry = StatusEntry::new(normalize_establishment(means), region);
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }

    if entries.is_empty() {
        entries.push(StatusEntry::unrecorded());
    }
    entries
}
