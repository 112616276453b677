use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Raw recognizer labels that the extractor surfaces. Everything else is dropped.
pub const TRACKED_RAW_LABELS: &[&str] = &["ORG", "PERSON", "GPE", "NORP", "FAC"];

pub fn is_tracked_raw_label(raw: &str) -> bool {
    TRACKED_RAW_LABELS.contains(&raw)
}

/// Domain taxonomy used for refined entity labels and span annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Person,
    Company,
    University,
    ResearchGroup,
    GovLab,
    Gpe,
    Norp,
    Fac,
    Other,
    /// Correction-only: the mention is not a real entity.
    Ignore,
}

impl EntityLabel {
    pub const ALL: [EntityLabel; 10] = [
        EntityLabel::Person,
        EntityLabel::Company,
        EntityLabel::University,
        EntityLabel::ResearchGroup,
        EntityLabel::GovLab,
        EntityLabel::Gpe,
        EntityLabel::Norp,
        EntityLabel::Fac,
        EntityLabel::Other,
        EntityLabel::Ignore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Person => "PERSON",
            EntityLabel::Company => "COMPANY",
            EntityLabel::University => "UNIVERSITY",
            EntityLabel::ResearchGroup => "RESEARCH_GROUP",
            EntityLabel::GovLab => "GOV_LAB",
            EntityLabel::Gpe => "GPE",
            EntityLabel::Norp => "NORP",
            EntityLabel::Fac => "FAC",
            EntityLabel::Other => "OTHER",
            EntityLabel::Ignore => "IGNORE",
        }
    }

    /// Whether the label may be attached to a ground-truth span.
    pub fn is_span_label(&self) -> bool {
        !matches!(self, EntityLabel::Ignore)
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity label: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for EntityLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        EntityLabel::ALL
            .into_iter()
            .find(|label| label.as_str() == wanted)
            .ok_or_else(|| UnknownLabel(s.to_string()))
    }
}
