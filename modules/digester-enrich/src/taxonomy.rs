// Refinement of raw recognizer labels into the domain taxonomy.

use digester_common::EntityLabel;

const UNIVERSITY_HINTS: &[&str] = &[
    "University",
    "College",
    "Institute of",
    "Polytechnic",
    "École",
    "Technological University",
];

const GOV_LAB_HINTS: &[&str] = &[
    "Laboratory",
    "National Lab",
    "National Laboratory",
    "Lawrence Livermore",
    "Los Alamos",
    "Oak Ridge",
    "Argonne",
    "NIST",
    "NASA",
];

const RESEARCH_GROUP_HINTS: &[&str] = &["Group", "Lab", "Center for", "Centre for", "Laboratory for"];

/// Guess the custom label for a mention. First matching rule wins; org-like
/// names with no hint land in `COMPANY`.
pub fn guess_custom_label(name: &str, raw_label: &str) -> EntityLabel {
    match raw_label {
        "PERSON" => return EntityLabel::Person,
        "GPE" => return EntityLabel::Gpe,
        "NORP" => return EntityLabel::Norp,
        "FAC" => return EntityLabel::Fac,
        _ => {}
    }

    let lower = name.trim().to_lowercase();
    let hit = |hints: &[&str]| hints.iter().any(|h| lower.contains(&h.to_lowercase()));

    if hit(UNIVERSITY_HINTS) {
        EntityLabel::University
    } else if hit(GOV_LAB_HINTS) {
        EntityLabel::GovLab
    } else if hit(RESEARCH_GROUP_HINTS) {
        EntityLabel::ResearchGroup
    } else {
        EntityLabel::Company
    }
}
