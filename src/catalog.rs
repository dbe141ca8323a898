//! Static practice catalog and its cycle-match tables.
//!
//! Catalog schema v2: practices are never hard-blocked by distress or
//! caution level, only the time budget and readiness stage gate
//! eligibility. The earlier hard-blocking catalog generation is
//! deprecated and intentionally not carried here.
//!
//! Loaded once at startup (built-in list or a JSON file) and shared
//! read-only across all sessions.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::types::Readiness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeCategory {
    Monitoring,
    Attention,
    Cognitive,
    Behavioral,
    RelapsePrevention,
    Micro,
}

/// A single practice in the catalog. Static data, read-only after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeCatalogEntry {
    pub id: String,
    pub title: String,
    pub category: PracticeCategory,
    /// Maintaining cycles this practice targets. Empty = general-purpose.
    #[serde(default)]
    pub cycles: Vec<String>,
    /// Exclusion tags; a candidate constraint intersecting these removes
    /// the entry from ranking.
    #[serde(default)]
    pub contraindications: Vec<String>,
    pub duration_min: u32,
    #[serde(default)]
    pub duration_max: Option<u32>,
    pub min_readiness: Readiness,
    /// Static tie-break rank; lower wins at equal score.
    pub priority_rank: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// The catalog container. Only active entries are retained.
#[derive(Debug, Clone)]
pub struct PracticeCatalog {
    entries: Vec<PracticeCatalogEntry>,
}

impl PracticeCatalog {
    /// Catalog schema generation. v2 is the non-blocking ruleset; v1
    /// (hard caution gates) is superseded.
    pub const SCHEMA_VERSION: u32 = 2;

    /// The always-safe entry returned when nothing else is eligible.
    pub const FALLBACK_PRACTICE_ID: &'static str = "U2";

    pub fn new(entries: Vec<PracticeCatalogEntry>) -> Self {
        Self {
            entries: entries.into_iter().filter(|e| e.active).collect(),
        }
    }

    /// Parse a catalog from its JSON representation (an array of entries).
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let entries: Vec<PracticeCatalogEntry> = serde_json::from_str(json)?;
        Ok(Self::new(entries))
    }

    /// The built-in v2 catalog: 30 practices across six categories.
    pub fn builtin() -> Self {
        Self::new(builtin_entries())
    }

    pub fn entries(&self) -> &[PracticeCatalogEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&PracticeCatalogEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

/// First-line practices per maintaining cycle.
pub static FIRST_LINE: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("rumination", vec!["A2", "A3", "M2"]),
        ("worry", vec!["A2", "A3", "C2"]),
        ("avoidance", vec!["C3", "B1", "B2", "B4"]),
        ("perfectionism", vec!["C4", "C5", "C3"]),
        ("self_criticism", vec!["C5", "A3", "A4"]),
        ("symptom_fixation", vec!["A6", "A1", "A3"]),
        ("insomnia", vec!["B5", "A2"]),
    ]
});

/// Second-line practices per maintaining cycle.
pub static SECOND_LINE: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("rumination", vec!["A1", "B1", "B3", "A4", "A5"]),
        ("worry", vec!["A1", "C3", "U3"]),
        ("avoidance", vec!["C1", "A6"]),
        ("perfectionism", vec!["M1", "M2"]),
        ("self_criticism", vec!["C1", "A5", "C6"]),
        ("symptom_fixation", vec!["C2", "B4"]),
        ("insomnia", vec!["A3", "C2"]),
    ]
});

/// Practices appropriate regardless of the dominant cycle.
pub static UNIVERSAL: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["M3", "M4", "U1", "U2"].into_iter().collect());

/// Practices boosted at high distress.
pub static STABILIZATION: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["U1", "U2", "U3", "U4", "U5", "U6", "A3", "A2"]
        .into_iter()
        .collect()
});

pub fn first_line_for(cycle: &str) -> &'static [&'static str] {
    FIRST_LINE
        .iter()
        .find(|(c, _)| *c == cycle)
        .map(|(_, ids)| ids.as_slice())
        .unwrap_or(&[])
}

pub fn second_line_for(cycle: &str) -> &'static [&'static str] {
    SECOND_LINE
        .iter()
        .find(|(c, _)| *c == cycle)
        .map(|(_, ids)| ids.as_slice())
        .unwrap_or(&[])
}

fn builtin_entries() -> Vec<PracticeCatalogEntry> {
    use PracticeCategory::*;
    use Readiness::*;

    struct Row(
        &'static str,
        &'static str,
        PracticeCategory,
        &'static [&'static str],
        u32,
        Option<u32>,
        Readiness,
        u32,
    );

    let rows = [
        // Monitoring
        Row("M1", "Thought monitoring diary", Monitoring, &[], 5, Some(10), Contemplation, 8),
        Row("M2", "Rumination trigger log", Monitoring, &["rumination", "worry"], 2, Some(5), Contemplation, 10),
        Row("M3", "One-tap mood check", Monitoring, &[], 1, Some(1), Precontemplation, 5),
        Row("M4", "Daily mood scan", Monitoring, &[], 1, Some(2), Contemplation, 3),
        // Attention
        Row("A1", "Attention training technique", Attention, &["rumination", "worry", "symptom_fixation"], 10, Some(12), Action, 20),
        Row("A2", "Detached mindfulness", Attention, &["rumination", "worry"], 2, Some(5), Contemplation, 15),
        Row("A3", "Refocusing exercise", Attention, &["rumination", "worry", "self_criticism"], 2, Some(5), Contemplation, 16),
        Row("A4", "Attention switching", Attention, &["self_criticism", "rumination"], 2, Some(3), Contemplation, 17),
        Row("A5", "Observer perspective", Attention, &["self_criticism", "rumination"], 2, Some(5), Action, 18),
        Row("A6", "Situational refocus", Attention, &["symptom_fixation", "avoidance"], 2, Some(3), Action, 25),
        // Cognitive
        Row("C1", "Behavioral experiment planner", Cognitive, &["avoidance", "perfectionism"], 5, Some(10), Action, 30),
        Row("C2", "Worry postponement", Cognitive, &["worry"], 5, Some(7), Action, 31),
        Row("C3", "Graded exposure ladder", Cognitive, &["avoidance", "worry", "perfectionism"], 10, Some(20), Action, 35),
        Row("C4", "Standards flexibility check", Cognitive, &["perfectionism", "self_criticism"], 5, Some(10), Action, 29),
        Row("C5", "Self-compassion reframe", Cognitive, &["self_criticism", "perfectionism"], 3, Some(5), Contemplation, 28),
        Row("C6", "Critical voice dialogue", Cognitive, &["self_criticism"], 5, Some(7), Action, 32),
        // Behavioral
        Row("B1", "Micro-action starter", Behavioral, &["avoidance", "rumination"], 5, Some(10), Action, 22),
        Row("B2", "Avoidance ladder", Behavioral, &["avoidance"], 10, Some(20), Action, 23),
        Row("B3", "Behavioral activation block", Behavioral, &["rumination"], 10, Some(15), Action, 24),
        Row("B4", "Checking-delay practice", Behavioral, &["avoidance", "symptom_fixation"], 5, Some(10), Action, 26),
        Row("B5", "Wind-down routine", Behavioral, &["insomnia"], 5, Some(10), Contemplation, 27),
        // Relapse prevention
        Row("R1", "Relapse roadmap", RelapsePrevention, &[], 15, Some(20), Maintenance, 36),
        Row("R2", "Early-warning review", RelapsePrevention, &["rumination", "worry"], 10, Some(10), Maintenance, 37),
        Row("R3", "Skills consolidation review", RelapsePrevention, &[], 10, Some(15), Maintenance, 38),
        // Micro
        Row("U1", "Box breathing", Micro, &[], 1, Some(1), Precontemplation, 2),
        Row("U2", "Grounding 5-4-3-2-1", Micro, &[], 1, Some(1), Precontemplation, 1),
        Row("U3", "Two-minute worry pause", Micro, &["rumination", "worry"], 1, Some(2), Precontemplation, 4),
        Row("U4", "Thought labeling", Micro, &["rumination"], 1, Some(1), Precontemplation, 6),
        Row("U5", "Kind-phrase pause", Micro, &["self_criticism"], 1, Some(1), Precontemplation, 7),
        Row("U6", "Tiny first step", Micro, &["avoidance", "rumination"], 1, Some(2), Precontemplation, 9),
    ];

    rows.into_iter()
        .map(|Row(id, title, category, cycles, dur_min, dur_max, min_readiness, rank)| {
            PracticeCatalogEntry {
                id: id.to_string(),
                title: title.to_string(),
                category,
                cycles: cycles.iter().map(|s| s.to_string()).collect(),
                contraindications: Vec::new(),
                duration_min: dur_min,
                duration_max: dur_max,
                min_readiness,
                priority_rank: rank,
                active: true,
            }
        })
        .collect()
}
