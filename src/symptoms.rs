//! Canonical symptom catalog. Health records may only reference ids listed here.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Symptom {
    pub id: &'static str,
    pub name: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SymptomCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub color: &'static str,
    pub symptoms: &'static [Symptom],
}

const fn symptom(id: &'static str, name: &'static str) -> Symptom {
    Symptom { id, name }
}

pub const CATEGORIES: &[SymptomCategory] = &[
    SymptomCategory {
        id: "physical",
        name: "Physical",
        color: "#FF6B6B",
        symptoms: &[
            symptom("headache", "Headache"),
            symptom("back_pain", "Back pain"),
            symptom("abdominal_cramps", "Abdominal cramps"),
            symptom("breast_tenderness", "Breast tenderness"),
            symptom("fatigue", "Fatigue"),
            symptom("bloating", "Bloating"),
            symptom("acne", "Acne"),
            symptom("constipation", "Constipation"),
            symptom("diarrhea", "Diarrhea"),
        ],
    },
    SymptomCategory {
        id: "emotional",
        name: "Emotional",
        color: "#E8B4E1",
        symptoms: &[
            symptom("mood_swings", "Mood swings"),
            symptom("irritability", "Irritability"),
            symptom("anxiety", "Anxiety"),
            symptom("depression", "Low mood"),
            symptom("crying", "Tearfulness"),
            symptom("happiness", "Happiness"),
            symptom("energy", "High energy"),
            symptom("libido", "Increased libido"),
        ],
    },
    SymptomCategory {
        id: "other",
        name: "Other",
        color: "#4ECDC4",
        symptoms: &[
            symptom("food_cravings", "Food cravings"),
            symptom("sleep_changes", "Sleep changes"),
            symptom("water_retention", "Water retention"),
            symptom("hot_flashes", "Hot flashes"),
            symptom("dizziness", "Dizziness"),
        ],
    },
];

pub fn all() -> impl Iterator<Item = &'static Symptom> {
    CATEGORIES.iter().flat_map(|c| c.symptoms.iter())
}

/// Symptoms of one category; empty for an unknown category id.
pub fn by_category(category_id: &str) -> &'static [Symptom] {
    CATEGORIES
        .iter()
        .find(|c| c.id == category_id)
        .map(|c| c.symptoms)
        .unwrap_or(&[])
}

pub fn lookup(id: &str) -> Option<&'static Symptom> {
    all().find(|s| s.id == id)
}

pub fn is_known(id: &str) -> bool {
    lookup(id).is_some()
}
