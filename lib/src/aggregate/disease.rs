//! Grouping records by diagnosis.
use crate::{aggregate::LabelCount, ArcStr, PatientRecord, Range, RangeSet};
use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Disease categories and the history keywords that place a record in them.
pub const DISEASE_CATEGORIES: [(&str, &[&str]); 10] = [
    (
        "cardiovascular",
        &["coronary artery disease", "heart attack", "stroke", "hypertension"],
    ),
    ("respiratory", &["copd", "asthma", "pneumonia", "lung cancer"]),
    (
        "infectious",
        &["hepatitis", "tuberculosis", "covid-19", "influenza"],
    ),
    (
        "neurological",
        &["dementia", "alzheimer", "parkinson", "stroke"],
    ),
    ("oncological", &["cancer", "lymphoma", "leukemia", "tumor"]),
    (
        "mental_health",
        &["depression", "anxiety", "schizophrenia", "bipolar"],
    ),
    (
        "gastrointestinal",
        &["appendicitis", "cirrhosis", "gastritis", "ulcer"],
    ),
    ("endocrine", &["diabetes", "thyroid disorder", "obesity"]),
    (
        "pediatric",
        &["pediatric fever", "childhood asthma", "developmental delays"],
    ),
    (
        "maternal",
        &["childbirth", "pregnancy complications", "postpartum"],
    ),
];

static MATCHER: Lazy<CategoryMatcher> = Lazy::new(CategoryMatcher::new);

/// Finds every category whose keywords occur in a piece of text, in one pass.
pub struct CategoryMatcher {
    automaton: AhoCorasick,
    /// For each pattern, the categories it belongs to. Some keywords are in more than one.
    pattern_categories: Vec<Vec<usize>>,
}

impl CategoryMatcher {
    fn new() -> Self {
        let mut keywords: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, (_, words)) in DISEASE_CATEGORIES.iter().enumerate() {
            for word in words.iter() {
                keywords.entry(*word).or_default().push(idx);
            }
        }
        let automaton = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(keywords.keys());
        CategoryMatcher {
            automaton,
            pattern_categories: keywords.into_values().collect(),
        }
    }

    pub fn get() -> &'static Self {
        &MATCHER
    }

    /// Indexes into [`DISEASE_CATEGORIES`], each at most once.
    pub fn categories(&self, text: &str) -> BTreeSet<usize> {
        self.automaton
            .find_overlapping_iter(text)
            .flat_map(|mat| self.pattern_categories[mat.pattern()].iter().copied())
            .collect()
    }

    pub fn category_names(&self, text: &str) -> Vec<&'static str> {
        self.categories(text)
            .into_iter()
            .map(|idx| DISEASE_CATEGORIES[idx].0)
            .collect()
    }
}

/// How many records fall in each disease category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCounts {
    /// Every category, in table order.
    pub categories: Vec<LabelCount>,
    /// Records with some history that matched no category.
    pub uncategorised: usize,
}

impl CategoryCounts {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PatientRecord>) -> Self {
        let matcher = CategoryMatcher::get();
        let mut counts = [0usize; DISEASE_CATEGORIES.len()];
        let mut uncategorised = 0;
        for rec in records {
            if rec.medical_history.trim().is_empty() {
                continue;
            }
            let found = matcher.categories(&rec.medical_history);
            if found.is_empty() {
                uncategorised += 1;
            }
            for idx in found {
                counts[idx] += 1;
            }
        }
        CategoryCounts {
            categories: DISEASE_CATEGORIES
                .iter()
                .zip(counts)
                .map(|((name, _), count)| LabelCount::new(*name, count))
                .collect(),
            uncategorised,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl RiskLevel {
    /// From prevalence as a percentage of all patients.
    pub fn from_prevalence(prevalence: f64) -> Self {
        if prevalence >= 15. {
            RiskLevel::VeryHigh
        } else if prevalence >= 10. {
            RiskLevel::High
        } else if prevalence >= 5. {
            RiskLevel::Medium
        } else if prevalence >= 2. {
            RiskLevel::Low
        } else {
            RiskLevel::VeryLow
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::VeryHigh => "Very High",
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
            RiskLevel::VeryLow => "Very Low",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TrendStatus {
    Emerging,
    Stable,
    Declining,
}

impl TrendStatus {
    /// Diseases with fewer cases than this get no trend status.
    pub const MIN_CASES: usize = 3;

    pub fn from_recent_share(recent_share: f64) -> Self {
        if recent_share > 50. {
            TrendStatus::Emerging
        } else if recent_share > 20. {
            TrendStatus::Stable
        } else {
            TrendStatus::Declining
        }
    }
}

/// What we know about one diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseInsight {
    /// The history text, lower-cased.
    pub disease: ArcStr,
    pub categories: Vec<&'static str>,
    pub cases: usize,
    /// Percentage of all patients.
    pub prevalence: f64,
    pub risk_level: RiskLevel,
    /// Over patients with a recorded age.
    pub average_age: f64,
    pub top_localities: Vec<LabelCount>,
    pub recent_cases: usize,
    pub trend: Option<TrendStatus>,
}

/// The diagnosis a record is grouped under: its history, trimmed and lower-cased.
pub(super) fn disease_key(rec: &PatientRecord) -> Option<ArcStr> {
    let disease = rec.medical_history.trim().to_lowercase();
    if disease.is_empty() || disease == "nan" {
        None
    } else {
        Some(disease.into())
    }
}

#[derive(Default)]
struct DiseaseAcc {
    cases: usize,
    age_total: u64,
    aged: usize,
    localities: BTreeMap<ArcStr, usize>,
    recent_cases: usize,
}

/// The `top_n` most common diagnoses.
///
/// `total_patients` is the size of the whole set, including records without a history.
pub fn disease_insights<'a>(
    records: impl IntoIterator<Item = &'a PatientRecord>,
    total_patients: usize,
    today: NaiveDate,
    recent_days: i64,
    top_n: usize,
) -> Vec<DiseaseInsight> {
    let cutoff = today - Duration::days(recent_days);
    let mut by_disease: BTreeMap<ArcStr, DiseaseAcc> = BTreeMap::new();
    for rec in records {
        let Some(disease) = disease_key(rec) else {
            continue;
        };
        let acc = by_disease.entry(disease).or_default();
        acc.cases += 1;
        if rec.age > 0 {
            acc.age_total += u64::from(rec.age);
            acc.aged += 1;
        }
        *acc
            .localities
            .entry(super::locality_label(rec))
            .or_insert(0) += 1;
        if rec.admission_date.map_or(false, |d| d >= cutoff) {
            acc.recent_cases += 1;
        }
    }

    let matcher = CategoryMatcher::get();
    let mut insights: Vec<DiseaseInsight> = by_disease
        .into_iter()
        .map(|(disease, acc)| {
            let prevalence = super::ratio(acc.cases as f64, total_patients as f64) * 100.;
            let trend = (acc.cases >= TrendStatus::MIN_CASES).then(|| {
                TrendStatus::from_recent_share(acc.recent_cases as f64 / acc.cases as f64 * 100.)
            });
            DiseaseInsight {
                categories: matcher.category_names(&disease),
                cases: acc.cases,
                prevalence,
                risk_level: RiskLevel::from_prevalence(prevalence),
                average_age: super::ratio(acc.age_total as f64, acc.aged as f64),
                top_localities: super::top_counts(acc.localities, 3),
                recent_cases: acc.recent_cases,
                trend,
                disease,
            }
        })
        .collect();
    insights.sort_by(|a, b| b.cases.cmp(&a.cases));
    insights.truncate(top_n);
    insights
}

/// Age groups for the demographic breakdown. Unlike the reporting bands these split at 17/18,
/// 35/36 and 60/61.
pub fn demographic_age_groups() -> RangeSet<u8> {
    RangeSet::new(vec![
        Range::new(0, Some(18)).with_label("Children (0-17)"),
        Range::new(18, Some(36)).with_label("Young Adults (18-35)"),
        Range::new(36, Some(61)).with_label("Middle-aged (36-60)"),
        Range::new(61, None).with_label("Seniors (61+)"),
    ])
}

/// The diagnoses seen in one group of patients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemographicGroup {
    pub group: ArcStr,
    pub total_cases: usize,
    /// Ties go to the first name alphabetically.
    pub top_disease: ArcStr,
    pub top_disease_cases: usize,
    pub unique_diseases: usize,
}

impl DemographicGroup {
    /// `None` for a group with no diagnoses.
    fn from_counts(group: impl Into<ArcStr>, diseases: BTreeMap<ArcStr, usize>) -> Option<Self> {
        let total_cases = diseases.values().sum();
        let unique_diseases = diseases.len();
        let top = super::top_counts(diseases, 1).into_iter().next()?;
        Some(DemographicGroup {
            group: group.into(),
            total_cases,
            top_disease: top.label,
            top_disease_cases: top.count,
            unique_diseases,
        })
    }
}

/// Diagnoses broken down by age group and by gender.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Demographics {
    /// Youngest first. Records without a recorded age are left out.
    pub age_groups: Vec<DemographicGroup>,
    /// In gender order. A blank gender is grouped as "Unknown".
    pub genders: Vec<DemographicGroup>,
}

impl Demographics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PatientRecord>) -> Self {
        let groups = demographic_age_groups();
        let mut by_age: Vec<BTreeMap<ArcStr, usize>> = vec![BTreeMap::new(); groups.iter().count()];
        let mut by_gender: BTreeMap<ArcStr, BTreeMap<ArcStr, usize>> = BTreeMap::new();
        for rec in records {
            let Some(disease) = disease_key(rec) else {
                continue;
            };
            if rec.age > 0 {
                if let Some(idx) = groups.iter().position(|range| range.contains(&rec.age)) {
                    *by_age[idx].entry(disease.clone()).or_insert(0) += 1;
                }
            }
            let gender: ArcStr = match rec.gender.trim() {
                "" => "Unknown".into(),
                gender => gender.into(),
            };
            *by_gender
                .entry(gender)
                .or_default()
                .entry(disease)
                .or_insert(0) += 1;
        }

        Demographics {
            age_groups: groups
                .iter()
                .zip(by_age)
                .filter_map(|(range, diseases)| {
                    DemographicGroup::from_counts(range.to_string(), diseases)
                })
                .collect(),
            genders: by_gender
                .into_iter()
                .filter_map(|(gender, diseases)| DemographicGroup::from_counts(gender, diseases))
                .collect(),
        }
    }
}
