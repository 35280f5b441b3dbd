//! How severe things are, over time and per diagnosis.
use crate::{
    aggregate::{disease::disease_key, ratio, Counts, LabelCount},
    ArcStr, PatientRecord, Severity,
};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// 4 for the most urgent severities down to 1 for routine ones.
pub fn urgency_score(severity: &Severity) -> u8 {
    5 - severity.priority().rank()
}

fn severity_label(severity: &Severity) -> ArcStr {
    match severity.label() {
        "" => "Unspecified".into(),
        label => label.into(),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SeverityStatus {
    Alert,
    Stable,
}

impl SeverityStatus {
    /// An urgent severity is on alert when more than 40% of its cases are recent.
    pub fn from_cases(recent_cases: usize, total_cases: usize, urgency_score: u8) -> Self {
        if recent_cases as f64 > total_cases as f64 * 0.4 && urgency_score >= 3 {
            SeverityStatus::Alert
        } else {
            SeverityStatus::Stable
        }
    }
}

/// Cases of one severity label over time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeverityTrend {
    pub severity: ArcStr,
    pub total_cases: usize,
    pub recent_cases: usize,
    /// Recent as a percentage of total.
    pub recent_share: f64,
    pub urgency_score: u8,
    /// `YYYY-MM`, oldest first.
    pub monthly: Vec<LabelCount>,
    pub status: SeverityStatus,
}

#[derive(Default)]
struct SeverityAcc {
    urgency_score: u8,
    total_cases: usize,
    recent_cases: usize,
    monthly: BTreeMap<String, usize>,
}

/// One entry per severity label seen on a record with an arrival date, most urgent first.
///
/// Records without a severity, or marked "unknown", are left out.
pub fn severity_trends<'a>(
    records: impl IntoIterator<Item = &'a PatientRecord>,
    today: NaiveDate,
    recent_days: i64,
) -> Vec<SeverityTrend> {
    let cutoff = today - Duration::days(recent_days);
    let mut by_severity: BTreeMap<ArcStr, SeverityAcc> = BTreeMap::new();
    for rec in records {
        let label = rec.condition_severity.label();
        if label.is_empty() || label.eq_ignore_ascii_case("unknown") {
            continue;
        }
        let Some(arrived) = rec.arrived_at() else {
            continue;
        };
        let acc = by_severity.entry(label.into()).or_default();
        acc.urgency_score = urgency_score(&rec.condition_severity);
        acc.total_cases += 1;
        if arrived.date() >= cutoff {
            acc.recent_cases += 1;
        }
        *acc.monthly
            .entry(arrived.format("%Y-%m").to_string())
            .or_insert(0) += 1;
    }

    let mut trends: Vec<SeverityTrend> = by_severity
        .into_iter()
        .map(|(severity, acc)| SeverityTrend {
            severity,
            total_cases: acc.total_cases,
            recent_cases: acc.recent_cases,
            recent_share: ratio(acc.recent_cases as f64 * 100., acc.total_cases as f64),
            urgency_score: acc.urgency_score,
            monthly: acc
                .monthly
                .into_iter()
                .map(|(month, count)| LabelCount::new(month, count))
                .collect(),
            status: SeverityStatus::from_cases(
                acc.recent_cases,
                acc.total_cases,
                acc.urgency_score,
            ),
        })
        .collect();
    trends.sort_by(|a, b| b.urgency_score.cmp(&a.urgency_score));
    trends
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum SeverityRisk {
    Critical,
    High,
    Medium,
    Low,
}

impl SeverityRisk {
    /// From the average urgency score of a disease's cases.
    pub fn from_score(score: f64) -> Self {
        if score >= 3.5 {
            SeverityRisk::Critical
        } else if score >= 2.5 {
            SeverityRisk::High
        } else if score >= 1.5 {
            SeverityRisk::Medium
        } else {
            SeverityRisk::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeverityRisk::Critical => "Critical Risk",
            SeverityRisk::High => "High Risk",
            SeverityRisk::Medium => "Medium Risk",
            SeverityRisk::Low => "Low Risk",
        }
    }
}

/// How severe the cases of one diagnosis tend to be.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseSeverity {
    pub disease: ArcStr,
    pub cases: usize,
    /// Mean [`urgency_score`] over the cases.
    pub average_score: f64,
    pub most_common_severity: ArcStr,
    pub distribution: Counts,
    pub risk: SeverityRisk,
}

/// The `top_n` diagnoses with the most severe cases on average.
pub fn severity_correlation<'a>(
    records: impl IntoIterator<Item = &'a PatientRecord>,
    top_n: usize,
) -> Vec<DiseaseSeverity> {
    let mut by_disease: BTreeMap<ArcStr, (u64, Counts)> = BTreeMap::new();
    for rec in records {
        let Some(disease) = disease_key(rec) else {
            continue;
        };
        let (score, distribution) = by_disease.entry(disease).or_default();
        *score += u64::from(urgency_score(&rec.condition_severity));
        *distribution
            .entry(severity_label(&rec.condition_severity))
            .or_insert(0) += 1;
    }

    let mut out: Vec<DiseaseSeverity> = by_disease
        .into_iter()
        .map(|(disease, (score, distribution))| {
            let cases: usize = distribution.values().sum();
            let average_score = ratio(score as f64, cases as f64);
            let most_common_severity = super::top_counts(distribution.clone(), 1)
                .into_iter()
                .next()
                .map(|top| top.label)
                .unwrap_or_else(|| "Unspecified".into());
            DiseaseSeverity {
                disease,
                cases,
                average_score,
                most_common_severity,
                distribution,
                risk: SeverityRisk::from_score(average_score),
            }
        })
        .collect();
    out.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
    out.truncate(top_n);
    out
}
