//! Folding a set of records into summary statistics.
//!
//! [`Aggregator::summarise`] is the single place statistics are computed. Report formatters and
//! the command-line tools only project the [`Summary`] it returns.
//!
//! Every ratio here has a defined value for an empty denominator (0), so an empty record set
//! summarises to zeros rather than failing.
mod disease;
mod severity;
mod timing;
mod trend;

pub use self::{
    disease::{
        demographic_age_groups, disease_insights, CategoryCounts, CategoryMatcher,
        DemographicGroup, Demographics, DiseaseInsight, RiskLevel, TrendStatus,
        DISEASE_CATEGORIES,
    },
    severity::{
        severity_correlation, severity_trends, urgency_score, DiseaseSeverity, SeverityRisk,
        SeverityStatus, SeverityTrend,
    },
    timing::{rush_periods, HourCount, PeakTimes, RushIntensity, RushPeriod},
    trend::{
        daily_counts, growth_rate, locality_trends, moving_average, trend_factor, Capacity,
        Confidence, Forecast, LocalityTrend, TrendDirection, VisitTrend,
    },
};
use crate::{config::AnalysisConfig, ArcStr, PatientRecord, Patients, PaymentStatus, Range, RangeSet};
use chrono::NaiveDate;
use qu::ick_use::*;
use serde::Serialize;
use std::collections::BTreeMap;

pub type Counts = BTreeMap<ArcStr, usize>;

/// `num / den`, or 0 when `den` is 0.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0. {
        0.
    } else {
        num / den
    }
}

/// A label and how many records have it, for ordered groupings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: ArcStr,
    pub count: usize,
}

impl LabelCount {
    pub fn new(label: impl Into<ArcStr>, count: usize) -> Self {
        LabelCount {
            label: label.into(),
            count,
        }
    }
}

pub(crate) fn locality_label(rec: &PatientRecord) -> ArcStr {
    if rec.locality.is_empty() {
        "Unknown".into()
    } else {
        rec.locality.clone()
    }
}

/// The `n` largest counts, largest first, ties in label order.
pub(crate) fn top_counts(counts: Counts, n: usize) -> Vec<LabelCount> {
    let mut counts: Vec<_> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    // stable, and the map iterates in label order
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(n);
    counts
}

fn count_by<'a>(
    records: impl IntoIterator<Item = &'a PatientRecord>,
    key: impl Fn(&PatientRecord) -> ArcStr,
) -> Counts {
    let mut counts = Counts::new();
    for rec in records {
        *counts.entry(key(rec)).or_insert(0) += 1;
    }
    counts
}

/// Age bands for reporting. The last band means "over 65".
pub fn age_bands() -> RangeSet<u8> {
    RangeSet::new(vec![
        Range::new(0, Some(19)).with_label("0-18"),
        Range::new(19, Some(36)).with_label("19-35"),
        Range::new(36, Some(51)).with_label("36-50"),
        Range::new(51, Some(66)).with_label("51-65"),
        Range::new(66, None).with_label("65+"),
    ])
}

/// Money totals over billed records (bill > 0).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Financials {
    pub billed_patients: usize,
    pub total_billed: f64,
    pub total_paid: f64,
    pub total_outstanding: f64,
    pub average_bill: f64,
    /// Paid as a percentage of billed.
    pub collection_rate: f64,
}

impl Financials {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PatientRecord>) -> Self {
        let mut out = Financials::default();
        for rec in records.into_iter().filter(|rec| rec.is_billed()) {
            out.billed_patients += 1;
            out.total_billed += rec.bill_amount;
            out.total_paid += rec.amount_paid;
            out.total_outstanding += rec.outstanding_amount;
        }
        out.average_bill = ratio(out.total_billed, out.billed_patients as f64);
        out.collection_rate = ratio(out.total_paid, out.total_billed) * 100.;
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentBreakdown {
    /// Always has the four derived statuses, plus any other label in use.
    pub counts: Counts,
    /// Outstanding balance of records marked unpaid.
    pub unpaid_amount: f64,
    /// All outstanding balances.
    pub overdue_amount: f64,
}

impl PaymentBreakdown {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PatientRecord>) -> Self {
        let mut out = PaymentBreakdown::default();
        // Manually insert to make sure all statuses are included.
        for status in PaymentStatus::DERIVED.iter() {
            out.counts.insert(status.label().into(), 0);
        }
        for rec in records {
            *out.counts
                .entry(rec.payment_status.label().into())
                .or_insert(0) += 1;
            if rec.payment_status == PaymentStatus::Unpaid {
                out.unpaid_amount += rec.outstanding_amount;
            }
            if rec.outstanding_amount > 0. {
                out.overdue_amount += rec.outstanding_amount;
            }
        }
        out
    }

    pub fn count(&self, status: &PaymentStatus) -> usize {
        self.counts.get(status.label()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsuranceCounts {
    pub insured: usize,
    pub uninsured: usize,
}

/// Share of records with each key field filled in, weighted, as 0 to 100.
pub fn data_quality(patients: &Patients) -> f64 {
    if patients.is_empty() {
        return 0.;
    }
    let total = patients.len() as f64;
    let share = |f: fn(&PatientRecord) -> bool| {
        patients.iter_ref().filter(|rec| f(rec)).count() as f64 / total
    };
    let score = share(|rec| rec.admission_date.is_some()) * 30.
        + share(|rec| !rec.medical_history.is_empty()) * 30.
        + share(|rec| !rec.locality.is_empty()) * 20.
        + share(|rec| rec.age > 0) * 20.;
    score.clamp(0., 100.)
}

/// Everything the reports need, computed in one place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub today: NaiveDate,
    pub total_patients: usize,
    pub active_emergencies: usize,
    pub financials: Financials,
    pub payments: PaymentBreakdown,
    pub insurance: InsuranceCounts,
    /// All five bands, youngest first.
    pub age_brackets: Vec<LabelCount>,
    pub localities: Vec<LabelCount>,
    pub severity: Counts,
    pub disease_categories: CategoryCounts,
    pub visits: VisitTrend,
    pub locality_trends: Vec<LocalityTrend>,
    pub disease_insights: Vec<DiseaseInsight>,
    pub peak_times: PeakTimes,
    /// Most urgent first.
    pub severity_trends: Vec<SeverityTrend>,
    pub severity_correlation: Vec<DiseaseSeverity>,
    pub demographics: Demographics,
    /// `None` when no record has an admission date.
    pub capacity: Option<Capacity>,
    pub data_quality: f64,
}

/// Computes summaries with a fixed set of analysis parameters.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    config: AnalysisConfig,
}

impl Aggregator {
    /// How many diagnoses to report insights for.
    pub const TOP_DISEASES: usize = 10;
    /// How many diagnoses to rank by severity.
    pub const TOP_SEVERITY_CORRELATIONS: usize = 15;

    pub fn new(config: AnalysisConfig) -> Self {
        Aggregator { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// `today` anchors the "recent" window for disease and severity trends.
    pub fn summarise(&self, patients: &Patients, today: NaiveDate) -> Summary {
        let config = &self.config;
        let ages = age_bands().bucket_values(patients.iter_ref().map(|rec| rec.age));
        let insured = patients
            .iter_ref()
            .filter(|rec| rec.insurance_coverage)
            .count();

        let visits = VisitTrend::from_records(patients, config.trend_window, config.forecast_days);

        let summary = Summary {
            today,
            total_patients: patients.len(),
            active_emergencies: patients
                .iter_ref()
                .filter(|rec| rec.is_active_emergency())
                .count(),
            financials: self.financials(patients),
            payments: PaymentBreakdown::from_records(patients),
            insurance: InsuranceCounts {
                insured,
                uninsured: patients.len() - insured,
            },
            age_brackets: ages
                .iter()
                .map(|(range, count)| LabelCount::new(range.to_string(), count))
                .collect(),
            localities: top_counts(count_by(patients, locality_label), config.top_localities),
            severity: count_by(patients, |rec| {
                if rec.condition_severity.label().is_empty() {
                    "Unspecified".into()
                } else {
                    rec.condition_severity.label().into()
                }
            }),
            disease_categories: CategoryCounts::from_records(patients),
            capacity: Capacity::from_trend(&visits),
            visits,
            locality_trends: locality_trends(
                patients,
                config.trend_window,
                config.top_localities,
            ),
            disease_insights: disease_insights(
                patients,
                patients.len(),
                today,
                config.recent_days,
                Self::TOP_DISEASES,
            ),
            peak_times: PeakTimes::from_records(patients),
            severity_trends: severity_trends(patients, today, config.recent_days),
            severity_correlation: severity_correlation(
                patients,
                Self::TOP_SEVERITY_CORRELATIONS,
            ),
            demographics: Demographics::from_records(patients),
            data_quality: data_quality(patients),
        };
        event!(
            Level::DEBUG,
            "summarised {} records ({} active emergencies)",
            summary.total_patients,
            summary.active_emergencies
        );
        summary
    }

    /// Money totals for any subset, e.g. one reporting period.
    pub fn financials(&self, patients: &Patients) -> Financials {
        Financials::from_records(patients)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test_util::record, Severity};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    fn billed(id: &str, bill: f64, paid: f64) -> PatientRecord {
        let mut rec = record(id);
        rec.bill_amount = bill;
        rec.amount_paid = paid;
        crate::derive::normalize(&mut rec, false);
        rec
    }

    #[test]
    fn financial_scenario() {
        let patients = Patients::new(vec![
            billed("HMS-2024-A", 1000., 400.),
            billed("HMS-2024-B", 500., 500.),
            billed("HMS-2024-C", 0., 0.),
        ]);
        let summary = Aggregator::default().summarise(&patients, today());
        let fin = &summary.financials;
        assert_eq!(fin.billed_patients, 2);
        assert_eq!(fin.total_billed, 1500.);
        assert_eq!(fin.total_paid, 900.);
        assert_eq!(fin.total_outstanding, 600.);
        assert_eq!(fin.average_bill, 750.);
        assert_eq!(fin.collection_rate, 60.);

        let statuses: Vec<_> = patients
            .iter_ref()
            .map(|rec| rec.payment_status.to_string())
            .collect();
        assert_eq!(statuses, ["Partially Paid", "Fully Paid", "Not Applicable"]);
        assert_eq!(summary.payments.count(&PaymentStatus::PartiallyPaid), 1);
        assert_eq!(summary.payments.count(&PaymentStatus::Unpaid), 0);
        assert_eq!(summary.payments.overdue_amount, 600.);
    }

    #[test]
    fn empty_set_is_all_zeros() {
        let summary = Aggregator::default().summarise(&Patients::default(), today());
        assert_eq!(summary.total_patients, 0);
        assert_eq!(summary.active_emergencies, 0);
        assert_eq!(summary.financials, Financials::default());
        assert_eq!(summary.payments.counts.values().sum::<usize>(), 0);
        assert_eq!(summary.payments.counts.len(), 4);
        assert_eq!(summary.age_brackets.len(), 5);
        assert!(summary.age_brackets.iter().all(|b| b.count == 0));
        assert!(summary.localities.is_empty());
        assert!(summary.visits.forecast.is_empty());
        assert_eq!(summary.visits.growth_rate, 0.);
        assert!(summary.disease_insights.is_empty());
        assert_eq!(summary.peak_times.peak_hour, None);
        assert!(summary.severity_trends.is_empty());
        assert!(summary.severity_correlation.is_empty());
        assert_eq!(summary.demographics, Demographics::default());
        assert_eq!(summary.capacity, None);
        assert_eq!(summary.data_quality, 0.);
    }

    #[test]
    fn collection_rate_zero_only_without_billing() {
        let unpaid = Patients::new(vec![billed("HMS-2024-A", 100., 0.)]);
        let fin = Financials::from_records(&unpaid);
        assert_eq!(fin.collection_rate, 0.);
        assert_eq!(fin.total_billed, 100.);
        let free = Patients::new(vec![billed("HMS-2024-A", 0., 50.)]);
        assert_eq!(Financials::from_records(&free).collection_rate, 0.);
    }

    #[test]
    fn age_scenario() {
        let patients: Patients = [10u8, 20, 40, 60, 80]
            .iter()
            .enumerate()
            .map(|(idx, age)| {
                let mut rec = record(&format!("HMS-2024-{}", idx));
                rec.age = *age;
                rec
            })
            .collect();
        let summary = Aggregator::default().summarise(&patients, today());
        let brackets: Vec<_> = summary
            .age_brackets
            .iter()
            .map(|b| (b.label.to_string(), b.count))
            .collect();
        assert_eq!(
            brackets,
            [
                ("0-18".to_string(), 1),
                ("19-35".to_string(), 1),
                ("36-50".to_string(), 1),
                ("51-65".to_string(), 1),
                ("65+".to_string(), 1),
            ]
        );
    }

    #[test]
    fn partitions_cover_every_record() {
        let mut records = Vec::new();
        for (idx, (sev, age, bill, paid)) in [
            (Severity::Critical, 0u8, 100., 0.),
            (Severity::Mild, 18, 100., 100.),
            (Severity::Unspecified, 19, 0., 0.),
            (Severity::Other("Life threatening".into()), 65, 100., 20.),
            (Severity::High, 66, 300., 0.),
            (Severity::High, 120, 0., 0.),
        ]
        .into_iter()
        .enumerate()
        {
            let mut rec = billed(&format!("HMS-2024-{}", idx), bill, paid);
            rec.condition_severity = sev;
            rec.age = age;
            records.push(rec);
        }
        let patients = Patients::new(records);
        let summary = Aggregator::default().summarise(&patients, today());
        let n = patients.len();
        assert_eq!(summary.payments.counts.values().sum::<usize>(), n);
        assert_eq!(summary.severity.values().sum::<usize>(), n);
        assert_eq!(summary.age_brackets.iter().map(|b| b.count).sum::<usize>(), n);
        assert_eq!(summary.insurance.insured + summary.insurance.uninsured, n);
        assert_eq!(summary.severity.get("Unspecified"), Some(&1));
        assert_eq!(summary.severity.get("High"), Some(&2));
        assert_eq!(summary.payments.unpaid_amount, 400.);
    }

    #[test]
    fn emergencies_and_localities() {
        let mut records = Vec::new();
        for (idx, (locality, sev, discharged)) in [
            ("Riverside", Severity::Critical, false),
            ("Riverside", Severity::Urgent, false),
            ("Hillview", Severity::High, true),
            ("", Severity::Mild, false),
            ("Hillview", Severity::Moderate, false),
        ]
        .into_iter()
        .enumerate()
        {
            let mut rec = record(&format!("HMS-2024-{}", idx));
            rec.locality = locality.into();
            rec.condition_severity = sev;
            if !discharged {
                rec.discharge_date = None;
            }
            records.push(rec);
        }
        let config = AnalysisConfig {
            top_localities: 2,
            ..AnalysisConfig::default()
        };
        let summary = Aggregator::new(config).summarise(&Patients::new(records), today());
        assert_eq!(summary.active_emergencies, 2);
        let localities: Vec<_> = summary
            .localities
            .iter()
            .map(|l| (l.label.to_string(), l.count))
            .collect();
        assert_eq!(
            localities,
            [("Hillview".to_string(), 2), ("Riverside".to_string(), 2)]
        );
    }

    #[test]
    fn timing_severity_and_capacity_sections() {
        let mut records = Vec::new();
        for day in 0..8 {
            let date = NaiveDate::from_ymd_opt(2024, 3, 20 + day).unwrap();
            let mut rec = record(&format!("HMS-2024-{}", day));
            rec.admission_date = Some(date);
            rec.timestamp = date.and_hms_opt(if day % 4 == 3 { 3 } else { 10 }, 0, 0);
            rec.condition_severity = Severity::Critical;
            rec.medical_history = "Sepsis".into();
            rec.age = 70;
            records.push(rec);
        }
        let summary = Aggregator::default().summarise(&Patients::new(records), today());

        assert_eq!(summary.peak_times.peak_hour.map(|h| h.hour), Some(10));
        assert_eq!(summary.peak_times.monthly.len(), 1);
        assert_eq!(summary.severity_trends.len(), 1);
        assert_eq!(summary.severity_trends[0].status, SeverityStatus::Alert);
        assert_eq!(summary.severity_correlation[0].risk, SeverityRisk::Critical);
        assert_eq!(summary.demographics.age_groups.len(), 1);
        assert_eq!(summary.demographics.age_groups[0].group.as_ref(), "Seniors (61+)");
        assert_eq!(summary.demographics.genders[0].total_cases, 8);
        let capacity = summary.capacity.unwrap();
        assert_eq!(capacity.average_daily_visits, 1.);
        assert_eq!(capacity.peak_daily_visits, 1.);
        assert_eq!(capacity.beds, 20);
    }

    #[test]
    fn quality_weights() {
        let mut full = record("HMS-2024-A");
        full.medical_history = "Asthma".into();
        let mut bare = record("HMS-2024-B");
        bare.admission_date = None;
        bare.locality = "".into();
        bare.age = 0;
        let patients = Patients::new(vec![full, bare]);
        // full scores 100, bare scores 0
        assert_eq!(data_quality(&patients), 50.);
    }
}
