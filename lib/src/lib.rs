pub mod aggregate;
pub mod config;
pub mod derive;
pub mod loader;
pub mod queue;
mod range;
pub mod report;
pub mod store;
mod util;

pub use anyhow::{Context, Error};
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use qu::ick_use::*;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::{borrow::Borrow, collections::BTreeMap, fmt, ops::Deref, str::FromStr, sync::Arc};
use term_data_table::{Cell, Row};

pub use crate::{
    aggregate::{Aggregator, Financials, Summary},
    config::Config,
    queue::{EmergencyCase, EmergencyQueue},
    range::{Range, RangeSet, RangeSetCounts},
    store::{CsvStore, NewPatient, RecordStore, StoreError},
    util::{header, Table},
};

pub type ArcStr = Arc<str>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;

static PATIENT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^HMS-\d{4}-[A-Za-z0-9]+$").expect("patient ID regex is valid"));

/// Identifies one hospital encounter, `HMS-<year>-<suffix>`.
///
/// Records loaded from disk keep whatever identifier they were stored with, so a `PatientId` is
/// not guaranteed to be well formed. Use [`PatientId::is_well_formed`] to check.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PatientId(ArcStr);

impl PatientId {
    /// Create a fresh identifier for the given year.
    ///
    /// The suffix is a random 128-bit token, so identifiers stay unique no matter how many
    /// registrations happen in the same minute.
    pub fn generate(year: i32) -> Self {
        let id = format!("HMS-{:04}-{}", year, uuid::Uuid::new_v4().simple());
        event!(Level::DEBUG, "generated patient ID {}", id);
        PatientId(id.into())
    }

    pub fn is_well_formed(&self) -> bool {
        PATIENT_ID_RE.is_match(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PatientId {
    fn from(s: &str) -> Self {
        PatientId(s.trim().into())
    }
}

impl From<String> for PatientId {
    fn from(s: String) -> Self {
        PatientId::from(s.as_str())
    }
}

impl Borrow<str> for PatientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How serious the patient's condition is.
///
/// The data uses two vocabularies (clinical severity and triage priority), so both are accepted.
/// Unknown labels are kept verbatim so records survive a rewrite unchanged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    Emergency,
    High,
    Urgent,
    Severe,
    Moderate,
    Standard,
    Mild,
    Routine,
    Unspecified,
    Other(ArcStr),
}

impl Severity {
    pub fn label(&self) -> &str {
        use Severity::*;
        match self {
            Critical => "Critical",
            Emergency => "Emergency",
            High => "High",
            Urgent => "Urgent",
            Severe => "Severe",
            Moderate => "Moderate",
            Standard => "Standard",
            Mild => "Mild",
            Routine => "Routine",
            Unspecified => "",
            Other(label) => label,
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Unspecified
    }
}

impl FromStr for Severity {
    type Err = std::convert::Infallible;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        use Severity::*;
        let input = input.trim();
        Ok(match input.to_ascii_lowercase().as_str() {
            "" => Unspecified,
            "critical" => Critical,
            "emergency" => Emergency,
            "high" => High,
            "urgent" => Urgent,
            "severe" => Severe,
            "moderate" => Moderate,
            "standard" => Standard,
            "mild" => Mild,
            "routine" => Routine,
            _ => Other(input.into()),
        })
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.label())
    }
}

/// Triage rank of an emergency case. Declaration order is queue order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Priority {
    Emergency,
    Urgent,
    Standard,
    Routine,
}

impl Priority {
    /// 1 is the most urgent.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Emergency => 1,
            Priority::Urgent => 2,
            Priority::Standard => 3,
            Priority::Routine => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Emergency => "Emergency",
            Priority::Urgent => "Urgent",
            Priority::Standard => "Standard",
            Priority::Routine => "Routine",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    FullyPaid,
    NotApplicable,
    Other(ArcStr),
}

impl PaymentStatus {
    /// The four statuses the billing rules can produce.
    pub const DERIVED: [PaymentStatus; 4] = [
        PaymentStatus::Unpaid,
        PaymentStatus::PartiallyPaid,
        PaymentStatus::FullyPaid,
        PaymentStatus::NotApplicable,
    ];

    pub fn label(&self) -> &str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::PartiallyPaid => "Partially Paid",
            PaymentStatus::FullyPaid => "Fully Paid",
            PaymentStatus::NotApplicable => "Not Applicable",
            PaymentStatus::Other(label) => label,
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = std::convert::Infallible;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        Ok(match input.to_ascii_lowercase().as_str() {
            "unpaid" => PaymentStatus::Unpaid,
            "partially paid" | "partial" => PaymentStatus::PartiallyPaid,
            "fully paid" | "paid" => PaymentStatus::FullyPaid,
            "not applicable" | "n/a" => PaymentStatus::NotApplicable,
            _ => PaymentStatus::Other(input.into()),
        })
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.label())
    }
}

/// One hospital encounter, as stored in the record file.
///
/// Fields are declared in the order of the persisted columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    pub patient_id: PatientId,
    pub name: ArcStr,
    pub age: u8,
    pub gender: ArcStr,
    pub locality: ArcStr,
    pub condition_severity: Severity,
    pub priority_level: ArcStr,
    pub medical_history: ArcStr,
    pub bill_amount: f64,
    pub amount_paid: f64,
    /// `max(0, bill_amount - amount_paid)` unless the source file said otherwise.
    pub outstanding_amount: f64,
    pub payment_status: PaymentStatus,
    pub insurance_coverage: bool,
    pub insurance_details: ArcStr,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Whether a patient is still in hospital.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdmissionStatus {
    Active,
    Discharged,
}

impl FromStr for AdmissionStatus {
    type Err = Error;
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AdmissionStatus::Active),
            "discharged" => Ok(AdmissionStatus::Discharged),
            _ => Err(format_err!(
                "expected \"active\" or \"discharged\", found \"{}\"",
                input
            )),
        }
    }
}

/// The loaded list of records, with a pre-built index for the `patient_id` field.
#[derive(Debug, Clone, Default)]
pub struct Patients {
    els: Arc<Vec<PatientRecord>>,
    id_idx: BTreeMap<PatientId, usize>,
}

impl Patients {
    pub fn new(els: Vec<PatientRecord>) -> Self {
        let mut this = Patients {
            els: els.into(),
            id_idx: BTreeMap::new(),
        };
        this.rebuild_index();
        this
    }

    pub fn find_by_id(&self, id: &str) -> Option<&PatientRecord> {
        let idx = self.id_idx.get(id)?;
        self.els.get(*idx)
    }

    /// Note this will clone the records internally if they are shared. Other clones of `self`
    /// will not be updated.
    pub fn find_by_id_mut(&mut self, id: &str) -> Option<&mut PatientRecord> {
        let idx = *self.id_idx.get(id)?;
        Arc::make_mut(&mut self.els).get_mut(idx)
    }

    pub fn push(&mut self, record: PatientRecord) {
        let idx = self.els.len();
        self.id_idx.insert(record.patient_id.clone(), idx);
        Arc::make_mut(&mut self.els).push(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = PatientRecord> + '_ {
        self.els.iter().cloned()
    }

    pub fn iter_ref(&self) -> impl Iterator<Item = &PatientRecord> + '_ {
        self.els.iter()
    }

    pub fn filter(&self, f: impl Fn(&PatientRecord) -> bool) -> Self {
        Patients::new(self.iter_ref().filter(|rec| f(rec)).cloned().collect())
    }

    pub fn retain(&mut self, f: impl Fn(&PatientRecord) -> bool) {
        Arc::make_mut(&mut self.els).retain(f);
        self.rebuild_index();
    }

    /// Case-insensitive search over name, identifier and medical history, optionally narrowed
    /// by severity and by whether the patient has been discharged.
    pub fn search(
        &self,
        query: &str,
        severity: Option<&Severity>,
        status: Option<AdmissionStatus>,
    ) -> Self {
        let query = query.trim().to_lowercase();
        self.filter(|rec| {
            let text_match = query.is_empty()
                || rec.name.to_lowercase().contains(&query)
                || rec.patient_id.as_str().to_lowercase().contains(&query)
                || rec.medical_history.to_lowercase().contains(&query);
            let severity_match = severity.map_or(true, |sev| rec.condition_severity == *sev);
            let status_match = match status {
                None => true,
                Some(AdmissionStatus::Active) => rec.discharge_date.is_none(),
                Some(AdmissionStatus::Discharged) => rec.discharge_date.is_some(),
            };
            text_match && severity_match && status_match
        })
    }

    pub fn term_table(&self) -> term_data_table::Table<'static> {
        let mut table = term_data_table::Table::new().with_row(
            ["patient ID", "name", "age", "severity", "bill", "status", "admitted"]
                .into_iter()
                .fold(Row::new(), |row, h| row.with_cell(Cell::from(h))),
        );
        for rec in self.iter_ref() {
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(rec.patient_id.to_string()))
                    .with_cell(Cell::from(rec.name.to_string()))
                    .with_cell(Cell::from(rec.age.to_string()))
                    .with_cell(Cell::from(rec.condition_severity.to_string()))
                    .with_cell(Cell::from(format!("{:.2}", rec.bill_amount)))
                    .with_cell(Cell::from(rec.payment_status.to_string()))
                    .with_cell(Cell::from(
                        rec.admission_date
                            .map(|d| d.to_string())
                            .unwrap_or_default(),
                    )),
            );
        }
        table
    }

    fn rebuild_index(&mut self) {
        self.id_idx.clear();
        for (idx, el) in self.els.iter().enumerate() {
            self.id_idx.insert(el.patient_id.clone(), idx);
        }
    }
}

impl Deref for Patients {
    type Target = [PatientRecord];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}

impl<'a> IntoIterator for &'a Patients {
    type IntoIter = <&'a [PatientRecord] as IntoIterator>::IntoIter;
    type Item = &'a PatientRecord;
    fn into_iter(self) -> Self::IntoIter {
        self.els.iter()
    }
}

impl FromIterator<PatientRecord> for Patients {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = PatientRecord>,
    {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;

    /// A discharged, uninsured record with no money involved. Tests adjust the fields they
    /// care about.
    pub fn record(id: &str) -> PatientRecord {
        PatientRecord {
            patient_id: id.into(),
            name: "Test Patient".into(),
            age: 40,
            gender: "Female".into(),
            locality: "Riverside".into(),
            condition_severity: Severity::Mild,
            priority_level: "".into(),
            medical_history: "".into(),
            bill_amount: 0.,
            amount_paid: 0.,
            outstanding_amount: 0.,
            payment_status: PaymentStatus::NotApplicable,
            insurance_coverage: false,
            insurance_details: "".into(),
            admission_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            discharge_date: NaiveDate::from_ymd_opt(2024, 3, 4),
            timestamp: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{test_util::record, *};

    #[test]
    fn generated_ids_are_well_formed_and_distinct() {
        let a = PatientId::generate(2024);
        let b = PatientId::generate(2024);
        assert!(a.is_well_formed());
        assert!(a.as_str().starts_with("HMS-2024-"));
        assert_ne!(a, b);
        assert!(!PatientId::from("patient-7").is_well_formed());
    }

    #[test]
    fn severity_labels_round_trip() {
        for label in ["Critical", "Urgent", "Mild", "Life threatening", ""] {
            let sev: Severity = label.parse().unwrap();
            assert_eq!(sev.to_string(), label);
        }
        assert_eq!("high".parse::<Severity>().unwrap(), Severity::High);
    }

    #[test]
    fn index_follows_mutation() {
        let mut patients = Patients::new(vec![record("HMS-2024-A"), record("HMS-2024-B")]);
        patients.push(record("HMS-2024-C"));
        assert_eq!(patients.len(), 3);
        patients.find_by_id_mut("HMS-2024-B").unwrap().age = 71;
        assert_eq!(patients.find_by_id("HMS-2024-B").unwrap().age, 71);

        patients.retain(|rec| rec.patient_id.as_str() != "HMS-2024-A");
        assert!(patients.find_by_id("HMS-2024-A").is_none());
        assert_eq!(patients.find_by_id("HMS-2024-C").unwrap().patient_id.as_str(), "HMS-2024-C");
    }

    #[test]
    fn search_filters_combine() {
        let mut asthma = record("HMS-2024-A");
        asthma.name = "Ravi Kumar".into();
        asthma.medical_history = "Asthma".into();
        asthma.discharge_date = None;
        let mut stroke = record("HMS-2024-B");
        stroke.medical_history = "Stroke".into();
        stroke.condition_severity = Severity::Critical;
        let patients = Patients::new(vec![asthma, stroke]);

        assert_eq!(patients.search("ravi", None, None).len(), 1);
        assert_eq!(patients.search("ASTHMA", None, None).len(), 1);
        assert_eq!(patients.search("", Some(&Severity::Critical), None).len(), 1);
        let active = patients.search("", None, Some(AdmissionStatus::Active));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].patient_id.as_str(), "HMS-2024-A");
        assert!(patients
            .search("stroke", None, Some(AdmissionStatus::Active))
            .is_empty());
    }

    #[test]
    fn term_table_outlives_the_records() {
        fn build() -> term_data_table::Table<'static> {
            Patients::new(vec![record("HMS-2024-A")]).term_table()
        }
        let rendered = build().to_string();
        assert!(rendered.contains("HMS"));
    }
}
