//! Reading patient records from delimited text.
//!
//! Reading is lenient: values that don't parse take a neutral default, and rows that can't be
//! decoded at all are logged and skipped. Only failing to open or read the file is an error.
use crate::{
    derive,
    util::{self, lenient_age, lenient_date, lenient_f64, lenient_timestamp, optional_string},
    ArcStr, PatientRecord, Patients, PaymentStatus, Result, Severity,
};
use chrono::{NaiveDate, NaiveDateTime};
use qu::ick_use::*;
use serde::Deserialize;
use std::{
    collections::BTreeSet,
    fs,
    io::{self, Read},
    path::Path,
};

/// The persisted columns, in order.
pub const COLUMNS: [&str; 17] = [
    "patient_id",
    "name",
    "age",
    "gender",
    "locality",
    "condition_severity",
    "priority_level",
    "medical_history",
    "bill_amount",
    "amount_paid",
    "outstanding_amount",
    "payment_status",
    "insurance_coverage",
    "insurance_details",
    "admission_date",
    "discharge_date",
    "timestamp",
];

/// Header names used by older exports.
const LEGACY_HEADERS: [(&str, &str); 17] = [
    ("PatientID", "patient_id"),
    ("Name", "name"),
    ("Age", "age"),
    ("Gender", "gender"),
    ("ConditionSeverity", "condition_severity"),
    ("AdmissionDate", "admission_date"),
    ("DischargeDate", "discharge_date"),
    ("AdmissionTimestamp", "admission_timestamp"),
    ("MedicalHistory", "medical_history"),
    ("BillAmount", "bill_amount"),
    ("PriorityLevel", "priority_level"),
    ("Locality", "locality"),
    ("InsuranceCoverage", "insurance_coverage"),
    ("InsuranceCoverageDetail", "insurance_details"),
    ("AmountPaid", "amount_paid"),
    ("OutstandingAmount", "outstanding_amount"),
    ("PaymentStatus", "payment_status"),
];

#[derive(Debug, Deserialize)]
struct PatientRaw {
    #[serde(default)]
    patient_id: String,
    #[serde(default)]
    name: String,
    #[serde(default, deserialize_with = "lenient_age")]
    age: u8,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    locality: String,
    #[serde(default)]
    condition_severity: String,
    #[serde(default)]
    priority_level: String,
    #[serde(default)]
    medical_history: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    bill_amount: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    amount_paid: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    outstanding_amount: f64,
    #[serde(default, deserialize_with = "optional_string")]
    payment_status: Option<ArcStr>,
    #[serde(default)]
    insurance_coverage: String,
    #[serde(default)]
    insurance_details: String,
    #[serde(default, deserialize_with = "lenient_date")]
    admission_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_date")]
    discharge_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<NaiveDateTime>,
}

impl From<PatientRaw> for PatientRecord {
    fn from(raw: PatientRaw) -> Self {
        let explicit_status = raw.payment_status.is_some();
        let mut record = PatientRecord {
            patient_id: raw.patient_id.into(),
            name: raw.name.trim().into(),
            age: raw.age,
            gender: raw.gender.trim().into(),
            locality: raw.locality.trim().into(),
            condition_severity: raw
                .condition_severity
                .parse::<Severity>()
                .unwrap_or_else(|e| match e {}),
            priority_level: raw.priority_level.trim().into(),
            medical_history: raw.medical_history.trim().into(),
            bill_amount: raw.bill_amount,
            amount_paid: raw.amount_paid,
            outstanding_amount: raw.outstanding_amount,
            payment_status: raw
                .payment_status
                .map(|s| s.parse::<PaymentStatus>().unwrap_or_else(|e| match e {}))
                .unwrap_or(PaymentStatus::Unpaid),
            insurance_coverage: util::parse_yes_no(&raw.insurance_coverage),
            insurance_details: raw.insurance_details.trim().into(),
            admission_date: raw.admission_date,
            discharge_date: raw.discharge_date,
            timestamp: raw.timestamp,
        };
        derive::normalize(&mut record, explicit_status);
        record
    }
}

/// Tab if the header line has one, otherwise comma.
pub fn sniff_delimiter(first_line: &str) -> u8 {
    if first_line.contains('\t') {
        b'\t'
    } else {
        b','
    }
}

/// Map one header cell to the field it feeds.
pub fn canonical_header(name: &str) -> String {
    let name = name.trim();
    LEGACY_HEADERS
        .iter()
        .find(|(legacy, _)| *legacy == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| name.to_lowercase())
}

/// Canonicalise a whole header row.
///
/// `admission_timestamp` only feeds `timestamp` when the file has no `timestamp` column of its
/// own, and repeated names after the first are renamed so they are ignored.
fn canonical_headers(headers: &csv::StringRecord) -> csv::StringRecord {
    let mut names: Vec<String> = headers.iter().map(canonical_header).collect();
    if !names.iter().any(|n| n == "timestamp") {
        if let Some(name) = names.iter_mut().find(|n| n.as_str() == "admission_timestamp") {
            *name = "timestamp".into();
        }
    }
    let mut seen = BTreeSet::new();
    for (idx, name) in names.iter_mut().enumerate() {
        if !seen.insert(name.clone()) {
            event!(
                Level::WARN,
                "ignoring repeated column \"{}\" at position {}",
                name,
                idx + 1
            );
            *name = format!("{}#{}", name, idx);
        }
    }
    csv::StringRecord::from(names)
}

/// Whether a header row is exactly the persisted column set, in order.
pub fn is_canonical_header(first_line: &str) -> bool {
    let delimiter = sniff_delimiter(first_line) as char;
    let cells: Vec<&str> = first_line
        .trim_end_matches(|c| c == '\r' || c == '\n')
        .split(delimiter)
        .map(|cell| cell.trim().trim_matches('"'))
        .collect();
    cells == COLUMNS
}

/// Read every record from delimited text. The delimiter is sniffed from the header line.
pub fn load_from_reader(mut reader: impl Read) -> Result<Patients> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).context("reading records")?;
    let input = buf.strip_prefix("\u{feff}".as_bytes()).unwrap_or(&buf[..]);

    let first_line = input.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let delimiter = sniff_delimiter(&String::from_utf8_lossy(first_line));

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    let headers = canonical_headers(reader.headers().context("reading header row")?);
    reader.set_headers(headers.clone());

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (idx, row) in reader.records().enumerate() {
        let decoded = row.and_then(|mut row| {
            // missing trailing columns take their defaults
            while row.len() < headers.len() {
                row.push_field("");
            }
            row.truncate(headers.len());
            row.deserialize::<PatientRaw>(Some(&headers))
        });
        match decoded {
            Ok(raw) => records.push(PatientRecord::from(raw)),
            Err(e) => {
                // +2: 1-based, and the header line
                event!(Level::WARN, "skipping row {}: {}", idx + 2, e);
                skipped += 1;
            }
        }
    }
    event!(
        Level::INFO,
        "loaded {} records ({} skipped)",
        records.len(),
        skipped
    );
    Ok(Patients::new(records))
}

/// Read every record in the file at `path`. A missing file has no records.
pub fn load_path(path: impl AsRef<Path>) -> Result<Patients> {
    fn inner(path: &Path) -> Result<Patients> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                event!(Level::WARN, "no record file at \"{}\"", path.display());
                return Ok(Patients::default());
            }
            Err(e) => return Err(e.into()),
        };
        load_from_reader(io::BufReader::new(file))
    }
    let path = path.as_ref();
    inner(path).with_context(|| format!("loading patient records from \"{}\"", path.display()))
}

/// Create an empty record file with just the header row, if there isn't one already.
///
/// Returns whether a file was created.
pub fn provision(path: impl AsRef<Path>, delimiter: u8) -> Result<bool> {
    fn inner(path: &Path, delimiter: u8) -> Result<bool> {
        if util::path_exists(path)? {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)?;
        writer.write_record(COLUMNS)?;
        writer.flush()?;
        event!(Level::INFO, "created record file \"{}\"", path.display());
        Ok(true)
    }
    let path = path.as_ref();
    inner(path, delimiter)
        .with_context(|| format!("provisioning record file \"{}\"", path.display()))
}
