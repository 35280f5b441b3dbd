//! Persistence of the record file, and the operations that change it.
//!
//! All changes go through [`RecordStore`]. The CSV implementation takes a writer lock, reads
//! the whole file, applies the change in memory and replaces the file with a fully written
//! temporary one. Readers never see a half-written file. The lock is an exclusive lock on a
//! `<file>.lock` file next to the records, so writers in different processes exclude each
//! other too.
use crate::{
    derive, loader, ArcStr, Config, EmergencyCase, EmergencyQueue, PatientId, PatientRecord,
    Patients, PaymentStatus, Severity,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use fs2::FileExt;
use parking_lot::Mutex;
use qu::ick_use::*;
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no patient with ID \"{0}\"")]
    NotFound(PatientId),
    #[error("a patient with ID \"{0}\" already exists")]
    Duplicate(PatientId),
    #[error("invalid payment amount {0}")]
    InvalidPayment(f64),
    #[error("could not read \"{}\": {cause:#}", path.display())]
    Read { path: PathBuf, cause: anyhow::Error },
    #[error("could not encode records for \"{}\"", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("could not lock \"{}\"", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not write \"{}\"", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Somewhere patient records live.
pub trait RecordStore {
    /// Every record. A store that doesn't exist yet is empty.
    fn load_all(&self) -> Result<Patients, StoreError>;

    /// Add one record. Fails with [`StoreError::Duplicate`] if its ID is taken.
    fn append(&self, record: &PatientRecord) -> Result<(), StoreError>;

    /// Read everything, let `mutator` change it, and write it back as one atomic step.
    ///
    /// If `mutator` fails nothing is written.
    fn apply_atomic<T, F>(&self, mutator: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Patients) -> Result<T, StoreError>;
}

/// A record store backed by one delimited text file.
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    delimiter: u8,
    write_lock: Mutex<()>,
}

impl CsvStore {
    /// `delimiter` is used whenever the whole file is written.
    pub fn new(path: impl Into<PathBuf>, delimiter: u8) -> Self {
        CsvStore {
            path: path.into(),
            delimiter,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store.path.clone(), config.delimiter())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".lock");
        path.into()
    }

    /// Block until this process holds the writer lock. It is released when the returned file
    /// is dropped.
    fn lock_writers(&self) -> Result<fs::File, StoreError> {
        let path = self.lock_path();
        let lock_error = |source| StoreError::Lock {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(lock_error)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(lock_error)?;
        file.lock_exclusive().map_err(lock_error)?;
        Ok(file)
    }

    /// The raw file, or `None` if there isn't one.
    fn read_bytes(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                path: self.path.clone(),
                cause: e.into(),
            }),
        }
    }

    fn parse(&self, bytes: Option<&[u8]>) -> Result<Patients, StoreError> {
        match bytes {
            None => Ok(Patients::default()),
            Some(bytes) => loader::load_from_reader(bytes).map_err(|cause| StoreError::Read {
                path: self.path.clone(),
                cause,
            }),
        }
    }

    /// Replace the file with `patients`, via a temporary file in the same directory.
    fn write_all(&self, patients: &Patients) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_writer(&mut tmp);
            writer
                .write_record(loader::COLUMNS)
                .map_err(|e| self.csv_error(e))?;
            for rec in patients.iter_ref() {
                writer
                    .write_record(to_row(rec))
                    .map_err(|e| self.csv_error(e))?;
            }
            writer.flush().map_err(|e| self.write_error(e))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;
        event!(
            Level::INFO,
            "wrote {} records to \"{}\"",
            patients.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Add one row to the end of the file without rewriting it.
    fn append_in_place(
        &self,
        record: &PatientRecord,
        delimiter: u8,
        needs_newline: bool,
    ) -> Result<(), StoreError> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(e))?;
        if needs_newline {
            file.write_all(b"\n").map_err(|e| self.write_error(e))?;
        }
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .from_writer(&mut file);
            writer
                .write_record(to_row(record))
                .map_err(|e| self.csv_error(e))?;
            writer.flush().map_err(|e| self.write_error(e))?;
        }
        file.sync_all().map_err(|e| self.write_error(e))
    }
}

impl RecordStore for CsvStore {
    fn load_all(&self) -> Result<Patients, StoreError> {
        let bytes = self.read_bytes()?;
        self.parse(bytes.as_deref())
    }

    fn append(&self, record: &PatientRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let _lock = self.lock_writers()?;
        let bytes = self.read_bytes()?;
        let mut patients = self.parse(bytes.as_deref())?;
        if patients.find_by_id(record.patient_id.as_str()).is_some() {
            return Err(StoreError::Duplicate(record.patient_id.clone()));
        }

        let first_line = bytes
            .as_deref()
            .and_then(|b| b.split(|c| *c == b'\n').next())
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        if loader::is_canonical_header(&first_line) {
            let bytes = bytes.as_deref().unwrap_or_default();
            let needs_newline = !bytes.ends_with(b"\n");
            let delimiter = loader::sniff_delimiter(&first_line);
            self.append_in_place(record, delimiter, needs_newline)?;
            event!(
                Level::INFO,
                "appended {} to \"{}\"",
                record.patient_id,
                self.path.display()
            );
            Ok(())
        } else {
            // no file, or an older column layout
            patients.push(record.clone());
            self.write_all(&patients)
        }
    }

    fn apply_atomic<T, F>(&self, mutator: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Patients) -> Result<T, StoreError>,
    {
        let _guard = self.write_lock.lock();
        let _lock = self.lock_writers()?;
        let mut patients = self.load_all()?;
        let out = mutator(&mut patients)?;
        self.write_all(&patients)?;
        Ok(out)
    }
}

/// A record's cells in persisted column order.
fn to_row(rec: &PatientRecord) -> [String; 17] {
    [
        rec.patient_id.to_string(),
        rec.name.to_string(),
        rec.age.to_string(),
        rec.gender.to_string(),
        rec.locality.to_string(),
        rec.condition_severity.to_string(),
        rec.priority_level.to_string(),
        rec.medical_history.to_string(),
        rec.bill_amount.to_string(),
        rec.amount_paid.to_string(),
        rec.outstanding_amount.to_string(),
        rec.payment_status.to_string(),
        if rec.insurance_coverage { "Yes" } else { "No" }.to_string(),
        rec.insurance_details.to_string(),
        format_date(rec.admission_date),
        format_date(rec.discharge_date),
        rec.timestamp
            .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            .unwrap_or_default(),
    ]
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// What the front desk enters for a new patient.
#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub name: ArcStr,
    pub age: u8,
    pub gender: ArcStr,
    pub locality: ArcStr,
    pub condition_severity: Severity,
    pub priority_level: ArcStr,
    pub medical_history: ArcStr,
    pub bill_amount: f64,
    pub amount_paid: f64,
    pub insurance_coverage: bool,
    pub insurance_details: ArcStr,
    /// Derived from the amounts when not given.
    pub payment_status: Option<PaymentStatus>,
}

impl NewPatient {
    pub fn into_record(self, patient_id: PatientId, now: NaiveDateTime) -> PatientRecord {
        let explicit_status = self.payment_status.is_some();
        let mut record = PatientRecord {
            patient_id,
            name: self.name,
            age: self.age.min(120),
            gender: self.gender,
            locality: self.locality,
            condition_severity: self.condition_severity,
            priority_level: self.priority_level,
            medical_history: self.medical_history,
            bill_amount: self.bill_amount,
            amount_paid: self.amount_paid,
            outstanding_amount: 0.,
            payment_status: self.payment_status.unwrap_or(PaymentStatus::Unpaid),
            insurance_coverage: self.insurance_coverage,
            insurance_details: self.insurance_details,
            admission_date: Some(now.date()),
            discharge_date: None,
            timestamp: Some(now),
        };
        derive::normalize(&mut record, explicit_status);
        record
    }
}

fn check_amount(amount: f64) -> Result<(), StoreError> {
    if amount.is_finite() && amount >= 0. {
        Ok(())
    } else {
        Err(StoreError::InvalidPayment(amount))
    }
}

/// Admit a new patient under a fresh identifier.
pub fn register<S: RecordStore>(
    store: &S,
    patient: NewPatient,
    now: NaiveDateTime,
) -> Result<PatientRecord, StoreError> {
    check_amount(patient.bill_amount)?;
    check_amount(patient.amount_paid)?;
    let record = patient.into_record(PatientId::generate(now.year()), now);
    store.append(&record)?;
    event!(Level::INFO, "registered patient {}", record.patient_id);
    Ok(record)
}

/// Set the total paid by a patient so far.
pub fn update_payment<S: RecordStore>(
    store: &S,
    id: &str,
    amount_paid: f64,
    status: Option<PaymentStatus>,
) -> Result<PatientRecord, StoreError> {
    check_amount(amount_paid)?;
    store.apply_atomic(|patients| {
        let record = patients
            .find_by_id_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.into()))?;
        derive::apply_payment(record, amount_paid, status);
        Ok(record.clone())
    })
}

/// Add a payment to what a patient has already paid.
pub fn record_payment<S: RecordStore>(
    store: &S,
    id: &str,
    increment: f64,
) -> Result<PatientRecord, StoreError> {
    if !(increment.is_finite() && increment > 0.) {
        return Err(StoreError::InvalidPayment(increment));
    }
    store.apply_atomic(|patients| {
        let record = patients
            .find_by_id_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.into()))?;
        let total = record.amount_paid + increment;
        derive::apply_payment(record, total, None);
        Ok(record.clone())
    })
}

pub fn discharge<S: RecordStore>(
    store: &S,
    id: &str,
    date: NaiveDate,
) -> Result<PatientRecord, StoreError> {
    store.apply_atomic(|patients| {
        let record = patients
            .find_by_id_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.into()))?;
        record.discharge_date = Some(date);
        Ok(record.clone())
    })
}

/// Put a patient on the emergency list.
///
/// An existing patient is readmitted with the new severity and condition. Otherwise a new
/// record is created, under `id` if given or a fresh identifier if not.
pub fn admit_emergency<S: RecordStore>(
    store: &S,
    id: Option<PatientId>,
    name: &str,
    severity: Severity,
    condition: &str,
    now: NaiveDateTime,
) -> Result<PatientRecord, StoreError> {
    let id = id.unwrap_or_else(|| PatientId::generate(now.year()));
    store.apply_atomic(|patients| {
        if let Some(record) = patients.find_by_id_mut(id.as_str()) {
            record.condition_severity = severity;
            record.medical_history = condition.trim().into();
            record.discharge_date = None;
            record.timestamp = Some(now);
            if record.admission_date.is_none() {
                record.admission_date = Some(now.date());
            }
            event!(Level::INFO, "readmitted {} as an emergency", id);
            return Ok(record.clone());
        }
        let record = NewPatient {
            name: name.trim().into(),
            condition_severity: severity,
            medical_history: condition.trim().into(),
            ..NewPatient::default()
        }
        .into_record(id.clone(), now);
        patients.push(record.clone());
        event!(Level::INFO, "admitted {} as an emergency", id);
        Ok(record)
    })
}

/// Discharge the most urgent active emergency. `None` if there are none.
pub fn process_next_emergency<S: RecordStore>(
    store: &S,
    today: NaiveDate,
) -> Result<Option<EmergencyCase>, StoreError> {
    store.apply_atomic(|patients| {
        let mut queue = EmergencyQueue::from_patients(patients);
        let case = match queue.pop_highest_priority() {
            Some(case) => case,
            None => return Ok(None),
        };
        let record = patients
            .find_by_id_mut(case.patient_id.as_str())
            .ok_or_else(|| StoreError::NotFound(case.patient_id.clone()))?;
        record.discharge_date = Some(today);
        event!(
            Level::INFO,
            "processed emergency {} ({} remaining)",
            case.patient_id,
            queue.size()
        );
        Ok(Some(case))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::record;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .and_then(|d| d.and_hms_opt(9, 15, 30))
            .unwrap()
    }

    fn store_in(dir: &tempfile::TempDir) -> CsvStore {
        CsvStore::new(dir.path().join("records.csv"), b',')
    }

    fn with_status(id: &str, bill: f64, paid: f64) -> PatientRecord {
        let mut rec = record(id);
        rec.name = "Doe, \"Jane\"".into();
        rec.bill_amount = bill;
        rec.amount_paid = paid;
        rec.insurance_coverage = true;
        rec.insurance_details = "Policy 7".into();
        rec.medical_history = "Asthma".into();
        rec.timestamp = Some(now());
        derive::normalize(&mut rec, false);
        rec
    }

    #[test]
    fn round_trip_every_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut waived = with_status("HMS-2024-E", 300., 0.);
        waived.payment_status = PaymentStatus::Other("Waived".into());
        let records = vec![
            with_status("HMS-2024-A", 1000., 0.),
            with_status("HMS-2024-B", 1000., 250.5),
            with_status("HMS-2024-C", 1000., 1000.),
            with_status("HMS-2024-D", 0., 0.),
            waived,
        ];
        store
            .apply_atomic(|patients| {
                for rec in &records {
                    patients.push(rec.clone());
                }
                Ok(())
            })
            .unwrap();
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), records.len());
        for (loaded, original) in loaded.iter_ref().zip(&records) {
            assert_eq!(loaded, original);
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(&dir).load_all().unwrap().is_empty());
    }

    #[test]
    fn append_in_place_keeps_file_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.tsv");
        loader::provision(&path, b'\t').unwrap();
        // configured with commas, but the file already uses tabs
        let store = CsvStore::new(&path, b',');
        store.append(&with_status("HMS-2024-A", 10., 0.)).unwrap();
        store.append(&with_status("HMS-2024-B", 10., 0.)).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().starts_with("HMS-2024-A\t"));
        assert_eq!(store.load_all().unwrap().len(), 2);

        let err = store.append(&with_status("HMS-2024-A", 10., 0.)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn append_rewrites_legacy_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "PatientID,Name,BillAmount\nHMS-2023-Z,Old,50").unwrap();
        store.append(&with_status("HMS-2024-A", 10., 0.)).unwrap();
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(loader::is_canonical_header(text.lines().next().unwrap()));
        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.find_by_id("HMS-2023-Z").unwrap().bill_amount, 50.);
    }

    #[test]
    fn overpayment_clamps_outstanding() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&with_status("HMS-2024-X", 800., 0.)).unwrap();
        let rec = update_payment(&store, "HMS-2024-X", 1000., None).unwrap();
        assert_eq!(rec.outstanding_amount, 0.);
        assert_eq!(rec.amount_paid, 1000.);
        assert_eq!(rec.payment_status, PaymentStatus::FullyPaid);
        let stored = store.load_all().unwrap();
        assert_eq!(stored.find_by_id("HMS-2024-X").unwrap(), &rec);
    }

    #[test]
    fn not_found_is_not_a_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&with_status("HMS-2024-A", 800., 0.)).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();
        let err = update_payment(&store, "HMS-2024-NOPE", 10., None).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref id) if id.as_str() == "HMS-2024-NOPE"));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);

        let err = update_payment(&store, "HMS-2024-A", -1., None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidPayment(_)));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // the parent "directory" is a file, so nothing can be written under it
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let store = CsvStore::new(blocker.join("records.csv"), b',');
        let err = store.apply_atomic(|_| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Lock { .. } | StoreError::Write { .. } | StoreError::Read { .. }
        ));
    }

    #[test]
    fn separate_stores_on_one_file_do_not_lose_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.csv");
        CsvStore::new(&path, b',')
            .append(&with_status("HMS-2024-A", 1000., 0.))
            .unwrap();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let path = &path;
                scope.spawn(move || {
                    // as if each writer were its own process
                    let store = CsvStore::new(path, b',');
                    for _ in 0..50 {
                        record_payment(&store, "HMS-2024-A", 1.).unwrap();
                    }
                });
            }
        });
        let stored = CsvStore::new(&path, b',').load_all().unwrap();
        let rec = stored.find_by_id("HMS-2024-A").unwrap();
        assert_eq!(rec.amount_paid, 200.);
        assert_eq!(rec.outstanding_amount, 800.);
        assert!(CsvStore::new(&path, b',').lock_path().exists());
    }

    #[test]
    fn payments_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&with_status("HMS-2024-A", 1000., 0.)).unwrap();
        record_payment(&store, "HMS-2024-A", 300.).unwrap();
        let rec = record_payment(&store, "HMS-2024-A", 200.).unwrap();
        assert_eq!(rec.amount_paid, 500.);
        assert_eq!(rec.outstanding_amount, 500.);
        assert_eq!(rec.payment_status, PaymentStatus::PartiallyPaid);
        assert!(matches!(
            record_payment(&store, "HMS-2024-A", 0.),
            Err(StoreError::InvalidPayment(_))
        ));
    }

    #[test]
    fn registration_assigns_unique_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let patient = NewPatient {
            name: "Asha".into(),
            age: 30,
            bill_amount: 1200.,
            amount_paid: 200.,
            ..NewPatient::default()
        };
        let a = register(&store, patient.clone(), now()).unwrap();
        let b = register(&store, patient, now()).unwrap();
        assert_ne!(a.patient_id, b.patient_id);
        assert!(a.patient_id.is_well_formed());
        assert!(a.patient_id.as_str().starts_with("HMS-2024-"));
        assert_eq!(a.admission_date, Some(now().date()));
        assert_eq!(a.outstanding_amount, 1000.);
        assert_eq!(a.payment_status, PaymentStatus::PartiallyPaid);
        assert_eq!(store.load_all().unwrap().len(), 2);
    }

    #[test]
    fn emergency_admission_and_processing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let mut known = with_status("HMS-2024-K", 0., 0.);
        known.condition_severity = Severity::Mild;
        store.append(&known).unwrap();

        let readmitted = admit_emergency(
            &store,
            Some("HMS-2024-K".into()),
            "ignored",
            Severity::High,
            "Fracture",
            now(),
        )
        .unwrap();
        assert_eq!(readmitted.discharge_date, None);
        assert_eq!(&*readmitted.medical_history, "Fracture");
        assert_eq!(&*readmitted.name, "Doe, \"Jane\"");

        let fresh = admit_emergency(&store, None, "Ravi", Severity::Critical, "", now()).unwrap();
        assert!(fresh.patient_id.is_well_formed());
        assert_eq!(store.load_all().unwrap().len(), 2);

        let today = now().date();
        let first = process_next_emergency(&store, today).unwrap().unwrap();
        assert_eq!(first.patient_id, fresh.patient_id);
        assert_eq!(&*first.condition, "Critical condition");
        let second = process_next_emergency(&store, today).unwrap().unwrap();
        assert_eq!(second.patient_id.as_str(), "HMS-2024-K");
        assert!(process_next_emergency(&store, today).unwrap().is_none());

        let stored = store.load_all().unwrap();
        assert!(stored.iter_ref().all(|rec| rec.discharge_date == Some(today)));
    }

    #[test]
    fn discharge_sets_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.append(&with_status("HMS-2024-A", 0., 0.)).unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        assert_eq!(discharge(&store, "HMS-2024-A", day).unwrap().discharge_date, Some(day));
        assert!(matches!(
            discharge(&store, "HMS-2024-B", day),
            Err(StoreError::NotFound(_))
        ));
    }
}
