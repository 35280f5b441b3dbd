//! Derived fields: outstanding balance, payment status and triage priority.
//!
//! These rules run whenever a record is loaded or changed, so every record the rest of the
//! crate sees has consistent money fields.
use crate::{ArcStr, EmergencyCase, PatientRecord, PaymentStatus, Priority, Severity};
use chrono::NaiveDateTime;

/// What is left to pay. Never negative.
pub fn outstanding(bill_amount: f64, amount_paid: f64) -> f64 {
    (bill_amount - amount_paid).max(0.)
}

impl PaymentStatus {
    /// The status implied by the money fields.
    pub fn from_amounts(bill_amount: f64, amount_paid: f64, outstanding_amount: f64) -> Self {
        if bill_amount == 0. {
            PaymentStatus::NotApplicable
        } else if outstanding_amount == 0. {
            PaymentStatus::FullyPaid
        } else if amount_paid > 0. {
            PaymentStatus::PartiallyPaid
        } else {
            PaymentStatus::Unpaid
        }
    }
}

/// Fill in derived money fields.
///
/// A zero outstanding amount on a billed record is taken to mean "not recorded" and is
/// recomputed. The payment status is only derived when the source didn't give one.
pub fn normalize(record: &mut PatientRecord, explicit_status: bool) {
    if record.outstanding_amount == 0. && record.bill_amount > 0. {
        record.outstanding_amount = outstanding(record.bill_amount, record.amount_paid);
    }
    if record.outstanding_amount < 0. {
        record.outstanding_amount = 0.;
    }
    if !explicit_status {
        record.payment_status = PaymentStatus::from_amounts(
            record.bill_amount,
            record.amount_paid,
            record.outstanding_amount,
        );
    }
}

/// Set the total paid so far and rederive the balance.
///
/// `amount_paid` is the new cumulative total, not an increment.
pub fn apply_payment(record: &mut PatientRecord, amount_paid: f64, status: Option<PaymentStatus>) {
    record.amount_paid = amount_paid;
    record.outstanding_amount = outstanding(record.bill_amount, amount_paid);
    record.payment_status = status.unwrap_or_else(|| {
        PaymentStatus::from_amounts(
            record.bill_amount,
            record.amount_paid,
            record.outstanding_amount,
        )
    });
}

impl Severity {
    pub fn priority(&self) -> Priority {
        use Severity::*;
        match self {
            Critical | Emergency => Priority::Emergency,
            High | Urgent | Severe => Priority::Urgent,
            Moderate | Standard => Priority::Standard,
            Mild | Routine | Unspecified | Other(_) => Priority::Routine,
        }
    }

    /// Whether this severity puts an undischarged patient on the emergency list.
    pub fn is_emergency(&self) -> bool {
        self.priority() <= Priority::Urgent
    }
}

impl PatientRecord {
    pub fn is_discharged(&self) -> bool {
        self.discharge_date.is_some()
    }

    pub fn is_billed(&self) -> bool {
        self.bill_amount > 0.
    }

    pub fn is_active_emergency(&self) -> bool {
        !self.is_discharged() && self.condition_severity.is_emergency()
    }

    /// When the patient arrived, as precisely as the record knows.
    pub fn arrived_at(&self) -> Option<NaiveDateTime> {
        self.timestamp
            .or_else(|| self.admission_date.and_then(|d| d.and_hms_opt(0, 0, 0)))
    }

    /// This record as a triage queue entry, if it is an active emergency.
    pub fn emergency_case(&self) -> Option<EmergencyCase> {
        if !self.is_active_emergency() {
            return None;
        }
        let condition: ArcStr = if self.medical_history.trim().is_empty() {
            format!("{} condition", self.condition_severity).into()
        } else {
            self.medical_history.clone()
        };
        Some(EmergencyCase {
            patient_id: self.patient_id.clone(),
            name: self.name.clone(),
            condition,
            severity: self.condition_severity.clone(),
            priority: self.condition_severity.priority(),
            time_added: self.arrived_at(),
        })
    }
}
