//! Triage ordering for active emergency cases.
use crate::{ArcStr, PatientId, Patients, Priority, Severity};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::{cmp::Ordering, collections::BinaryHeap};

/// An active emergency, as shown on the triage list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyCase {
    pub patient_id: PatientId,
    pub name: ArcStr,
    pub condition: ArcStr,
    pub severity: Severity,
    pub priority: Priority,
    pub time_added: Option<NaiveDateTime>,
}

impl EmergencyCase {
    /// `time_added` for display, e.g. `03/01/2024 09:15 AM`.
    pub fn formatted_time(&self) -> String {
        match self.time_added {
            Some(time) => time.format("%m/%d/%Y %I:%M %p").to_string(),
            None => "Unknown".into(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    case: EmergencyCase,
    seq: u64,
}

impl Entry {
    fn key(&self) -> (Priority, u64) {
        (self.case.priority, self.seq)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // `BinaryHeap` pops the greatest element, so the most urgent, earliest entry must compare
    // greatest.
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Priority queue of emergency cases. Lowest rank first, and first-come first-served within a
/// rank.
#[derive(Debug, Default)]
pub struct EmergencyQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EmergencyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every active emergency, in record order.
    pub fn from_patients(patients: &Patients) -> Self {
        let mut queue = Self::new();
        for case in patients.iter_ref().filter_map(|rec| rec.emergency_case()) {
            queue.push(case);
        }
        queue
    }

    pub fn push(&mut self, case: EmergencyCase) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { case, seq });
    }

    pub fn pop_highest_priority(&mut self) -> Option<EmergencyCase> {
        self.heap.pop().map(|entry| entry.case)
    }

    pub fn peek(&self) -> Option<&EmergencyCase> {
        self.heap.peek().map(|entry| &entry.case)
    }

    pub fn size(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// All cases, most urgent first.
    pub fn into_sorted_vec(self) -> Vec<EmergencyCase> {
        // `BinaryHeap::into_sorted_vec` is ascending, which here means least urgent first.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .rev()
            .map(|entry| entry.case)
            .collect()
    }
}
