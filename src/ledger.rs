//! Append-only credit ledger and the per-student totals derived from it.
//!
//! Totals are maintained incrementally on every append, and can always be
//! rebuilt from the record log alone with [`Ledger::replay_totals`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use thiserror::Error;

use crate::model::{CreditCategory, RequestId, StudentId, SubmissionId, Timestamp, UserId};
use crate::{CreditTotals, Credits};

/// Position of a record in the ledger.
pub type Seq = u64;

/// Errors raised by the ledger itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("refusing to post {amount} to student {student}: amount is negative")]
    InvalidAmount { student: StudentId, amount: Credits },

    #[error("refusing to post {amount} to student {student}: totals would overflow")]
    Overflow { student: StudentId, amount: Credits },
}

/// What caused a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    CreditRequest(RequestId),
    ExternalSubmission(SubmissionId),
    /// Academic credit entered directly by faculty.
    Academic,
}

/// A posting to be appended.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub student: StudentId,
    pub category: CreditCategory,
    pub amount: Credits,
    pub provenance: Provenance,
    pub approved_by: UserId,
    pub at: Timestamp,
}

/// An immutable posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub seq: Seq,
    pub student: StudentId,
    pub category: CreditCategory,
    pub amount: Credits,
    /// The student's total right after this entry.
    pub running_total: Credits,
    pub provenance: Provenance,
    pub approved_by: UserId,
    pub at: Timestamp,
}

/// Semester rollover: totals of the listed students restart from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResetMarker {
    pub seq: Seq,
    pub students: Vec<StudentId>,
    pub by: UserId,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LedgerRecord {
    Posting(LedgerEntry),
    Reset(ResetMarker),
}

impl LedgerRecord {
    fn concerns(&self, student: StudentId) -> bool {
        match self {
            LedgerRecord::Posting(entry) => entry.student == student,
            LedgerRecord::Reset(marker) => marker.students.contains(&student),
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    records: Vec<LedgerRecord>,
    totals: HashMap<StudentId, CreditTotals>,
}

/// The ledger store together with its aggregated read model.
/// Record log and totals live behind one lock so they never drift apart.
#[derive(Debug, Default)]
pub struct Ledger {
    state: RwLock<LedgerState>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one posting and fold it into the student's totals.
    pub fn append(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        if entry.amount.is_negative() {
            return Err(LedgerError::InvalidAmount {
                student: entry.student,
                amount: entry.amount,
            });
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let seq = state.records.len() as Seq;

        let current = state.totals.get(&entry.student).copied().unwrap_or_default();
        let totals = current
            .credited(entry.category, entry.amount)
            .ok_or(LedgerError::Overflow {
                student: entry.student,
                amount: entry.amount,
            })?;
        state.totals.insert(entry.student, totals);
        let running_total = totals.total();

        let posted = LedgerEntry {
            seq,
            student: entry.student,
            category: entry.category,
            amount: entry.amount,
            running_total,
            provenance: entry.provenance,
            approved_by: entry.approved_by,
            at: entry.at,
        };
        state.records.push(LedgerRecord::Posting(posted.clone()));

        Ok(posted)
    }

    /// Zero the totals of every listed student as one unit, recording a
    /// single marker instead of compensating entries.
    pub fn reset(&self, students: &[StudentId], by: UserId, at: Timestamp) -> ResetMarker {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let marker = ResetMarker {
            seq: state.records.len() as Seq,
            students: students.to_vec(),
            by,
            at,
        };

        for student in students {
            if let Some(totals) = state.totals.get_mut(student) {
                totals.clear();
            }
        }
        state.records.push(LedgerRecord::Reset(marker.clone()));

        marker
    }

    /// Incrementally maintained totals of one student.
    pub fn totals_for(&self, student: StudentId) -> CreditTotals {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.totals.get(&student).copied().unwrap_or_default()
    }

    /// Totals of one student rebuilt from the record log.
    pub fn replay_totals(&self, student: StudentId) -> CreditTotals {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut totals = CreditTotals::default();
        for record in state.records.iter().filter(|r| r.concerns(student)) {
            match record {
                // every accepted posting fitted the same running totals
                LedgerRecord::Posting(entry) => {
                    totals = totals
                        .credited(entry.category, entry.amount)
                        .unwrap_or(totals);
                }
                LedgerRecord::Reset(_) => totals.clear(),
            }
        }
        totals
    }

    /// Totals of every student that has ever been posted to, by student id.
    pub fn all_totals(&self) -> Vec<(StudentId, CreditTotals)> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = state.totals.iter().map(|(s, t)| (*s, *t)).collect();
        all.sort_by_key(|(student, _)| *student);
        all
    }

    /// Every record touching one student, oldest first.
    pub fn history_for(&self, student: StudentId) -> Vec<LedgerRecord> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .records
            .iter()
            .filter(|r| r.concerns(student))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of postings (reset markers excluded).
    pub fn postings(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .records
            .iter()
            .filter(|r| matches!(r, LedgerRecord::Posting(_)))
            .count()
    }
}
