//! Credit outside club events: external submissions and academic credit.

use crate::Credits;
use crate::ledger::{LedgerEntry, NewEntry, Provenance};
use crate::model::{
    Caller, CreditCategory, Decision, ExternalSubmission, NewSubmission, Role, StudentId,
    SubmissionId, SubmissionStatus, Timestamp,
};
use crate::notify::Change;

use super::{Engine, Target, WorkflowError, require_reason};

/// Credits granted when an external submission is approved without an amount.
pub const DEFAULT_EXTERNAL_CREDITS: Credits = Credits::whole(2);

impl Engine {
    /// File an external activity for review.
    pub fn submit_external(
        &self,
        caller: Caller,
        details: NewSubmission,
        now: Timestamp,
    ) -> Result<ExternalSubmission, WorkflowError> {
        Self::authorize(caller, Role::Student, "submit external activities")?;
        self.ensure_student(caller.id)?;

        let id = self.next_submission_id();
        let submission = ExternalSubmission {
            id,
            student: caller.id,
            details,
            status: SubmissionStatus::Pending,
            credits: None,
            remarks: None,
            reviewed_by: None,
            submitted_at: now,
            reviewed_at: None,
        };
        self.submissions.insert(id, submission.clone());

        self.feed.publish(Change::Submission {
            id,
            status: submission.status,
        });
        Ok(submission)
    }

    /// Single-approver decision on an external submission.
    ///
    /// Approval posts one `External` entry, [`DEFAULT_EXTERNAL_CREDITS`] when
    /// no amount is given. Rejection needs a reason and posts nothing.
    pub fn decide_external(
        &self,
        caller: Caller,
        id: SubmissionId,
        decision: Decision,
        credits: Option<Credits>,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<ExternalSubmission, WorkflowError> {
        Self::authorize(caller, Role::Faculty, "review external submissions")?;

        let current = self
            .submissions
            .get(&id)
            .ok_or(WorkflowError::NotFound(Target::Submission(id)))?;
        if current.status.is_terminal() {
            return Err(WorkflowError::already_processed(
                Target::Submission(id),
                current.status,
            ));
        }

        let (status, amount, remarks) = match decision {
            Decision::Approve => {
                let amount = credits.unwrap_or(DEFAULT_EXTERNAL_CREDITS);
                if amount.is_negative() {
                    return Err(WorkflowError::InvalidAmount(amount));
                }
                (SubmissionStatus::Approved, Some(amount), None)
            }
            Decision::Reject => (
                SubmissionStatus::Rejected,
                None,
                Some(require_reason(reason, "reject an external submission")?),
            ),
        };

        let submission = self
            .submissions
            .update(&id, |sub| {
                if sub.status.is_terminal() {
                    return Err(WorkflowError::already_processed(
                        Target::Submission(id),
                        sub.status,
                    ));
                }
                if let Some(amount) = amount {
                    self.ledger.append(NewEntry {
                        student: sub.student,
                        category: CreditCategory::External,
                        amount,
                        provenance: Provenance::ExternalSubmission(id),
                        approved_by: caller.id,
                        at: now,
                    })?;
                }
                Ok(ExternalSubmission {
                    status,
                    credits: amount,
                    remarks,
                    reviewed_by: Some(caller.id),
                    reviewed_at: Some(now),
                    ..sub.clone()
                })
            })
            .ok_or(WorkflowError::NotFound(Target::Submission(id)))??;

        if amount.is_some() {
            self.publish_totals(submission.student);
        }

        self.feed.publish(Change::Submission {
            id,
            status: submission.status,
        });
        Ok(submission)
    }

    /// Post academic credit for a student directly.
    pub fn assign_academic_credits(
        &self,
        caller: Caller,
        student: StudentId,
        credits: Credits,
        now: Timestamp,
    ) -> Result<LedgerEntry, WorkflowError> {
        Self::authorize(caller, Role::Faculty, "assign academic credits")?;
        self.ensure_student(student)?;

        let entry = self.ledger.append(NewEntry {
            student,
            category: CreditCategory::Academic,
            amount: credits,
            provenance: Provenance::Academic,
            approved_by: caller.id,
            at: now,
        })?;

        self.publish_totals(student);
        Ok(entry)
    }
}
