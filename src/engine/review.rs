//! Two-stage approval: club head proposes credit, faculty signs off.

use tracing::warn;

use crate::Credits;
use crate::ledger::{NewEntry, Provenance};
use crate::model::{
    Caller, CreditCategory, CreditRequest, Decision, ParticipationRole, Registration,
    RegistrationKey, RegistrationStatus, RequestId, RequestStatus, Role, Timestamp,
};
use crate::notify::Change;

use super::{Engine, Target, WorkflowError, non_blank, require_reason};

impl Engine {
    /// Forward a club-approved registration to faculty with a proposed credit.
    ///
    /// A zero proposal needs a reason. The registration moves to
    /// `SentToFaculty` through a conditional write, so of two concurrent
    /// submissions for the same registration exactly one succeeds.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_for_faculty_review(
        &self,
        caller: Caller,
        key: RegistrationKey,
        proposed: Credits,
        role: ParticipationRole,
        category: CreditCategory,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<CreditRequest, WorkflowError> {
        let current = self.load_registration(key)?;
        let event = self.load_event(current.key.event)?;
        let club = self.authorize_club_head(caller, event.club, "submit credit requests")?;

        if proposed.is_negative() {
            return Err(WorkflowError::InvalidAmount(proposed));
        }
        let reason = if proposed.is_zero() {
            Some(require_reason(reason, "propose zero credits")?)
        } else {
            non_blank(reason)
        };

        // assigned by the winning write only
        let mut id: RequestId = 0;
        let registration = self
            .registrations
            .update(&key, |reg| {
                if !reg.status.can_transition_to(RegistrationStatus::SentToFaculty) {
                    return Err(WorkflowError::invalid_transition(
                        Target::Registration(key),
                        "submit for faculty review",
                        reg.status,
                    ));
                }
                Ok(Registration {
                    status: RegistrationStatus::SentToFaculty,
                    request: Some({
                        id = self.next_request_id();
                        id
                    }),
                    updated_at: now,
                    ..reg.clone()
                })
            })
            .ok_or(WorkflowError::NotFound(Target::Registration(key)))??;

        let request = CreditRequest {
            id,
            registration: key,
            club: club.id,
            proposed,
            role,
            category,
            reason,
            submitted_by: caller.id,
            submitted_at: now,
            status: RequestStatus::PendingFacultyApproval,
            final_credits: None,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
        };
        self.requests.insert(id, request.clone());

        self.feed.publish(Change::Registration {
            key,
            status: registration.status,
        });
        self.feed.publish(Change::Request {
            id,
            status: request.status,
        });
        Ok(request)
    }

    /// Close a pending credit request.
    ///
    /// Approval posts one ledger entry for `final_credits`, or the proposed
    /// amount when not overridden. Rejection needs a reason and posts nothing.
    /// Deciding an already closed request fails with `AlreadyProcessed`.
    pub fn faculty_decision(
        &self,
        caller: Caller,
        id: RequestId,
        decision: Decision,
        final_credits: Option<Credits>,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<CreditRequest, WorkflowError> {
        Self::authorize(caller, Role::Faculty, "decide on credit requests")?;

        let current = self
            .requests
            .get(&id)
            .ok_or(WorkflowError::NotFound(Target::Request(id)))?;
        if current.status.is_terminal() {
            return Err(WorkflowError::already_processed(
                Target::Request(id),
                current.status,
            ));
        }

        let (status, amount, rejection_reason) = match decision {
            Decision::Approve => {
                let amount = final_credits.unwrap_or(current.proposed);
                if amount.is_negative() {
                    return Err(WorkflowError::InvalidAmount(amount));
                }
                (RequestStatus::Approved, Some(amount), None)
            }
            Decision::Reject => (
                RequestStatus::Rejected,
                None,
                Some(require_reason(reason, "reject a credit request")?),
            ),
        };

        // only one decision can win this write; the posting commits with it
        let request = self
            .requests
            .update(&id, |req| {
                if req.status.is_terminal() {
                    return Err(WorkflowError::already_processed(
                        Target::Request(id),
                        req.status,
                    ));
                }
                if let Some(amount) = amount {
                    self.ledger.append(NewEntry {
                        student: req.registration.student,
                        category: req.category,
                        amount,
                        provenance: Provenance::CreditRequest(id),
                        approved_by: caller.id,
                        at: now,
                    })?;
                }
                Ok(CreditRequest {
                    status,
                    final_credits: amount,
                    decided_by: Some(caller.id),
                    decided_at: Some(now),
                    rejection_reason,
                    ..req.clone()
                })
            })
            .ok_or(WorkflowError::NotFound(Target::Request(id)))??;

        let key = request.registration;
        let next = match status {
            RequestStatus::Approved => RegistrationStatus::ApprovedByFaculty,
            _ => RegistrationStatus::RejectedByFaculty,
        };
        let closed = self.registrations.update(&key, |reg| {
            if !reg.status.can_transition_to(next) {
                return Err(reg.status);
            }
            Ok(Registration {
                status: next,
                rejection_reason: request.rejection_reason.clone(),
                updated_at: now,
                ..reg.clone()
            })
        });
        match closed {
            Some(Ok(reg)) => self.feed.publish(Change::Registration {
                key,
                status: reg.status,
            }),
            Some(Err(state)) => {
                warn!(request = id, registration = %key, ?state, "registration not closed with its request");
            }
            None => warn!(request = id, registration = %key, "registration of request missing"),
        }

        self.feed.publish(Change::Request {
            id,
            status: request.status,
        });
        if amount.is_some() {
            self.publish_totals(key.student);
        }
        Ok(request)
    }
}
