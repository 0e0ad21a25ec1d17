//! Registration tracker: student sign-up and the club's decision.

use crate::model::{
    Caller, Decision, EventId, Registration, RegistrationKey, RegistrationStatus, Role, Timestamp,
};
use crate::notify::Change;

use super::{Engine, Target, WorkflowError, non_blank, require_reason};

impl Engine {
    /// Register the calling student for `event`.
    ///
    /// Fails with `RegistrationClosed` once `now` is past the registration
    /// deadline, whatever the event date.
    pub fn register(
        &self,
        caller: Caller,
        event: EventId,
        note: Option<String>,
        now: Timestamp,
    ) -> Result<Registration, WorkflowError> {
        Self::authorize(caller, Role::Student, "register for events")?;
        self.ensure_student(caller.id)?;
        let event = self.load_event(event)?;

        if now > event.registration_deadline {
            return Err(WorkflowError::RegistrationClosed {
                event: event.id,
                deadline: event.registration_deadline,
            });
        }

        let key = RegistrationKey::new(event.id, caller.id);
        let registration = self
            .registrations
            .insert_if_absent(key, Registration::new(key, non_blank(note), now))
            .map_err(|_| WorkflowError::DuplicateRegistration {
                event: key.event,
                student: key.student,
            })?;

        self.feed.publish(Change::Registration {
            key,
            status: registration.status,
        });
        Ok(registration)
    }

    /// Accept or reject a pending registration. Rejecting needs a reason.
    pub fn club_decision(
        &self,
        caller: Caller,
        key: RegistrationKey,
        decision: Decision,
        reason: Option<String>,
        now: Timestamp,
    ) -> Result<Registration, WorkflowError> {
        let current = self.load_registration(key)?;
        let event = self.load_event(current.key.event)?;
        self.authorize_club_head(caller, event.club, "decide on registrations")?;

        let (next, rejection_reason) = match decision {
            Decision::Approve => (RegistrationStatus::ApprovedByClub, None),
            Decision::Reject => (
                RegistrationStatus::RejectedByClub,
                Some(require_reason(reason, "reject a registration")?),
            ),
        };

        let registration = self
            .registrations
            .update(&key, |reg| {
                if !reg.status.can_transition_to(next) {
                    return Err(WorkflowError::invalid_transition(
                        Target::Registration(key),
                        "record a club decision",
                        reg.status,
                    ));
                }
                Ok(Registration {
                    status: next,
                    rejection_reason,
                    updated_at: now,
                    ..reg.clone()
                })
            })
            .ok_or(WorkflowError::NotFound(Target::Registration(key)))??;

        self.feed.publish(Change::Registration {
            key,
            status: registration.status,
        });
        Ok(registration)
    }
}
