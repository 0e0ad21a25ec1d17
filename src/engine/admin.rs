//! Events, student self-service and semester administration.

use std::sync::PoisonError;

use crate::ledger::ResetMarker;
use crate::model::{Caller, Event, EventEdit, EventId, Role, Student, Timestamp};
use crate::notify::Change;
use crate::settings::SemesterSettings;

use super::{Engine, Target, WorkflowError, require_reason};

impl Engine {
    /// Publish an event for the caller's club.
    pub fn create_event(&self, caller: Caller, event: Event) -> Result<Event, WorkflowError> {
        self.authorize_club_head(caller, event.club, "create events")?;
        if event.credits.is_negative() {
            return Err(WorkflowError::InvalidAmount(event.credits));
        }
        check_schedule(&event)?;
        let event = self
            .events
            .insert_if_absent(event.id, event)
            .map_err(|existing| WorkflowError::exists(Target::Event(existing.id)))?;
        self.feed.publish(Change::Event(event.id));
        Ok(event)
    }

    /// Edit an event. Admins may always edit; the organizing club head only
    /// until the event date has passed.
    pub fn update_event(
        &self,
        caller: Caller,
        id: EventId,
        edit: EventEdit,
        now: Timestamp,
    ) -> Result<Event, WorkflowError> {
        let current = self.load_event(id)?;
        if caller.role != Role::Admin {
            self.authorize_club_head(caller, current.club, "edit events")?;
        }
        if let Some(credits) = edit.credits.filter(|c| c.is_negative()) {
            return Err(WorkflowError::InvalidAmount(credits));
        }

        let event = self
            .events
            .update(&id, |ev| {
                if caller.role != Role::Admin && ev.is_past(now) {
                    return Err(WorkflowError::InvalidTransition {
                        target: Target::Event(id),
                        action: "edit",
                        state: "past its date".to_string(),
                    });
                }
                let edited = Event {
                    title: edit.title.unwrap_or_else(|| ev.title.clone()),
                    description: edit.description.unwrap_or_else(|| ev.description.clone()),
                    date: edit.date.unwrap_or(ev.date),
                    registration_deadline: edit
                        .registration_deadline
                        .unwrap_or(ev.registration_deadline),
                    credits: edit.credits.unwrap_or(ev.credits),
                    ..ev.clone()
                };
                check_schedule(&edited)?;
                Ok(edited)
            })
            .ok_or(WorkflowError::NotFound(Target::Event(id)))??;

        self.feed.publish(Change::Event(id));
        Ok(event)
    }

    /// Delete an event nobody has registered for.
    pub fn remove_event(&self, caller: Caller, id: EventId) -> Result<Event, WorkflowError> {
        let current = self.load_event(id)?;
        if caller.role != Role::Admin {
            self.authorize_club_head(caller, current.club, "remove events")?;
        }

        let event = self
            .events
            .remove_unless(&id, |_| {
                if self.registrations.query(|r| r.key.event == id).is_empty() {
                    Ok(())
                } else {
                    Err(WorkflowError::in_use(Target::Event(id), "has registrations"))
                }
            })
            .ok_or(WorkflowError::NotFound(Target::Event(id)))??;

        self.feed.publish(Change::Event(id));
        Ok(event)
    }

    /// Student self-service edit of roll number and year, each gated by its
    /// semester switch.
    pub fn update_profile(
        &self,
        caller: Caller,
        roll_no: Option<String>,
        year: Option<u8>,
    ) -> Result<Student, WorkflowError> {
        Self::authorize(caller, Role::Student, "edit their profile")?;
        let settings = self.settings();
        if roll_no.is_some() && !settings.allow_roll_update {
            return Err(WorkflowError::Unauthorized {
                caller: caller.id,
                role: caller.role,
                action: "change roll number while locked",
            });
        }
        if year.is_some() && !settings.allow_year_update {
            return Err(WorkflowError::Unauthorized {
                caller: caller.id,
                role: caller.role,
                action: "change year while locked",
            });
        }

        let student = self
            .students
            .update(&caller.id, |s| {
                Ok::<_, WorkflowError>(Student {
                    roll_no: roll_no.unwrap_or_else(|| s.roll_no.clone()),
                    year: year.unwrap_or(s.year),
                    ..s.clone()
                })
            })
            .ok_or(WorkflowError::NotFound(Target::Student(caller.id)))??;

        self.feed.publish(Change::Directory);
        Ok(student)
    }

    pub fn set_semester(
        &self,
        caller: Caller,
        semester: String,
    ) -> Result<SemesterSettings, WorkflowError> {
        Self::authorize(caller, Role::Admin, "change the semester")?;
        let semester = require_reason(Some(semester), "set the semester")?;
        Ok(self.edit_settings(|s| s.current_semester = Some(semester)))
    }

    pub fn toggle_roll_update(&self, caller: Caller) -> Result<SemesterSettings, WorkflowError> {
        Self::authorize(caller, Role::Admin, "toggle roll number edits")?;
        Ok(self.edit_settings(|s| s.allow_roll_update = !s.allow_roll_update))
    }

    pub fn toggle_year_update(&self, caller: Caller) -> Result<SemesterSettings, WorkflowError> {
        Self::authorize(caller, Role::Admin, "toggle year edits")?;
        Ok(self.edit_settings(|s| s.allow_year_update = !s.allow_year_update))
    }

    /// Semester rollover: zero the totals of every enrolled student in one
    /// step and stamp the reset time.
    pub fn reset_all(&self, caller: Caller, now: Timestamp) -> Result<ResetMarker, WorkflowError> {
        Self::authorize(caller, Role::Admin, "reset credits")?;

        let mut students = self.students.keys();
        students.sort();
        let marker = self.ledger.reset(&students, caller.id, now);
        self.edit_settings(|s| s.last_reset = Some(now));

        self.feed.publish(Change::Reset {
            students: marker.students.len(),
        });
        Ok(marker)
    }

    fn edit_settings(&self, f: impl FnOnce(&mut SemesterSettings)) -> SemesterSettings {
        let updated = {
            let mut settings = self
                .settings
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            f(&mut settings);
            settings.clone()
        };
        self.feed.publish(Change::Settings);
        updated
    }
}

fn check_schedule(event: &Event) -> Result<(), WorkflowError> {
    if !event.has_valid_schedule() {
        return Err(WorkflowError::InvalidTransition {
            target: Target::Event(event.id),
            action: "schedule",
            state: format!(
                "registration deadline {} after event date {}",
                event.registration_deadline, event.date
            ),
        });
    }
    Ok(())
}
