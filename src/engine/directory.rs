//! Clubs, students and faculty, maintained by the admin.
//!
//! Removal never touches the ledger: a document that postings, registrations
//! or events still refer to cannot be removed.

use crate::model::{
    Caller, Club, ClubEdit, ClubId, Faculty, Role, Student, StudentEdit, StudentId, UserId,
};
use crate::notify::Change;

use super::{Engine, Target, WorkflowError};

impl Engine {
    pub fn add_club(&self, caller: Caller, club: Club) -> Result<Club, WorkflowError> {
        Self::authorize(caller, Role::Admin, "add clubs")?;
        let club = self
            .clubs
            .insert_if_absent(club.id, club)
            .map_err(|existing| WorkflowError::exists(Target::Club(existing.id)))?;
        self.feed.publish(Change::Directory);
        Ok(club)
    }

    /// Admins may change anything; the club's head only the description.
    pub fn edit_club(
        &self,
        caller: Caller,
        id: ClubId,
        edit: ClubEdit,
    ) -> Result<Club, WorkflowError> {
        if caller.role != Role::Admin {
            self.authorize_club_head(caller, id, "edit clubs")?;
            if !edit.is_description_only() {
                return Err(WorkflowError::Unauthorized {
                    caller: caller.id,
                    role: caller.role,
                    action: "rename or reassign a club",
                });
            }
        }

        let club = self
            .clubs
            .update(&id, |club| {
                Ok::<_, WorkflowError>(Club {
                    name: edit.name.unwrap_or_else(|| club.name.clone()),
                    head: edit.head.unwrap_or(club.head),
                    description: edit
                        .description
                        .unwrap_or_else(|| club.description.clone()),
                    ..club.clone()
                })
            })
            .ok_or(WorkflowError::NotFound(Target::Club(id)))??;

        self.feed.publish(Change::Directory);
        Ok(club)
    }

    pub fn remove_club(&self, caller: Caller, id: ClubId) -> Result<Club, WorkflowError> {
        Self::authorize(caller, Role::Admin, "remove clubs")?;
        let club = self
            .clubs
            .remove_unless(&id, |_| {
                if self.events.query(|e| e.club == id).is_empty() {
                    Ok(())
                } else {
                    Err(WorkflowError::in_use(Target::Club(id), "has events"))
                }
            })
            .ok_or(WorkflowError::NotFound(Target::Club(id)))??;

        self.feed.publish(Change::Directory);
        Ok(club)
    }

    pub fn enroll_student(
        &self,
        caller: Caller,
        student: Student,
    ) -> Result<Student, WorkflowError> {
        Self::authorize(caller, Role::Admin, "enroll students")?;
        let student = self
            .students
            .insert_if_absent(student.id, student)
            .map_err(|existing| WorkflowError::exists(Target::Student(existing.id)))?;
        self.feed.publish(Change::Directory);
        Ok(student)
    }

    /// Admin edit of any profile field, regardless of the semester switches.
    pub fn edit_student(
        &self,
        caller: Caller,
        id: StudentId,
        edit: StudentEdit,
    ) -> Result<Student, WorkflowError> {
        Self::authorize(caller, Role::Admin, "edit student profiles")?;
        let student = self
            .students
            .update(&id, |s| {
                Ok::<_, WorkflowError>(Student {
                    name: edit.name.unwrap_or_else(|| s.name.clone()),
                    department: edit.department.unwrap_or_else(|| s.department.clone()),
                    degree: edit.degree.unwrap_or_else(|| s.degree.clone()),
                    year: edit.year.unwrap_or(s.year),
                    roll_no: edit.roll_no.unwrap_or_else(|| s.roll_no.clone()),
                    ..s.clone()
                })
            })
            .ok_or(WorkflowError::NotFound(Target::Student(id)))??;

        self.feed.publish(Change::Directory);
        Ok(student)
    }

    /// Remove a student who has never registered, submitted or been credited.
    pub fn remove_student(&self, caller: Caller, id: StudentId) -> Result<Student, WorkflowError> {
        Self::authorize(caller, Role::Admin, "remove students")?;
        let student = self
            .students
            .remove_unless(&id, |_| {
                let has_history = !self.ledger.history_for(id).is_empty()
                    || !self.registrations.query(|r| r.key.student == id).is_empty()
                    || !self.submissions.query(|s| s.student == id).is_empty();
                if has_history {
                    Err(WorkflowError::in_use(
                        Target::Student(id),
                        "has credit history",
                    ))
                } else {
                    Ok(())
                }
            })
            .ok_or(WorkflowError::NotFound(Target::Student(id)))??;

        self.feed.publish(Change::Directory);
        Ok(student)
    }

    pub fn add_faculty(&self, caller: Caller, faculty: Faculty) -> Result<Faculty, WorkflowError> {
        Self::authorize(caller, Role::Admin, "add faculty")?;
        let faculty = self
            .faculty
            .insert_if_absent(faculty.id, faculty)
            .map_err(|existing| WorkflowError::exists(Target::Faculty(existing.id)))?;
        self.feed.publish(Change::Directory);
        Ok(faculty)
    }

    /// Past decisions keep the reviewer's id after removal.
    pub fn remove_faculty(&self, caller: Caller, id: UserId) -> Result<Faculty, WorkflowError> {
        Self::authorize(caller, Role::Admin, "remove faculty")?;
        let faculty = self
            .faculty
            .remove_unless(&id, |_| Ok::<_, WorkflowError>(()))
            .ok_or(WorkflowError::NotFound(Target::Faculty(id)))??;
        self.feed.publish(Change::Directory);
        Ok(faculty)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::*;
    use crate::model::{CreditCategory, EventEdit, NewSubmission, Proof};
    use crate::{Credits, ErrorKind};

    fn faculty(id: UserId) -> Faculty {
        Faculty {
            id,
            name: format!("Prof {id}"),
            department: "Physics".to_string(),
        }
    }

    #[test]
    fn directory_rejects_duplicates() {
        let engine = setup();
        let result = engine.enroll_student(ADMIN, student(100));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidTransition);

        let result = engine.add_club(
            ADMIN,
            Club {
                id: CLUB,
                name: "Again".to_string(),
                head: 5,
                description: String::new(),
            },
        );
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidTransition);
        assert_eq!(engine.club(CLUB).unwrap().name, "Robotics");
    }

    #[test]
    fn only_admin_manages_directory() {
        let engine = setup();
        let result = engine.enroll_student(FACULTY, student(200));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
        assert!(engine.student(200).is_none());

        let result = engine.add_faculty(HEAD, faculty(30));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
        let result = engine.remove_student(FACULTY, 101);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn faculty_registry() {
        let engine = setup();
        let added = engine.add_faculty(ADMIN, faculty(30)).unwrap();
        assert_eq!(added.department, "Physics");
        assert_eq!(engine.faculty_members(), vec![added.clone()]);

        let result = engine.add_faculty(ADMIN, faculty(30));
        assert_eq!(
            result.unwrap_err(),
            WorkflowError::exists(Target::Faculty(30))
        );

        assert_eq!(engine.remove_faculty(ADMIN, 30).unwrap(), added);
        assert!(engine.faculty_member(30).is_none());
        let result = engine.remove_faculty(ADMIN, 30);
        assert_eq!(result, Err(WorkflowError::NotFound(Target::Faculty(30))));
    }

    #[test]
    fn admin_edits_whole_student_profile() {
        let engine = setup();
        let edit = StudentEdit {
            name: Some("Asha K".to_string()),
            department: Some("ECE".to_string()),
            degree: Some("MTech".to_string()),
            year: Some(4),
            roll_no: Some("R900".to_string()),
        };

        // semester switches only gate students editing themselves
        let s = engine.edit_student(ADMIN, 100, edit.clone()).unwrap();
        assert_eq!(s.name, "Asha K");
        assert_eq!(s.department, "ECE");
        assert_eq!(s.degree, "MTech");
        assert_eq!(s.year, 4);
        assert_eq!(s.roll_no, "R900");
        assert_eq!(engine.student(100), Some(s));

        let result = engine.edit_student(ADMIN, 555, edit.clone());
        assert_eq!(result, Err(WorkflowError::NotFound(Target::Student(555))));
        let result = engine.edit_student(student_caller(100), 100, edit);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn admin_reassigns_club_head() {
        let engine = setup();
        let edit = ClubEdit {
            head: Some(7),
            ..ClubEdit::default()
        };
        let club = engine.edit_club(ADMIN, CLUB, edit).unwrap();
        assert_eq!(club.head, 7);
        assert_eq!(club.name, "Robotics");

        // the previous head lost the club
        let result = engine.update_event(HEAD, EVENT, EventEdit::default(), day(5));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn club_head_edits_description_only() {
        let engine = setup();
        let edit = ClubEdit {
            description: Some("We build robots".to_string()),
            ..ClubEdit::default()
        };
        let club = engine.edit_club(HEAD, CLUB, edit).unwrap();
        assert_eq!(club.description, "We build robots");

        let edit = ClubEdit {
            name: Some("Mine now".to_string()),
            ..ClubEdit::default()
        };
        let result = engine.edit_club(HEAD, CLUB, edit);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);

        let other_head = Caller::new(9, Role::ClubHead);
        let result = engine.edit_club(other_head, CLUB, ClubEdit::default());
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);
        assert_eq!(engine.club(CLUB).unwrap().name, "Robotics");
    }

    #[test]
    fn club_with_events_is_kept() {
        let engine = setup();
        let result = engine.remove_club(ADMIN, CLUB);
        assert_eq!(
            result,
            Err(WorkflowError::in_use(Target::Club(CLUB), "has events"))
        );

        engine.remove_event(ADMIN, EVENT).unwrap();
        let club = engine.remove_club(ADMIN, CLUB).unwrap();
        assert_eq!(club.id, CLUB);
        assert!(engine.club(CLUB).is_none());
    }

    #[test]
    fn student_with_credit_history_is_kept() {
        let engine = setup();
        engine
            .assign_academic_credits(FACULTY, 100, Credits::whole(2), day(3))
            .unwrap();
        let result = engine.remove_student(ADMIN, 100);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidTransition);
        assert!(engine.student(100).is_some());
        assert_eq!(engine.totals_for(100).get(CreditCategory::Academic), Credits::whole(2));

        engine
            .register(student_caller(101), EVENT, None, day(1))
            .unwrap();
        let result = engine.remove_student(ADMIN, 101);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn student_without_history_is_removed() {
        let engine = setup();
        let removed = engine.remove_student(ADMIN, 102).unwrap();
        assert_eq!(removed.id, 102);
        assert!(engine.student(102).is_none());
        let ids: Vec<_> = engine.all_totals().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![100, 101]);

        let result = engine.remove_student(ADMIN, 102);
        assert_eq!(result, Err(WorkflowError::NotFound(Target::Student(102))));
    }

    #[test]
    fn pending_submission_blocks_removal() {
        let engine = setup();
        let sub = engine
            .submit_external(
                student_caller(102),
                NewSubmission {
                    event_name: "Quiz".to_string(),
                    organizer: String::new(),
                    label: String::new(),
                    date: day(2),
                    description: String::new(),
                    proof: Proof::None,
                },
                day(3),
            )
            .unwrap();
        assert_eq!(sub.student, 102);

        let result = engine.remove_student(ADMIN, 102);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn directory_changes_are_published() {
        let engine = setup();
        let mut changes = engine.subscribe();

        engine.add_faculty(ADMIN, faculty(30)).unwrap();
        engine
            .edit_club(ADMIN, CLUB, ClubEdit::default())
            .unwrap();
        engine.remove_student(ADMIN, 102).unwrap();

        for _ in 0..3 {
            assert_eq!(changes.try_recv().unwrap(), Change::Directory);
        }
        assert!(changes.try_recv().is_err());
    }
}
