//! Credit workflow engine.
//!
//! The engine owns the document collections, the ledger and the change
//! feed. Every public operation either commits completely or returns a
//! [`WorkflowError`] before anything is written. Operations take `&self`,
//! so one engine can be shared between concurrent callers; races on the
//! same document are settled by the store's conditional writes.
//! Also supports async stream of commands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Credits;
use crate::ledger::{Ledger, LedgerEntry, LedgerRecord, ResetMarker};
use crate::model::{
    Action, Caller, Club, ClubId, Command, CreditRequest, Event, EventId, EventStatus,
    ExternalSubmission, Faculty, Registration, RegistrationKey, RegistrationStatus, RequestId,
    RequestStatus, Role, Student, StudentId, SubmissionId, SubmissionStatus, Timestamp, UserId,
};
use crate::notify::{Change, ChangeFeed};
use crate::settings::SemesterSettings;
use crate::store::Collection;

mod admin;
mod directory;
mod external;
mod registration;
mod review;

mod state;
pub use state::CreditTotals;

mod error;
pub use error::{ErrorKind, Target, WorkflowError};

pub use external::DEFAULT_EXTERNAL_CREDITS;

/// What a successful command produced: the updated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Club(Club),
    Student(Student),
    Faculty(Faculty),
    Event(Event),
    Registration(Registration),
    Request(CreditRequest),
    Submission(ExternalSubmission),
    Posted(LedgerEntry),
    Reset(ResetMarker),
    Settings(SemesterSettings),
    /// The document was deleted.
    Removed(Target),
}

/// Credit requests of one event, as shown to its club head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubReport {
    pub event: EventId,
    pub requests: Vec<CreditRequest>,
    pub proposed_total: Credits,
}

/// The credit workflow engine.
pub struct Engine {
    clubs: Collection<ClubId, Club>,
    students: Collection<StudentId, Student>,
    faculty: Collection<UserId, Faculty>,
    events: Collection<EventId, Event>,
    registrations: Collection<RegistrationKey, Registration>,
    requests: Collection<RequestId, CreditRequest>,
    submissions: Collection<SubmissionId, ExternalSubmission>,
    ledger: Ledger,
    settings: RwLock<SemesterSettings>,
    feed: ChangeFeed,
    next_request: AtomicU64,
    next_submission: AtomicU64,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self::with_settings(SemesterSettings::default())
    }

    pub fn with_settings(settings: SemesterSettings) -> Self {
        Self {
            clubs: Collection::new(),
            students: Collection::new(),
            faculty: Collection::new(),
            events: Collection::new(),
            registrations: Collection::new(),
            requests: Collection::new(),
            submissions: Collection::new(),
            ledger: Ledger::new(),
            settings: RwLock::new(settings),
            feed: ChangeFeed::new(),
            next_request: AtomicU64::new(1),
            next_submission: AtomicU64::new(1),
        }
    }

    /// Run the engine with the given command stream
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // a rejected command must not stop the engine; it is logged in `execute`
            let _ = self.execute(command);
        }
    }

    /// Apply a single command on top of the current engine state
    pub fn execute(&self, command: Command) -> Result<Outcome, WorkflowError> {
        let Command { at, caller, action } = command;
        let name = action.name();

        let result = match action {
            Action::AddClub(club) => self.add_club(caller, club).map(Outcome::Club),
            Action::EditClub { club, edit } => {
                self.edit_club(caller, club, edit).map(Outcome::Club)
            }
            Action::RemoveClub(id) => self
                .remove_club(caller, id)
                .map(|_| Outcome::Removed(Target::Club(id))),
            Action::EnrollStudent(student) => {
                self.enroll_student(caller, student).map(Outcome::Student)
            }
            Action::EditStudent { student, edit } => self
                .edit_student(caller, student, edit)
                .map(Outcome::Student),
            Action::RemoveStudent(id) => self
                .remove_student(caller, id)
                .map(|_| Outcome::Removed(Target::Student(id))),
            Action::AddFaculty(faculty) => {
                self.add_faculty(caller, faculty).map(Outcome::Faculty)
            }
            Action::RemoveFaculty(id) => self
                .remove_faculty(caller, id)
                .map(|_| Outcome::Removed(Target::Faculty(id))),
            Action::CreateEvent(event) => self.create_event(caller, event).map(Outcome::Event),
            Action::UpdateEvent { event, edit } => self
                .update_event(caller, event, edit, at)
                .map(Outcome::Event),
            Action::RemoveEvent(id) => self
                .remove_event(caller, id)
                .map(|_| Outcome::Removed(Target::Event(id))),
            Action::UpdateProfile { roll_no, year } => self
                .update_profile(caller, roll_no, year)
                .map(Outcome::Student),
            Action::Register { event, note } => self
                .register(caller, event, note, at)
                .map(Outcome::Registration),
            Action::ClubDecision {
                registration,
                decision,
                reason,
            } => self
                .club_decision(caller, registration, decision, reason, at)
                .map(Outcome::Registration),
            Action::SubmitForReview {
                registration,
                proposed,
                role,
                category,
                reason,
            } => self
                .submit_for_faculty_review(caller, registration, proposed, role, category, reason, at)
                .map(Outcome::Request),
            Action::FacultyDecision {
                request,
                decision,
                final_credits,
                reason,
            } => self
                .faculty_decision(caller, request, decision, final_credits, reason, at)
                .map(Outcome::Request),
            Action::SubmitExternal(submission) => self
                .submit_external(caller, submission, at)
                .map(Outcome::Submission),
            Action::DecideExternal {
                submission,
                decision,
                credits,
                reason,
            } => self
                .decide_external(caller, submission, decision, credits, reason, at)
                .map(Outcome::Submission),
            Action::AssignAcademic { student, credits } => self
                .assign_academic_credits(caller, student, credits, at)
                .map(Outcome::Posted),
            Action::SetSemester(name) => self
                .set_semester(caller, name)
                .map(Outcome::Settings),
            Action::ToggleRollUpdate => self.toggle_roll_update(caller).map(Outcome::Settings),
            Action::ToggleYearUpdate => self.toggle_year_update(caller).map(Outcome::Settings),
            Action::ResetAll => self.reset_all(caller, at).map(Outcome::Reset),
        };

        Self::log_result(name, caller, &result);
        result
    }

    /// Subscribe to committed changes.
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }

    pub fn settings(&self) -> SemesterSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn club(&self, id: ClubId) -> Option<Club> {
        self.clubs.get(&id)
    }

    pub fn student(&self, id: StudentId) -> Option<Student> {
        self.students.get(&id)
    }

    /// Enrolled students, by id.
    pub fn students(&self) -> Vec<Student> {
        let mut students = self.students.query(|_| true);
        students.sort_by_key(|s| s.id);
        students
    }

    pub fn faculty_member(&self, id: UserId) -> Option<Faculty> {
        self.faculty.get(&id)
    }

    /// Registered faculty, by id.
    pub fn faculty_members(&self) -> Vec<Faculty> {
        let mut faculty = self.faculty.query(|_| true);
        faculty.sort_by_key(|f| f.id);
        faculty
    }

    pub fn event(&self, id: EventId) -> Option<Event> {
        self.events.get(&id)
    }

    /// Events open for registration at `now`, by id.
    pub fn open_events(&self, now: Timestamp) -> Vec<Event> {
        let mut events = self.events.query(|e| e.status(now) == EventStatus::Open);
        events.sort_by_key(|e| e.id);
        events
    }

    pub fn registration(&self, key: RegistrationKey) -> Option<Registration> {
        self.registrations.get(&key)
    }

    /// A student's registrations, by event.
    pub fn registrations_of(&self, student: StudentId) -> Vec<Registration> {
        let mut regs = self.registrations.query(|r| r.key.student == student);
        regs.sort_by_key(|r| r.key);
        regs
    }

    /// Registrations awaiting a decision from the given club.
    pub fn pending_registrations(&self, club: ClubId) -> Vec<Registration> {
        let events: Vec<EventId> = self
            .events
            .query(|e| e.club == club)
            .into_iter()
            .map(|e| e.id)
            .collect();
        let mut regs = self.registrations.query(|r| {
            r.status == RegistrationStatus::Pending && events.contains(&r.key.event)
        });
        regs.sort_by_key(|r| r.key);
        regs
    }

    pub fn request(&self, id: RequestId) -> Option<CreditRequest> {
        self.requests.get(&id)
    }

    /// The faculty review queue, oldest first.
    pub fn pending_requests(&self) -> Vec<CreditRequest> {
        let mut reqs = self
            .requests
            .query(|r| r.status == RequestStatus::PendingFacultyApproval);
        reqs.sort_by_key(|r| r.id);
        reqs
    }

    /// Every credit request raised for one event.
    pub fn club_report(&self, event: EventId) -> ClubReport {
        let mut requests = self.requests.query(|r| r.registration.event == event);
        requests.sort_by_key(|r| r.id);
        let proposed_total = requests.iter().map(|r| r.proposed).sum();
        ClubReport {
            event,
            requests,
            proposed_total,
        }
    }

    pub fn submission(&self, id: SubmissionId) -> Option<ExternalSubmission> {
        self.submissions.get(&id)
    }

    pub fn pending_submissions(&self) -> Vec<ExternalSubmission> {
        let mut subs = self
            .submissions
            .query(|s| s.status == SubmissionStatus::Pending);
        subs.sort_by_key(|s| s.id);
        subs
    }

    pub fn submissions_of(&self, student: StudentId) -> Vec<ExternalSubmission> {
        let mut subs = self.submissions.query(|s| s.student == student);
        subs.sort_by_key(|s| s.id);
        subs
    }

    pub fn totals_for(&self, student: StudentId) -> CreditTotals {
        self.ledger.totals_for(student)
    }

    /// Totals of one student recomputed from the ledger log.
    pub fn replay_totals(&self, student: StudentId) -> CreditTotals {
        self.ledger.replay_totals(student)
    }

    /// Totals of every enrolled student, by id, zero for students never credited.
    pub fn all_totals(&self) -> Vec<(StudentId, CreditTotals)> {
        let mut ids = self.students.keys();
        ids.sort();
        ids.into_iter()
            .map(|id| (id, self.ledger.totals_for(id)))
            .collect()
    }

    pub fn history_for(&self, student: StudentId) -> Vec<LedgerRecord> {
        self.ledger.history_for(student)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}

/// Private API
impl Engine {
    /// Small helper to log `execute` results
    fn log_result(action: &str, caller: Caller, result: &Result<Outcome, WorkflowError>) {
        match result {
            Ok(_) => {
                info!(
                    caller = caller.id,
                    role = ?caller.role,
                    "{action} applied"
                );
            }
            Err(e) => {
                info!(
                    caller = caller.id,
                    role = ?caller.role,
                    kind = ?e.kind(),
                    reason = %e,
                    "{action} skipped"
                );
            }
        }
    }

    fn authorize(caller: Caller, role: Role, action: &'static str) -> Result<(), WorkflowError> {
        if caller.role != role {
            return Err(WorkflowError::Unauthorized {
                caller: caller.id,
                role: caller.role,
                action,
            });
        }
        Ok(())
    }

    /// Ensure the caller is the head of `club`.
    fn authorize_club_head(
        &self,
        caller: Caller,
        club: ClubId,
        action: &'static str,
    ) -> Result<Club, WorkflowError> {
        Self::authorize(caller, Role::ClubHead, action)?;
        let club = self
            .clubs
            .get(&club)
            .ok_or(WorkflowError::NotFound(Target::Club(club)))?;
        if club.head != caller.id {
            return Err(WorkflowError::Unauthorized {
                caller: caller.id,
                role: caller.role,
                action,
            });
        }
        Ok(club)
    }

    fn load_event(&self, id: EventId) -> Result<Event, WorkflowError> {
        self.events
            .get(&id)
            .ok_or(WorkflowError::NotFound(Target::Event(id)))
    }

    fn load_registration(&self, key: RegistrationKey) -> Result<Registration, WorkflowError> {
        self.registrations
            .get(&key)
            .ok_or(WorkflowError::NotFound(Target::Registration(key)))
    }

    fn ensure_student(&self, id: StudentId) -> Result<(), WorkflowError> {
        if !self.students.contains(&id) {
            return Err(WorkflowError::NotFound(Target::Student(id)));
        }
        Ok(())
    }

    fn publish_totals(&self, student: StudentId) {
        self.feed.publish(Change::Totals {
            student,
            totals: self.ledger.totals_for(student),
        });
    }

    fn next_request_id(&self) -> RequestId {
        self.next_request.fetch_add(1, Ordering::Relaxed)
    }

    fn next_submission_id(&self) -> SubmissionId {
        self.next_submission.fetch_add(1, Ordering::Relaxed)
    }
}

/// A reason is present when it has non-blank text.
fn non_blank(reason: Option<String>) -> Option<String> {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

fn require_reason(reason: Option<String>, action: &'static str) -> Result<String, WorkflowError> {
    non_blank(reason).ok_or(WorkflowError::ReasonRequired(action))
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
