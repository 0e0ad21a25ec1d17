//! Core domain types for the credit workflow.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Credits;

/// Point in time used for deadlines and provenance.
pub type Timestamp = DateTime<Utc>;

/// User identifier, as resolved by the identity provider.
pub type UserId = u32;

/// Students are users; the alias documents intent at call sites.
pub type StudentId = UserId;

/// Club identifier.
pub type ClubId = u16;

/// Event identifier.
pub type EventId = u32;

/// Credit request identifier, assigned by the engine.
pub type RequestId = u64;

/// External submission identifier, assigned by the engine.
pub type SubmissionId = u64;

/// Role of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Faculty,
    ClubHead,
    Admin,
}

/// An authenticated caller. The role is trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }
}

/// Student profile. Credit totals are not stored here, see
/// [`Ledger::totals_for`](crate::ledger::Ledger::totals_for).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub department: String,
    pub degree: String,
    pub year: u8,
    pub roll_no: String,
}

/// Admin-side edit of a student profile; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentEdit {
    pub name: Option<String>,
    pub department: Option<String>,
    pub degree: Option<String>,
    pub year: Option<u8>,
    pub roll_no: Option<String>,
}

/// A faculty member who reviews credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faculty {
    pub id: UserId,
    pub name: String,
    pub department: String,
}

/// A club and the user heading it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: ClubId,
    pub name: String,
    pub head: UserId,
    #[serde(default)]
    pub description: String,
}

/// Changes to a club. Its head may only touch the description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClubEdit {
    pub name: Option<String>,
    pub head: Option<UserId>,
    pub description: Option<String>,
}

impl ClubEdit {
    pub(crate) fn is_description_only(&self) -> bool {
        self.name.is_none() && self.head.is_none()
    }
}

/// Registration window of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Open,
    Closed,
}

/// An event organized by exactly one club.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub club: ClubId,
    pub title: String,
    pub description: String,
    pub date: Timestamp,
    pub registration_deadline: Timestamp,
    pub credits: Credits,
}

impl Event {
    /// Derived from the clock, never stored.
    pub fn status(&self, now: Timestamp) -> EventStatus {
        if now > self.registration_deadline || now > self.date {
            EventStatus::Closed
        } else {
            EventStatus::Open
        }
    }

    pub fn is_past(&self, now: Timestamp) -> bool {
        now > self.date
    }

    /// Registration must close no later than the event itself.
    pub fn has_valid_schedule(&self) -> bool {
        self.registration_deadline <= self.date
    }
}

/// Fields that may change on an existing event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<Timestamp>,
    pub registration_deadline: Option<Timestamp>,
    pub credits: Option<Credits>,
}

/// Unique key of a registration: one per (event, student) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistrationKey {
    pub event: EventId,
    pub student: StudentId,
}

impl RegistrationKey {
    pub fn new(event: EventId, student: StudentId) -> Self {
        Self { event, student }
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.event, self.student)
    }
}

/// Lifecycle of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Pending,
    ApprovedByClub,
    RejectedByClub,
    SentToFaculty,
    ApprovedByFaculty,
    RejectedByFaculty,
}

impl RegistrationStatus {
    /// Fixed transition table; anything not listed is rejected.
    pub fn can_transition_to(self, next: RegistrationStatus) -> bool {
        use RegistrationStatus::*;
        matches!(
            (self, next),
            (Pending, ApprovedByClub)
                | (Pending, RejectedByClub)
                | (ApprovedByClub, SentToFaculty)
                | (SentToFaculty, ApprovedByFaculty)
                | (SentToFaculty, RejectedByFaculty)
        )
    }

    pub fn is_terminal(self) -> bool {
        use RegistrationStatus::*;
        matches!(self, RejectedByClub | ApprovedByFaculty | RejectedByFaculty)
    }
}

/// A student's intent to participate in one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub key: RegistrationKey,
    pub status: RegistrationStatus,
    pub note: Option<String>,
    pub rejection_reason: Option<String>,
    /// The credit request created from this registration, if any.
    pub request: Option<RequestId>,
    pub registered_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Registration {
    pub fn new(key: RegistrationKey, note: Option<String>, at: Timestamp) -> Self {
        Self {
            key,
            status: RegistrationStatus::Pending,
            note,
            rejection_reason: None,
            request: None,
            registered_at: at,
            updated_at: at,
        }
    }
}

/// Approve or reject, shared by every reviewing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Reject,
}

/// Role the student played at the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipationRole {
    Participant,
    Volunteer,
    Organizer,
    Member,
}

/// Ledger bucket a credit lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditCategory {
    Academic,
    Activity,
    External,
}

impl CreditCategory {
    pub const ALL: [CreditCategory; 3] = [
        CreditCategory::Academic,
        CreditCategory::Activity,
        CreditCategory::External,
    ];
}

/// Lifecycle of a credit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    PendingFacultyApproval,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::PendingFacultyApproval)
    }
}

/// A club head's proposal to award credit for a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRequest {
    pub id: RequestId,
    pub registration: RegistrationKey,
    pub club: ClubId,
    pub proposed: Credits,
    pub role: ParticipationRole,
    pub category: CreditCategory,
    pub reason: Option<String>,
    pub submitted_by: UserId,
    pub submitted_at: Timestamp,
    pub status: RequestStatus,
    /// Amount actually posted, set on approval.
    pub final_credits: Option<Credits>,
    pub decided_by: Option<UserId>,
    pub decided_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
}

/// Lifecycle of an external submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

/// Where the evidence for an external activity lives. Storage is external.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Proof {
    Link(String),
    Attachment(String),
    #[default]
    None,
}

/// What a student fills in to claim credit for an outside activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub event_name: String,
    pub organizer: String,
    /// Free-text label chosen by the student; never used to pick a ledger category.
    pub label: String,
    pub date: Timestamp,
    pub description: String,
    pub proof: Proof,
}

/// A credit claim for activity outside official club events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSubmission {
    pub id: SubmissionId,
    pub student: StudentId,
    pub details: NewSubmission,
    pub status: SubmissionStatus,
    pub credits: Option<Credits>,
    pub remarks: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub submitted_at: Timestamp,
    pub reviewed_at: Option<Timestamp>,
}

/// One replayable engine input: who did what, and when.
#[derive(Debug, Clone)]
pub struct Command {
    pub at: Timestamp,
    pub caller: Caller,
    pub action: Action,
}

/// The possible actions callers issue against the engine.
#[derive(Debug, Clone)]
pub enum Action {
    /// Admin: create a club.
    AddClub(Club),
    /// Admin or the club's head: change a club.
    EditClub { club: ClubId, edit: ClubEdit },
    /// Admin: delete a club without events.
    RemoveClub(ClubId),
    /// Admin: create a student profile.
    EnrollStudent(Student),
    /// Admin: change any field of a student profile.
    EditStudent { student: StudentId, edit: StudentEdit },
    /// Admin: delete a student without credit history.
    RemoveStudent(StudentId),
    /// Admin: register a faculty member.
    AddFaculty(Faculty),
    /// Admin: delete a faculty member.
    RemoveFaculty(UserId),
    /// Club head: publish an event for their club.
    CreateEvent(Event),
    /// Admin or the organizing club head: change an event.
    UpdateEvent { event: EventId, edit: EventEdit },
    /// Admin or the organizing club head: delete an event nobody registered for.
    RemoveEvent(EventId),
    /// Student: change their own roll number or year while allowed.
    UpdateProfile {
        roll_no: Option<String>,
        year: Option<u8>,
    },
    /// Student: register for an event.
    Register { event: EventId, note: Option<String> },
    /// Club head: accept or reject a pending registration.
    ClubDecision {
        registration: RegistrationKey,
        decision: Decision,
        reason: Option<String>,
    },
    /// Club head: forward an approved registration to faculty with a proposed credit.
    SubmitForReview {
        registration: RegistrationKey,
        proposed: Credits,
        role: ParticipationRole,
        category: CreditCategory,
        reason: Option<String>,
    },
    /// Faculty: close a pending credit request.
    FacultyDecision {
        request: RequestId,
        decision: Decision,
        final_credits: Option<Credits>,
        reason: Option<String>,
    },
    /// Student: claim credit for an outside activity.
    SubmitExternal(NewSubmission),
    /// Faculty: close a pending external submission.
    DecideExternal {
        submission: SubmissionId,
        decision: Decision,
        credits: Option<Credits>,
        reason: Option<String>,
    },
    /// Faculty: post academic credit directly.
    AssignAcademic { student: StudentId, credits: Credits },
    /// Admin: name the current semester.
    SetSemester(String),
    /// Admin: open or lock roll number edits.
    ToggleRollUpdate,
    /// Admin: open or lock year edits.
    ToggleYearUpdate,
    /// Admin: semester rollover.
    ResetAll,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AddClub(_) => "add club",
            Action::EditClub { .. } => "edit club",
            Action::RemoveClub(_) => "remove club",
            Action::EnrollStudent(_) => "enroll student",
            Action::EditStudent { .. } => "edit student",
            Action::RemoveStudent(_) => "remove student",
            Action::AddFaculty(_) => "add faculty",
            Action::RemoveFaculty(_) => "remove faculty",
            Action::CreateEvent(_) => "create event",
            Action::UpdateEvent { .. } => "update event",
            Action::RemoveEvent(_) => "remove event",
            Action::UpdateProfile { .. } => "profile update",
            Action::Register { .. } => "register",
            Action::ClubDecision { .. } => "club decision",
            Action::SubmitForReview { .. } => "submit for review",
            Action::FacultyDecision { .. } => "faculty decision",
            Action::SubmitExternal(_) => "external submission",
            Action::DecideExternal { .. } => "external decision",
            Action::AssignAcademic { .. } => "academic credit",
            Action::SetSemester(_) => "set semester",
            Action::ToggleRollUpdate => "toggle roll updates",
            Action::ToggleYearUpdate => "toggle year updates",
            Action::ResetAll => "credit reset",
        }
    }
}
