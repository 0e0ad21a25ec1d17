//! Error types for workflow operations.

use std::fmt;

use thiserror::Error;

use crate::Credits;
use crate::ledger::LedgerError;
use crate::model::{
    ClubId, EventId, RegistrationKey, RequestId, Role, StudentId, SubmissionId, Timestamp, UserId,
};

/// The document an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Club(ClubId),
    Student(StudentId),
    Faculty(UserId),
    Event(EventId),
    Registration(RegistrationKey),
    Request(RequestId),
    Submission(SubmissionId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Club(id) => write!(f, "club {id}"),
            Target::Student(id) => write!(f, "student {id}"),
            Target::Faculty(id) => write!(f, "faculty member {id}"),
            Target::Event(id) => write!(f, "event {id}"),
            Target::Registration(key) => write!(f, "registration {key}"),
            Target::Request(id) => write!(f, "credit request {id}"),
            Target::Submission(id) => write!(f, "external submission {id}"),
        }
    }
}

/// Plain error classification for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateRegistration,
    RegistrationClosed,
    InvalidTransition,
    ReasonRequired,
    AlreadyProcessed,
    InvalidAmount,
    NotFound,
    Unauthorized,
}

/// Error returned by every public [`Engine`](super::Engine) operation.
/// When one is returned nothing was written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("student {student} is already registered for event {event}")]
    DuplicateRegistration { event: EventId, student: StudentId },

    #[error("registration for event {event} closed at {deadline}")]
    RegistrationClosed { event: EventId, deadline: Timestamp },

    #[error("{target}: cannot {action} while {state}")]
    InvalidTransition {
        target: Target,
        action: &'static str,
        state: String,
    },

    #[error("a reason is required to {0}")]
    ReasonRequired(&'static str),

    #[error("{target} was already processed ({state})")]
    AlreadyProcessed { target: Target, state: String },

    #[error("invalid credit amount {0}")]
    InvalidAmount(Credits),

    #[error("{0} not found")]
    NotFound(Target),

    #[error("user {caller} ({role:?}) may not {action}")]
    Unauthorized {
        caller: UserId,
        role: Role,
        action: &'static str,
    },
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::DuplicateRegistration { .. } => ErrorKind::DuplicateRegistration,
            WorkflowError::RegistrationClosed { .. } => ErrorKind::RegistrationClosed,
            WorkflowError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            WorkflowError::ReasonRequired(_) => ErrorKind::ReasonRequired,
            WorkflowError::AlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
            WorkflowError::InvalidAmount(_) => ErrorKind::InvalidAmount,
            WorkflowError::NotFound(_) => ErrorKind::NotFound,
            WorkflowError::Unauthorized { .. } => ErrorKind::Unauthorized,
        }
    }

    pub(crate) fn invalid_transition(
        target: Target,
        action: &'static str,
        state: impl fmt::Debug,
    ) -> Self {
        WorkflowError::InvalidTransition {
            target,
            action,
            state: format!("{state:?}"),
        }
    }

    pub(crate) fn exists(target: Target) -> Self {
        WorkflowError::InvalidTransition {
            target,
            action: "create",
            state: "already present".to_string(),
        }
    }

    /// A delete refused because other records still depend on the document.
    pub(crate) fn in_use(target: Target, state: &'static str) -> Self {
        WorkflowError::InvalidTransition {
            target,
            action: "remove",
            state: state.to_string(),
        }
    }

    pub(crate) fn already_processed(target: Target, state: impl fmt::Debug) -> Self {
        WorkflowError::AlreadyProcessed {
            target,
            state: format!("{state:?}"),
        }
    }
}

impl From<LedgerError> for WorkflowError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount { amount, .. } | LedgerError::Overflow { amount, .. } => {
                WorkflowError::InvalidAmount(amount)
            }
        }
    }
}
