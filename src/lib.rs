pub mod credits;
pub mod csv;
pub mod engine;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod settings;
pub mod store;

pub use credits::Credits;
pub use engine::{CreditTotals, Engine, ErrorKind, Outcome, WorkflowError};
pub use model::{Action, Caller, Command, CreditCategory, Decision, Role, StudentId};
