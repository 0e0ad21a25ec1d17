use serde::{Deserialize, Serialize};

use crate::model::Timestamp;

/// Semester-wide switches maintained by the admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SemesterSettings {
    pub current_semester: Option<String>,
    /// Students may change their roll number.
    pub allow_roll_update: bool,
    /// Students may change their year of study.
    pub allow_year_update: bool,
    pub last_reset: Option<Timestamp>,
}
