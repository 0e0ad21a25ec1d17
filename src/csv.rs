use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    Action, Caller, Club, ClubId, Command, CreditCategory, Decision, Event, EventId, Faculty,
    NewSubmission, ParticipationRole, Proof, RegistrationKey, Role, Student, StudentId, Timestamp,
    UserId,
};
use crate::{CreditTotals, Credits};

/// Errors that can occur when reading command files
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: invalid amount {value}")]
    InvalidAmount { line: usize, value: f64 },

    #[error("line {line}: {kind} missing {field}")]
    MissingField {
        line: usize,
        kind: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    at: Timestamp,
    caller: UserId,
    role: Role,
    club: Option<ClubId>,
    event: Option<EventId>,
    subject: Option<UserId>,
    request: Option<u64>,
    amount: Option<f64>,
    category: Option<CreditCategory>,
    participation: Option<ParticipationRole>,
    note: Option<String>,
    deadline: Option<Timestamp>,
    date: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    student: StudentId,
    academic: String,
    activity: String,
    external: String,
    total: String,
}

/// Turns a row into a command, reporting the first missing column.
struct RowReader {
    line: usize,
    row: InputRow,
}

impl RowReader {
    fn required<T>(&self, value: Option<T>, field: &'static str) -> Result<T, CsvError> {
        value.ok_or_else(|| CsvError::MissingField {
            line: self.line,
            kind: self.row.r#type.clone(),
            field,
        })
    }

    fn registration(&self) -> Result<RegistrationKey, CsvError> {
        Ok(RegistrationKey::new(
            self.required(self.row.event, "event")?,
            self.required(self.row.subject, "subject")?,
        ))
    }

    fn amount(&self) -> Result<Option<Credits>, CsvError> {
        self.row
            .amount
            .map(|value| {
                Credits::from_float(value).ok_or(CsvError::InvalidAmount {
                    line: self.line,
                    value,
                })
            })
            .transpose()
    }

    fn note(&self) -> Option<String> {
        self.row.note.clone()
    }

    fn action(&self) -> Result<Action, CsvError> {
        let row = &self.row;
        let action = match row.r#type.as_str() {
            "club" => Action::AddClub(Club {
                id: self.required(row.club, "club")?,
                name: row.note.clone().unwrap_or_default(),
                head: self.required(row.subject, "subject")?,
                description: String::new(),
            }),
            "student" => {
                let id = self.required(row.subject, "subject")?;
                Action::EnrollStudent(Student {
                    id,
                    name: row.note.clone().unwrap_or_default(),
                    department: String::new(),
                    degree: String::new(),
                    year: 1,
                    roll_no: id.to_string(),
                })
            }
            "faculty" => Action::AddFaculty(Faculty {
                id: self.required(row.subject, "subject")?,
                name: row.note.clone().unwrap_or_default(),
                department: String::new(),
            }),
            "remove_club" => Action::RemoveClub(self.required(row.club, "club")?),
            "remove_student" => Action::RemoveStudent(self.required(row.subject, "subject")?),
            "remove_event" => Action::RemoveEvent(self.required(row.event, "event")?),
            "semester" => Action::SetSemester(self.required(self.note(), "note")?),
            "toggle_roll" => Action::ToggleRollUpdate,
            "toggle_year" => Action::ToggleYearUpdate,
            "event" => Action::CreateEvent(Event {
                id: self.required(row.event, "event")?,
                club: self.required(row.club, "club")?,
                title: row.note.clone().unwrap_or_default(),
                description: String::new(),
                date: self.required(row.date, "date")?,
                registration_deadline: self.required(row.deadline, "deadline")?,
                credits: self.required(self.amount()?, "amount")?,
            }),
            "register" => Action::Register {
                event: self.required(row.event, "event")?,
                note: self.note(),
            },
            "club_approve" | "club_reject" => Action::ClubDecision {
                registration: self.registration()?,
                decision: if row.r#type == "club_approve" {
                    Decision::Approve
                } else {
                    Decision::Reject
                },
                reason: self.note(),
            },
            "submit" => Action::SubmitForReview {
                registration: self.registration()?,
                proposed: self.required(self.amount()?, "amount")?,
                role: self.required(row.participation, "participation")?,
                category: self.required(row.category, "category")?,
                reason: self.note(),
            },
            "faculty_approve" | "faculty_reject" => Action::FacultyDecision {
                request: self.required(row.request, "request")?,
                decision: if row.r#type == "faculty_approve" {
                    Decision::Approve
                } else {
                    Decision::Reject
                },
                final_credits: self.amount()?,
                reason: self.note(),
            },
            "external" => Action::SubmitExternal(NewSubmission {
                event_name: self.required(self.note(), "note")?,
                organizer: String::new(),
                label: String::new(),
                date: self.required(row.date, "date")?,
                description: String::new(),
                proof: Proof::None,
            }),
            "external_approve" | "external_reject" => Action::DecideExternal {
                submission: self.required(row.request, "request")?,
                decision: if row.r#type == "external_approve" {
                    Decision::Approve
                } else {
                    Decision::Reject
                },
                credits: self.amount()?,
                reason: self.note(),
            },
            "academic" => Action::AssignAcademic {
                student: self.required(row.subject, "subject")?,
                credits: self.required(self.amount()?, "amount")?,
            },
            "reset" => Action::ResetAll,
            other => {
                return Err(CsvError::UnrecognizedType {
                    line: self.line,
                    kind: other.to_string(),
                });
            }
        };
        Ok(action)
    }

    fn into_command(self) -> Result<Command, CsvError> {
        Ok(Command {
            at: self.row.at,
            caller: Caller::new(self.row.caller, self.row.role),
            action: self.action()?,
        })
    }
}

/// Read commands from a csv file
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            RowReader { line, row }.into_command()
        }))
}

/// Write per-student totals in csv format
pub fn write_totals(
    writer: impl io::Write,
    totals: impl IntoIterator<Item = (StudentId, CreditTotals)>,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for (student, totals) in totals {
        let row = OutputRow {
            student,
            academic: totals.academic.to_string(),
            activity: totals.activity.to_string(),
            external: totals.external.to_string(),
            total: totals.total().to_string(),
        };
        writer.serialize(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "type,at,caller,role,club,event,subject,request,amount,category,participation,note,deadline,date\n";

    fn write_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        file.write_all(rows.as_bytes()).unwrap();
        file
    }

    fn read_all(file: &NamedTempFile) -> Vec<Result<Command, CsvError>> {
        read_commands(file.path()).unwrap().collect()
    }

    #[test]
    fn read_register() {
        let file = write_csv("register,2026-03-01T10:00:00Z,100,student,,10,,,,,,first time,,\n");
        let results = read_all(&file);
        assert_eq!(results.len(), 1);

        let command = results.into_iter().next().unwrap().unwrap();
        assert_eq!(command.caller, Caller::new(100, Role::Student));
        match command.action {
            Action::Register { event, note } => {
                assert_eq!(event, 10);
                assert_eq!(note.as_deref(), Some("first time"));
            }
            _ => panic!("expected register"),
        }
    }

    #[test]
    fn read_submit() {
        let file = write_csv(
            "submit,2026-03-03T10:00:00Z,2,club_head,,10,100,,0,Activity,Volunteer,attended only,,\n",
        );
        let command = read_all(&file).into_iter().next().unwrap().unwrap();
        match command.action {
            Action::SubmitForReview {
                registration,
                proposed,
                role,
                category,
                reason,
            } => {
                assert_eq!(registration, RegistrationKey::new(10, 100));
                assert_eq!(proposed, Credits::ZERO);
                assert_eq!(role, ParticipationRole::Volunteer);
                assert_eq!(category, CreditCategory::Activity);
                assert_eq!(reason.as_deref(), Some("attended only"));
            }
            _ => panic!("expected submit"),
        }
    }

    #[test]
    fn read_faculty_approve_with_override() {
        let file = write_csv("faculty_approve,2026-03-04T10:00:00Z,3,faculty,,,,1,2.5,,,,,\n");
        let command = read_all(&file).into_iter().next().unwrap().unwrap();
        match command.action {
            Action::FacultyDecision {
                request,
                decision,
                final_credits,
                ..
            } => {
                assert_eq!(request, 1);
                assert_eq!(decision, Decision::Approve);
                assert_eq!(final_credits, Some(Credits::from_scaled(250)));
            }
            _ => panic!("expected faculty decision"),
        }
    }

    #[test]
    fn read_directory_removals() {
        let file = write_csv(
            "remove_student,2026-03-01T10:00:00Z,1,admin,,,102,,,,,,,\n\
             remove_event,2026-03-01T10:01:00Z,2,club_head,,10,,,,,,,,\n\
             semester,2026-03-01T10:02:00Z,1,admin,,,,,,,,Fall 2026,,\n",
        );
        let actions: Vec<Action> = read_all(&file)
            .into_iter()
            .map(|r| r.unwrap().action)
            .collect();
        assert!(matches!(actions[0], Action::RemoveStudent(102)));
        assert!(matches!(actions[1], Action::RemoveEvent(10)));
        assert!(matches!(actions[2], Action::SetSemester(ref name) if name == "Fall 2026"));
    }

    #[test]
    fn read_with_whitespace() {
        let file = write_csv("reset, 2026-03-25T10:00:00Z, 1, admin,,,,,,,,,,\n");
        let results = read_all(&file);
        assert!(matches!(
            results[0],
            Ok(Command {
                action: Action::ResetAll,
                ..
            })
        ));
    }

    #[test]
    fn read_returns_error_for_unknown_type() {
        let file = write_csv("refund,2026-03-01T10:00:00Z,1,admin,,,,,,,,,,\n");
        let results = read_all(&file);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(err, CsvError::UnrecognizedType { line: 2, .. }));
    }

    #[test]
    fn read_returns_error_for_missing_field() {
        let file = write_csv("academic,2026-03-01T10:00:00Z,3,faculty,,,100,,,,,,,\n");
        let results = read_all(&file);
        let err = results[0].as_ref().unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingField {
                line: 2,
                field: "amount",
                ..
            }
        ));
    }

    #[test]
    fn read_returns_error_for_bad_role() {
        let file = write_csv("reset,2026-03-01T10:00:00Z,1,janitor,,,,,,,,,,\n");
        let results = read_all(&file);
        assert!(matches!(
            results[0].as_ref().unwrap_err(),
            CsvError::Parse { line: 2, .. }
        ));
    }

    #[test]
    fn read_amount_must_be_representable() {
        let file = write_csv(
            "academic,2026-03-01T10:00:00Z,3,faculty,,,100,,inf,,,,,\n\
             academic,2026-03-01T10:01:00Z,3,faculty,,,100,,1,,,,,\n",
        );
        let results = read_all(&file);
        assert!(matches!(
            results[0],
            Err(CsvError::InvalidAmount { line: 2, .. })
        ));
        assert!(results[1].is_ok());
    }

    #[test]
    fn commands_can_move_to_another_thread() {
        let file = write_csv("reset,2026-03-25T10:00:00Z,1,admin,,,,,,,,,,\n");
        let path = file.path().display().to_string();
        let commands = read_commands(path).unwrap();

        let count = std::thread::spawn(move || commands.count()).join().unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn open_missing_file_fails() {
        let result = read_commands("does/not/exist.csv");
        assert!(matches!(result, Err(CsvError::Open { .. })));
    }

    #[test]
    fn write_totals_formats_credits() {
        let totals = CreditTotals {
            academic: Credits::whole(3),
            external: Credits::from_scaled(150),
            ..CreditTotals::default()
        };

        let mut out = Vec::new();
        write_totals(&mut out, vec![(7, totals)]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "student,academic,activity,external,total\n7,3,0,1.50,4.50\n"
        );
    }
}
