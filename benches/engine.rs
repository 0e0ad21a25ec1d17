use std::sync::Arc;
use std::thread;

use chrono::{DateTime, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use credit_ledger::model::{Club, Event, ParticipationRole, RegistrationKey, Student};
use credit_ledger::{
    Action, Caller, Command, CreditCategory, Credits, Decision, Engine, Role, StudentId,
};

const ADMIN: Caller = Caller {
    id: 1,
    role: Role::Admin,
};
const HEAD: Caller = Caller {
    id: 2,
    role: Role::ClubHead,
};
const FACULTY: Caller = Caller {
    id: 3,
    role: Role::Faculty,
};
const EVENT: u32 = 10;

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Generates complete credit workflows for benchmarking.
///
/// One club and one event come first, then for each student:
/// 1. Enroll
/// 2. Register for the event
/// 3. Club approval
/// 4. Submission for faculty review
/// 5. Faculty approval
///
/// Request ids are handed out in submission order, so step 5 always targets
/// the request created by step 4.
pub struct WorkflowGenerator {
    num_students: StudentId,
    current_student: StudentId,
    current_step: u32,
    next_request: u64,
    setup_done: u32,
}

impl WorkflowGenerator {
    pub fn new(num_students: StudentId) -> Self {
        Self {
            num_students,
            current_student: 1,
            current_step: 0,
            next_request: 1,
            setup_done: 0,
        }
    }

    fn setup(&mut self) -> Option<Command> {
        let command = match self.setup_done {
            0 => Command {
                at: at(1),
                caller: ADMIN,
                action: Action::AddClub(Club {
                    id: 1,
                    name: "Bench".to_string(),
                    head: HEAD.id,
                    description: String::new(),
                }),
            },
            1 => Command {
                at: at(1),
                caller: HEAD,
                action: Action::CreateEvent(Event {
                    id: EVENT,
                    club: 1,
                    title: "Load test".to_string(),
                    description: String::new(),
                    date: at(20),
                    registration_deadline: at(10),
                    credits: Credits::whole(3),
                }),
            },
            _ => return None,
        };
        self.setup_done += 1;
        Some(command)
    }
}

impl Iterator for WorkflowGenerator {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(command) = self.setup() {
            return Some(command);
        }
        if self.current_student > self.num_students {
            return None;
        }

        let student = 1_000 + self.current_student;
        let key = RegistrationKey::new(EVENT, student);
        let command = match self.current_step {
            0 => Command {
                at: at(2),
                caller: ADMIN,
                action: Action::EnrollStudent(Student {
                    id: student,
                    name: format!("student {student}"),
                    department: "CS".to_string(),
                    degree: "BTech".to_string(),
                    year: 1,
                    roll_no: student.to_string(),
                }),
            },
            1 => Command {
                at: at(3),
                caller: Caller::new(student, Role::Student),
                action: Action::Register {
                    event: EVENT,
                    note: None,
                },
            },
            2 => Command {
                at: at(4),
                caller: HEAD,
                action: Action::ClubDecision {
                    registration: key,
                    decision: Decision::Approve,
                    reason: None,
                },
            },
            3 => Command {
                at: at(21),
                caller: HEAD,
                action: Action::SubmitForReview {
                    registration: key,
                    proposed: Credits::whole(3),
                    role: ParticipationRole::Participant,
                    category: CreditCategory::Activity,
                    reason: None,
                },
            },
            _ => {
                let request = self.next_request;
                self.next_request += 1;
                Command {
                    at: at(22),
                    caller: FACULTY,
                    action: Action::FacultyDecision {
                        request,
                        decision: Decision::Approve,
                        final_credits: None,
                        reason: None,
                    },
                }
            }
        };

        self.current_step += 1;
        if self.current_step == 5 {
            self.current_step = 0;
            self.current_student += 1;
        }

        Some(command)
    }
}

fn bench_workflows(c: &mut Criterion) {
    let mut group = c.benchmark_group("workflows");

    for students in [1_000u32, 10_000, 50_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(students),
            &students,
            |b, &students| {
                b.iter(|| {
                    let engine = Engine::new();
                    for command in WorkflowGenerator::new(students) {
                        let _ = black_box(engine.execute(command));
                    }
                    engine
                });
            },
        );
    }

    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("stream");

    group.bench_function("10k_students", |b| {
        b.iter(|| {
            let engine = Engine::new();
            let stream = tokio_stream::iter(WorkflowGenerator::new(10_000));
            runtime.block_on(engine.run(stream));
            engine
        });
    });

    group.finish();
}

fn bench_contended_approvals(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);

    // every request is decided by four faculty members at once
    group.bench_function("1k_requests_4_threads", |b| {
        b.iter(|| {
            let engine = Arc::new(Engine::new());
            for command in WorkflowGenerator::new(1_000).filter(|cmd| {
                !matches!(cmd.action, Action::FacultyDecision { .. })
            }) {
                let _ = engine.execute(command);
            }

            let handles: Vec<_> = (0..4)
                .map(|n| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        let faculty = Caller::new(10 + n, Role::Faculty);
                        for request in 1..=1_000 {
                            let _ = black_box(engine.faculty_decision(
                                faculty,
                                request,
                                Decision::Approve,
                                None,
                                None,
                                at(22),
                            ));
                        }
                    })
                })
                .collect();
            for handle in handles {
                let _ = handle.join();
            }
            engine
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_workflows,
    bench_stream,
    bench_contended_approvals
);
criterion_main!(benches);
