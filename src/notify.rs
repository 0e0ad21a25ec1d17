//! Change notification feed for presentation layers.
//!
//! Uses a tokio broadcast channel; subscribers that fall behind lose the
//! oldest changes and should re-read the affected documents.

use tokio::sync::broadcast;
use tracing::debug;

use crate::CreditTotals;
use crate::model::{
    EventId, RegistrationKey, RegistrationStatus, RequestId, RequestStatus, StudentId,
    SubmissionId, SubmissionStatus,
};

const CHANNEL_CAPACITY: usize = 256;

/// A committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Registration {
        key: RegistrationKey,
        status: RegistrationStatus,
    },
    Request {
        id: RequestId,
        status: RequestStatus,
    },
    Submission {
        id: SubmissionId,
        status: SubmissionStatus,
    },
    Totals {
        student: StudentId,
        totals: CreditTotals,
    },
    Reset {
        students: usize,
    },
    Event(EventId),
    Directory,
    Settings,
}

#[derive(Debug)]
pub struct ChangeFeed {
    sender: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.sender.subscribe()
    }

    pub fn publish(&self, change: Change) {
        // no subscribers is the common case for batch replays
        if self.sender.send(change).is_err() {
            debug!("change dropped: no subscribers");
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
