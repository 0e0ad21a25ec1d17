use serde::Serialize;

use crate::Credits;
use crate::model::CreditCategory;

/// Per-student credit counters, one per category.
/// The total is derived and never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CreditTotals {
    pub academic: Credits,
    pub activity: Credits,
    pub external: Credits,
}

impl CreditTotals {
    pub fn total(&self) -> Credits {
        self.academic + self.activity + self.external
    }

    pub fn get(&self, category: CreditCategory) -> Credits {
        match category {
            CreditCategory::Academic => self.academic,
            CreditCategory::Activity => self.activity,
            CreditCategory::External => self.external,
        }
    }

    /// Totals after posting `amount`, or `None` if a counter or the total
    /// would overflow.
    pub(crate) fn credited(&self, category: CreditCategory, amount: Credits) -> Option<Self> {
        let mut next = *self;
        let counter = match category {
            CreditCategory::Academic => &mut next.academic,
            CreditCategory::Activity => &mut next.activity,
            CreditCategory::External => &mut next.external,
        };
        *counter = counter.checked_add(amount)?;
        next.academic
            .checked_add(next.activity)?
            .checked_add(next.external)?;
        Some(next)
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
