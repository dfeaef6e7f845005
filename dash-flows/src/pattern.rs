//! ## dash-flows::pattern
//! **Per-field addressing modes**
//!
//! A header field either carries one value for every packet of a flow, or
//! walks `start, start + step, ...` for `count` values and then starts over.
//! The generator cycles through the sequence, so packet `i` uses entry
//! `i mod count`.

use dash_core::{AddrError, AddressArith};

/// Addressing mode of a single header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPattern<T> {
    Fixed(T),
    Increment { start: T, step: T, count: u32 },
}

impl<T: AddressArith> FieldPattern<T> {
    pub fn increment(start: T, step: T, count: u32) -> Self {
        FieldPattern::Increment { start, step, count }
    }

    /// Number of distinct values the field takes.
    pub fn count(&self) -> u32 {
        match self {
            FieldPattern::Fixed(_) => 1,
            FieldPattern::Increment { count, .. } => *count,
        }
    }

    pub fn first(&self) -> T {
        match self {
            FieldPattern::Fixed(value) => *value,
            FieldPattern::Increment { start, .. } => *start,
        }
    }

    /// Value carried by packet `index`.
    pub fn value_at(&self, index: u64) -> Result<T, AddrError> {
        match *self {
            FieldPattern::Fixed(value) => Ok(value),
            FieldPattern::Increment { start, step, count } => {
                let slot = if count == 0 { 0 } else { index % u64::from(count) };
                start.checked_step(step, slot)
            }
        }
    }

    /// The last value of the sequence. Computing it proves that no value in
    /// the sequence overflows.
    pub fn last(&self) -> Result<T, AddrError> {
        self.value_at(u64::from(self.count().saturating_sub(1)))
    }

    /// Every value of one cycle, in order.
    pub fn expand(&self) -> Result<Vec<T>, AddrError> {
        (0..u64::from(self.count()))
            .map(|i| self.value_at(i))
            .collect()
    }
}

impl<T> From<T> for FieldPattern<T> {
    fn from(value: T) -> Self {
        FieldPattern::Fixed(value)
    }
}
