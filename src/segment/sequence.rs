//! One-based segment positioning within logical messages.
//!
//! Provides [`SequenceNumber`], a type-safe wrapper around a non-zero `u32`
//! that converts to and from the zero-based slot offsets used by the
//! reassembly store.

use std::num::NonZeroU32;

use derive_more::{Display, Into};
use serde::{Deserialize, Serialize};

/// One-based ordinal describing a segment's position within its message.
///
/// # Examples
///
/// ```
/// use segment_transport::segment::SequenceNumber;
/// let first = SequenceNumber::first();
/// assert_eq!(first.get(), 1);
/// assert_eq!(first.slot(), 0);
/// assert_eq!(SequenceNumber::new(0), None);
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, Into,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct SequenceNumber(NonZeroU32);

impl SequenceNumber {
    /// Construct a sequence number, returning `None` for zero.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(inner) => Some(Self(inner)),
            None => None,
        }
    }

    /// Return the first sequence number of every message.
    #[must_use]
    pub const fn first() -> Self { Self(NonZeroU32::MIN) }

    /// Build the sequence number for the zero-based `offset`.
    ///
    /// Returns `None` when `offset + 1` does not fit in `u32`.
    #[must_use]
    pub fn from_slot(offset: usize) -> Option<Self> {
        let value = u32::try_from(offset).ok()?.checked_add(1)?;
        Self::new(value)
    }

    /// Return the underlying one-based value.
    #[must_use]
    pub const fn get(self) -> u32 { self.0.get() }

    /// Return the zero-based slot offset addressed by this sequence number.
    #[must_use]
    pub const fn slot(self) -> usize { (self.0.get() - 1) as usize }

    /// Report whether this number addresses a slot in a message of `total`
    /// segments.
    #[must_use]
    pub const fn fits(self, total: u32) -> bool { self.0.get() <= total }
}

impl From<SequenceNumber> for u32 {
    fn from(value: SequenceNumber) -> Self { value.get() }
}
