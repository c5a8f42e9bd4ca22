//! Globally unique identity shared by every segment of one logical message.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier correlating all segments of a logical message.
///
/// Identifiers are random v4 UUIDs rather than send timestamps, so two
/// messages sent within the same clock tick never share reassembly state.
///
/// # Examples
///
/// ```
/// use segment_transport::segment::MessageId;
/// let a = MessageId::generate();
/// let b = MessageId::generate();
/// assert_ne!(a, b);
/// ```
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self { Self(Uuid::new_v4()) }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(value: Uuid) -> Self { Self(value) }

    /// Return the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid { &self.0 }
}
