//! Frame identifier type.

use std::fmt;

/// Index of a frame in the buffer pool's frame vector.
///
/// Frames are fixed at pool construction, so a `FrameId` stays valid for the
/// lifetime of the pool even as different pages move through the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}
