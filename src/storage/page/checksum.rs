//! FNV-1a page checksum.

/// FNV-1a 32-bit offset basis.
pub const FNV_OFFSET_BASIS: u32 = 2_166_136_261;

/// FNV-1a 32-bit prime.
pub const FNV_PRIME: u32 = 16_777_619;

/// Streaming 32-bit FNV-1a hasher.
///
/// Each byte is XORed into the state and the state is then multiplied by the
/// FNV prime. Feeding the input in several `update` calls gives the same
/// result as one call over the concatenation.
///
/// # Example
/// ```
/// use pagetree::storage::page::Fnv1a;
///
/// let mut hasher = Fnv1a::new();
/// hasher.update(b"a");
/// assert_eq!(hasher.finalize(), 0xe40c_292c);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fnv1a {
    state: u32,
}

impl Fnv1a {
    /// Start a new hash at the offset basis.
    #[inline]
    pub fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }

    /// Feed more bytes.
    #[inline]
    pub fn update(&mut self, bytes: &[u8]) {
        let mut state = self.state;
        for &byte in bytes {
            state ^= byte as u32;
            state = state.wrapping_mul(FNV_PRIME);
        }
        self.state = state;
    }

    /// Current hash value.
    #[inline]
    pub fn finalize(&self) -> u32 {
        self.state
    }

    /// Hash a byte slice in one call.
    pub fn checksum(bytes: &[u8]) -> u32 {
        let mut hasher = Self::new();
        hasher.update(bytes);
        hasher.finalize()
    }
}

impl Default for Fnv1a {
    fn default() -> Self {
        Self::new()
    }
}
