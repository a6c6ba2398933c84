//! Codec-level failure taxonomy.
//!
//! None of these abort anything by themselves; the connection layer decides
//! what is fatal. See the server binary's `ConnectionError` for that.

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Fewer bytes remained than the field needed.
    #[error("short read: needed {needed} bytes, {remaining} remaining")]
    ShortRead { needed: usize, remaining: usize },

    /// The bytes were present but do not form a valid value.
    #[error("malformed {0}")]
    Malformed(&'static str),

    /// A value does not fit its declared wire representation.
    #[error("value out of range for {0}")]
    OutOfRange(&'static str),
}

impl CodecError {
    /// Whether the error indicates truncated input rather than bad input.
    pub fn is_short_read(&self) -> bool {
        matches!(self, Self::ShortRead { .. })
    }
}
