use thiserror::Error;

/// Errors reported by the bridge.
///
/// Out-of-domain numeric parameters are not errors: they resolve to a neutral
/// result at the call site. Only malformed serialized input, engine
/// allocation failure and bulk session misuse surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The declared element count does not match the payload length
    #[error("serialized bitmap has invalid size: expected {expected} bytes, found {found}")]
    InvalidSize { expected: usize, found: usize },

    #[error("unknown serialization format marker {0:#04x}")]
    UnknownFormat(u8),

    /// The engine rejected a portable payload
    #[error("invalid portable bitmap data")]
    InvalidData,

    #[error("bitmap allocation failed")]
    Allocation,

    /// A newer session was started on the same channel
    #[error("bulk session was invalidated by a newer session")]
    SessionInvalidated,

    #[error("bulk chunk of {count} elements exceeds the buffer capacity of {capacity}")]
    ChunkOverflow { count: usize, capacity: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
