use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("out of bounds")]
    OutOfBounds,

    /// More phases were requested than a phase label can address.
    #[error("phase capacity exceeded: requested {requested} phases, at most {max} supported")]
    CapacityExceeded { requested: usize, max: usize },

    /// The combination of field shape and solver/energy options is not supported.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn messages_carry_context() {
        let e = Error::SizeMismatch {
            expected: 12,
            actual: 10,
        };
        assert_eq!(e.to_string(), "size mismatch: expected 12, got 10");

        let e = Error::CapacityExceeded {
            requested: 40_000,
            max: 32_767,
        };
        assert!(e.to_string().contains("40000"));
        assert!(e.to_string().contains("32767"));
    }
}
