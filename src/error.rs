//! Error taxonomy for room and round actions.
//!
//! Every variant is reported back to the caller as a failed acknowledgement;
//! none of them tear down the connection.

/// Result type for room and round actions
pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Room is full")]
    Capacity,

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    ValidationFailure(String),
}

impl GameError {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::NotFound(_) => "NOT_FOUND",
            GameError::Capacity => "ROOM_FULL",
            GameError::InvalidState(_) => "INVALID_STATE",
            GameError::Unauthorized(_) => "UNAUTHORIZED",
            GameError::ValidationFailure(_) => "VALIDATION_FAILED",
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        GameError::InvalidState(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        GameError::Unauthorized(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(GameError::NotFound("Room".into()).code(), "NOT_FOUND");
        assert_eq!(GameError::Capacity.code(), "ROOM_FULL");
        assert_eq!(GameError::invalid_state("x").code(), "INVALID_STATE");
        assert_eq!(GameError::unauthorized("x").code(), "UNAUTHORIZED");
        assert_eq!(
            GameError::ValidationFailure("x".into()).code(),
            "VALIDATION_FAILED"
        );
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            GameError::NotFound("Room".into()).to_string(),
            "Room not found"
        );
    }
}
