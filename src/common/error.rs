//! Error type shared by the handle based API.

use thiserror::Error;

/// Errors reported by world, body, shape, joint and chain operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PhysicsError {
    #[error("world handle is stale or was never created")]
    InvalidWorld,
    #[error("body handle is stale or belongs to another world")]
    InvalidBody,
    #[error("shape handle is stale or belongs to another world")]
    InvalidShape,
    #[error("joint handle is stale or belongs to another world")]
    InvalidJoint,
    #[error("chain handle is stale or belongs to another world")]
    InvalidChain,
    #[error("all {0} world slots are in use")]
    WorldCapacityExceeded(usize),
    #[error("the world is locked while it is stepping")]
    WorldLocked,
    #[error("invalid definition: {0}")]
    InvalidDefinition(&'static str),
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),
    #[error("a joint cannot connect a body to itself")]
    SelfJoint,
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            PhysicsError::InvalidBody.to_string(),
            "body handle is stale or belongs to another world"
        );
        assert_eq!(
            PhysicsError::WorldCapacityExceeded(128).to_string(),
            "all 128 world slots are in use"
        );
        assert_eq!(
            PhysicsError::DegenerateGeometry("collinear points").to_string(),
            "degenerate geometry: collinear points"
        );
    }
}
