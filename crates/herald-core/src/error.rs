use thiserror::Error;

use herald_types::models::UserId;

use crate::session::ComposeState;

/// A compose transition was attempted from the wrong state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("operator {operator} is {actual:?}, expected {expected:?}")]
    InvalidState {
        operator: UserId,
        expected: ComposeState,
        actual: ComposeState,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("a broadcast job is already running")]
    Busy,
}
