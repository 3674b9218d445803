use thiserror::Error;

use crate::session::Stage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: &'static str, min: u32, max: u32, value: u32 },
    #[error("{field} must be a multiple of {step}, got {value}")]
    OffStep { field: &'static str, step: u32, value: u32 },
    #[error("{field} is limited to {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("unknown travel theme: {0}")]
    UnknownTheme(String),
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    #[error("{destination} is not a destination in {region}")]
    UnknownDestination { region: String, destination: String },
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("not allowed while session is in {stage:?} stage")]
    WrongStage { stage: Stage },
    #[error("message exceeds {max} characters")]
    MessageTooLong { max: usize },
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("completion service failed: {0}")]
    Completion(#[source] anyhow::Error),
}
