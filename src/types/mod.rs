//! Core types: lifecycle status, wire shapes and the in-memory job model.

pub mod job;
pub mod status;
pub mod wire;

pub use job::{
    format_elapsed, Job, JobSuccess, Observation, ProgressUpdate, TerminalResult,
    CONNECTION_ERROR_MESSAGE, INITIAL_MESSAGE,
};
pub use status::JobStatus;
pub use wire::{
    Artifact, ArtifactList, ModelSummary, RemoteStatus, StartRequest, StartResponse,
    StatusResponse, TrainingResult,
};
