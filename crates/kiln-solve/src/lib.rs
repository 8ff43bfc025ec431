//! Build request translation and solve orchestration.
//!
//! [`BuildOptions`] validates user input into a [`BuildRequest`]. An
//! [`Orchestrator`] then runs the session, the solve and the progress relay
//! against a [`SolveEngine`] as one fail-fast task group, once
//! [`preflight::check`] has produced a [`RuntimeReady`].

pub use config::EngineConfig;
pub use engine::{Session, SolveEngine};
pub use error::{Error, Result};
pub use group::TaskGroup;
pub use orchestrate::{Orchestrator, SolveState};
pub use preflight::RuntimeReady;
pub use process::{EngineMessage, ProcessEngine, ProcessSession};
pub use reference::Reference;
pub use request::{BuildOptions, BuildRequest, ExportDescriptor, FrontendAttributes, SolveRequest};

pub mod config;
mod engine;
mod error;
mod group;
mod orchestrate;
pub mod preflight;
mod process;
pub mod progress;
pub mod reference;
pub mod request;
