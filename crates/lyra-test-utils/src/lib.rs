#![forbid(unsafe_code)]

//! Shared test utilities for the lyra workspace.

pub mod fixtures;
pub mod representation;
pub mod source_buffer;

pub use fixtures::*;
pub use representation::{Behaviour, CreatedBuffer, ScriptedRepresentationBuffers};
pub use source_buffer::{MemorySourceBuffer, MemorySourceBufferFactory};
