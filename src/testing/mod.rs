//! Test doubles for the loop's two seams.

pub mod mocks;

pub use mocks::{Published, RecordingPublisher, ScriptedSource};
