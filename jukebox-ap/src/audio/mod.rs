//! Audio output collaborators

pub mod output;

pub use output::{create_output, AudioOutput, CpalOutput, NullOutput};
