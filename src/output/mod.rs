//! Reporters
//!
//! Listeners that render run events as lane columns, TAP, JSON lines, JUnit XML
//! or a quiet problems-only listing.

mod echo;
mod format;
mod json;
mod lane;
mod noiseless;
mod tap;
mod xunit;

pub use echo::StreamEcho;
pub use format::{OutputFormat, WriterSpec};
