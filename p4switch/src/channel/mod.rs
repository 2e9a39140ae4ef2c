//! Channel layer: the input stream and output buffer wired to a remote
//! interactive process.

mod buffer;
mod command;

pub use buffer::OutputBuffer;
pub use command::{CommandStream, ETX};
