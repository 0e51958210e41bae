//! Rebuilds a Reddit thread (initial page, "continue this thread" pages and
//! "load more comments" batches) into one ordered, indented sequence of
//! messages, each flattened into styled text runs.

pub mod comment;
pub mod docx;
pub mod dom;
pub mod error;
pub mod escape;
pub mod fetch;
pub mod hierarchy;
pub mod markup;
pub mod reddit;
pub mod stitch;

pub use error::{Error, Result};
pub use stitch::{reconstruct, reconstruct_into, Emission, Reconstruction, Sink, ThreadInfo};
