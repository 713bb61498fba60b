//! File-backed inputs: supervisor settings and the documents the CLI reads
//! (release manifests, observed-state snapshots, execution contexts).

pub mod documents;
pub mod settings;

pub use documents::{load_context, load_current, load_document, load_target};
