//! Threadline Transcript
//!
//! Pure functions that turn agent payloads into display-ready transcript
//! entries, and the reconciler that merges a thread snapshot, its persisted
//! event log and the live notification stream into one ordered,
//! de-duplicated transcript. No I/O and no clocks: callers pass time in.

pub mod activity;
pub mod changes;
pub mod diff;
pub mod extract;
pub mod items;
pub mod live;
pub mod reconciler;
pub mod search;
pub mod signature;
mod timestamps;

pub use extract::{extract_from_notification, Extraction, SummarySource};
pub use live::{classify, BufferKind, LiveNotification};
pub use reconciler::{merge_transcript, Applied, Reconciler};
pub use signature::{signature, signature_sequence};
