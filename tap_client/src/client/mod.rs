//! High level TAP and TAP+ clients.

mod options;
mod plus;
mod sharing;
mod tap;
mod user_tables;

pub use options::JobOptions;
pub use plus::TapPlus;
pub use tap::{Tap, TAP_CLIENT_ID};
pub use user_tables::{ColumnChange, ColumnField, UploadSource};
