//! Shared helpers with no knowledge of the pipeline phases.

pub mod hash;
pub mod html;
pub mod http;
pub mod mime;
pub mod path;
pub mod plural;

pub use plural::{plural_count, plural_s};
