//! Command-line interface module.

mod args;
pub mod clone;
pub mod serve;

pub use args::{Cli, Commands};
