//! Core types shared by every phase.

mod link;
mod state;
mod url;

pub use link::{LinkKind, is_file_path, path_extension};
pub use state::{is_shutdown, register_server, setup_shutdown_handler};
pub use url::{RoutePath, decode, parse_site_url, same_origin};
