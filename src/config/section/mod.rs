//! Configuration section definitions.
//!
//! Each module corresponds to a section in `clone.toml`:
//!
//! | Module    | TOML Section | Purpose                                   |
//! |-----------|--------------|-------------------------------------------|
//! | `capture` | `[capture]`  | Browser rendering (timeouts, viewport)    |
//! | `assets`  | `[assets]`   | Download concurrency, retries, allow-list |
//! | `parity`  | `[parity]`   | Screenshot viewports and diff threshold   |
//! | `serve`   | `[serve]`    | Local preview server                      |
//! | `deploy`  | `[deploy]`   | Generated hosting configuration           |

mod assets;
mod capture;
mod deploy;
mod parity;
mod serve;

pub use assets::AssetsConfig;
pub use capture::CaptureConfig;
pub use deploy::DeployConfig;
pub use parity::ParityConfig;
pub use serve::ServeConfig;
