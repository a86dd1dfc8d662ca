//! Configuration management for sweep.
//!
//! Settings live in a JSON file under the XDG config directory and supply
//! defaults for every engine knob; command-line flags override them.

mod settings;

pub use settings::{Paths, Settings};
