//! Unicode-aware text helpers for terminal output.

mod text;

pub use text::{display_width, pad_to_width, strip_control_chars, truncate_to_width};
