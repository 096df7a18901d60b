//! Shared helpers.
//!
//! - [`string_utils`]: request string cleanup, HTML escaping, money formatting
//! - [`display_terminal`]: startup output

pub mod display_terminal;
pub mod string_utils;
