//! A compiler from a small C-like scripting language to scoreboard
//! command functions.

pub mod compiler;
pub mod config;
