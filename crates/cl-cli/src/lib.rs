//! codelab: Command-line interface for codelab
//!
//! Provides the `codelab` CLI for running programs on the classroom
//! server and taking part in games.

pub mod commands;
pub mod output;
pub mod terminal;
