//! CLI command implementations

mod config;
mod game;
mod nickname;
mod run;

pub use config::{config_init, config_path, config_show};
pub use game::{game_join_command, game_status_command, game_watch_command, leaderboard_command};
pub use nickname::nickname_command;
pub use run::run_command;
