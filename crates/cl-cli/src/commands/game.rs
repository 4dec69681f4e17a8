//! Game and leaderboard command implementations

use std::path::Path;

use anyhow::{Context, Result};

use cl_client::{GameClient, GameError, GameStatusWatcher};
use cl_core::config::ClientConfig;
use cl_core::DisplayIdentity;

use crate::output::{
    format_game_status, format_leaderboard, format_question, print_error, print_info,
    print_success,
};

/// Show the current game status
pub async fn game_status_command(config: &ClientConfig) -> Result<()> {
    let client = GameClient::new(config.http_base());
    let status = match client.status().await {
        Ok(s) => s,
        Err(e) => {
            print_error(&format!("Failed to get game status: {}", e));
            return Err(e.into());
        }
    };

    print!("{}", format_game_status(&status));
    Ok(())
}

/// Join the active game under the saved nickname
pub async fn game_join_command(config: &ClientConfig, identity_path: &Path) -> Result<()> {
    let identity = DisplayIdentity::load(identity_path)?
        .context("No nickname set. Run 'codelab nickname <name>' first")?;

    let client = GameClient::new(config.http_base());
    match client.join(&identity).await {
        Ok(question) => {
            print_success(&format!("Joined the game as {}", identity.nickname()));
            if let Some(question) = question {
                println!();
                print!("{}", format_question(&question));
            }
            Ok(())
        }
        Err(GameError::Rejected(reason)) => {
            print_error(&reason);
            Err(GameError::Rejected(reason).into())
        }
        Err(e) => {
            print_error(&format!("Failed to join game: {}", e));
            Err(e.into())
        }
    }
}

/// Poll the game status and print each change until interrupted
pub async fn game_watch_command(config: &ClientConfig) -> Result<()> {
    let client = GameClient::new(config.http_base());
    let mut watcher = GameStatusWatcher::new();
    let mut interval = tokio::time::interval(config.game_poll_interval);

    print_info("Watching game status (Ctrl+C to stop)");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(status) = watcher.observe(client.status().await) {
                    println!();
                    print!("{}", format_game_status(status));
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

/// Show the leaderboard
pub async fn leaderboard_command(config: &ClientConfig) -> Result<()> {
    let client = GameClient::new(config.http_base());
    let entries = match client.leaderboard().await {
        Ok(e) => e,
        Err(e) => {
            print_error(&format!("Failed to get leaderboard: {}", e));
            return Err(e.into());
        }
    };

    println!("{}", format_leaderboard(&entries));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn serve_join(reply: Value) -> ClientConfig {
        let app = Router::new().route(
            "/api/game/join",
            post(move || async move { Json(reply) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        ClientConfig {
            server_url: format!("http://{}", addr),
            ..ClientConfig::default()
        }
    }

    fn saved_identity(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("identity.toml");
        DisplayIdentity::new("ada").unwrap().save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_rejected_join_is_an_error() {
        let config = serve_join(json!({"error": "No active game"})).await;
        let dir = tempfile::tempdir().unwrap();

        let err = game_join_command(&config, &saved_identity(&dir))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No active game"));
    }

    #[tokio::test]
    async fn test_accepted_join_succeeds() {
        let config = serve_join(json!({"success": true, "question": null})).await;
        let dir = tempfile::tempdir().unwrap();

        assert!(game_join_command(&config, &saved_identity(&dir)).await.is_ok());
    }

    #[tokio::test]
    async fn test_join_without_nickname_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.toml");

        let err = game_join_command(&ClientConfig::default(), &path)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No nickname set"));
    }
}
