//! Output formatting utilities for the CLI
//!
//! Tables for the leaderboard, game status displays, and colored status
//! messages.

use tabled::{settings::Style, Table, Tabled};

use cl_client::{GameStatus, LeaderboardEntry, Question};

/// Format the leaderboard as an ASCII table
///
/// Rows keep the server's order, which is highest score first.
pub fn format_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "No players on the leaderboard yet".to_string();
    }

    #[derive(Tabled)]
    struct LeaderboardRow {
        #[tabled(rename = "RANK")]
        rank: usize,
        #[tabled(rename = "NICKNAME")]
        nickname: String,
        #[tabled(rename = "SCORE")]
        score: i64,
        #[tabled(rename = "SUBMISSIONS")]
        submissions: u32,
    }

    let rows: Vec<LeaderboardRow> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| LeaderboardRow {
            rank: i + 1,
            nickname: truncate(&e.nickname, 24),
            score: e.score,
            submissions: e.submissions,
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Format a game status snapshot
pub fn format_game_status(status: &GameStatus) -> String {
    if !status.active {
        return "Game: not running\n".to_string();
    }

    let mut output = String::new();
    output.push_str("Game: active\n");
    output.push_str(&format!(
        "Question: {} of {}\n",
        status.question_index + 1,
        status.total_questions
    ));
    if let Some(secs) = status.timer {
        output.push_str(&format!("Time left: {}\n", format_duration(secs)));
    }
    if let Some(question) = &status.current_question {
        output.push('\n');
        output.push_str(&format_question(question));
    }
    output
}

/// Format a challenge for display
pub fn format_question(question: &Question) -> String {
    format!(
        "{}\n{}\nHint: {}\n",
        question.title,
        question.description,
        question.hint.as_deref().unwrap_or("No hint available")
    )
}

/// Format duration in human-readable form
fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
///
/// Outputs to stderr.
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
///
/// Outputs to stderr so it never interleaves with program output.
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
