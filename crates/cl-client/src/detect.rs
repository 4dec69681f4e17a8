//! Output heuristics
//!
//! The executor's output stream has no reliable end-of-run marker, so the
//! controller infers completion from the text itself. Detection sits behind
//! [`CompletionDetector`] so a stricter rule can replace it without touching
//! the controller.
//!
//! The default rule declares a run complete when either:
//!
//! - the most recent output (previous chunk plus current chunk) contains a
//!   run of at least [`SEPARATOR_RUN`] identical separator glyphs **and** one
//!   of [`COMPLETION_PHRASES`], or
//! - the current chunk alone contains one of [`STRONG_COMPLETION_PHRASES`].
//!
//! A program that prints a strong phrase as ordinary output is misread as
//! finished; there is no way to tell the two apart from text alone.

/// Phrases that mark the end of a run when paired with a separator line
pub const COMPLETION_PHRASES: [&str; 5] = [
    "Program completed successfully",
    "Program exited with code",
    "Program execution timed out",
    "Program terminated",
    "Compilation failed",
];

/// Phrases trusted to mark the end of a run on their own
pub const STRONG_COMPLETION_PHRASES: [&str; 3] = [
    "Program completed successfully",
    "Program exited with code",
    "Compilation failed",
];

/// Minimum length of a separator run
pub const SEPARATOR_RUN: usize = 20;

/// Glyphs that form horizontal-rule separators
const SEPARATOR_GLYPHS: [char; 3] = ['─', '-', '='];

/// Keywords that suggest the program is prompting for input
const PROMPT_KEYWORDS: [&str; 3] = ["enter", "input", "scanf"];

/// Decides from streamed output whether the current run has finished
pub trait CompletionDetector: Send {
    /// Feed the next output chunk; returns true once the run looks complete
    fn observe(&mut self, chunk: &str) -> bool;

    /// Forget everything seen so far (a new run is starting)
    fn reset(&mut self);
}

/// Separator-plus-phrase completion rule
#[derive(Debug, Default)]
pub struct MarkerCompletionDetector {
    previous: String,
}

impl MarkerCompletionDetector {
    /// Create a detector with an empty window
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletionDetector for MarkerCompletionDetector {
    fn observe(&mut self, chunk: &str) -> bool {
        let strong = contains_any(chunk, &STRONG_COMPLETION_PHRASES);

        let mut window = String::with_capacity(self.previous.len() + chunk.len());
        window.push_str(&self.previous);
        window.push_str(chunk);
        let marked = has_separator_run(&window) && contains_any(&window, &COMPLETION_PHRASES);

        self.previous.clear();
        self.previous.push_str(chunk);

        strong || marked
    }

    fn reset(&mut self) {
        self.previous.clear();
    }
}

/// Whether `text` contains at least [`SEPARATOR_RUN`] repeats of one glyph
pub fn has_separator_run(text: &str) -> bool {
    let mut current: Option<char> = None;
    let mut run = 0usize;

    for c in text.chars() {
        if SEPARATOR_GLYPHS.contains(&c) {
            if current == Some(c) {
                run += 1;
            } else {
                current = Some(c);
                run = 1;
            }
            if run >= SEPARATOR_RUN {
                return true;
            }
        } else {
            current = None;
            run = 0;
        }
    }

    false
}

/// Whether a chunk reads like an interactive prompt
///
/// Requires a prompt keyword (case-insensitive) and a trailing `:` or `?`
/// once trailing whitespace is ignored. Advisory only.
pub fn looks_like_prompt(chunk: &str) -> bool {
    let trimmed = chunk.trim_end();
    if !(trimmed.ends_with(':') || trimmed.ends_with('?')) {
        return false;
    }

    let lower = trimmed.to_lowercase();
    PROMPT_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text.contains(phrase))
}
