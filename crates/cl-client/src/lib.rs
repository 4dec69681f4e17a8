//! cl-client: Remote program session runtime for codelab
//!
//! Drives remote runs of student programs: the session controller and its
//! output heuristics, the Socket.IO transport to the executor, and the
//! classroom game API client.

pub mod controller;
pub mod detect;
pub mod game;
pub mod session;
pub mod timer;
pub mod transport;

pub use controller::{RemoteSessionController, SessionEvent};
pub use detect::{CompletionDetector, MarkerCompletionDetector};
pub use game::{GameClient, GameError, GameStatus, GameStatusWatcher, LeaderboardEntry, Question};
pub use session::Session;
pub use timer::{Timer, TimerKind};
pub use transport::{ExponentialBackoff, SocketIoTransport};
