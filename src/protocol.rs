//! Line protocol spoken over each TCP connection.
//!
//! Clients send one command per line. The server answers with tagged lines
//! of the form `<KIND> <text>`, plus the untagged board block rendered by
//! [`Board::render_lines`]. [`MessageReader`] is the receiving side used by
//! clients and tests.

use crate::session::MoveRejection;
use derive_more::{Display, Error};
use morpion_board::{Board, BoardBlockParser, Feed, Mark, ParseError, Position};
use std::str::FromStr;
use tracing::{instrument, trace};

/// Display name used for the built-in opponent.
pub const COMPUTER_NAME: &str = "Computer";

/// Handshake answer selecting an opponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(ascii_case_insensitive)]
pub enum ModeChoice {
    /// Play the built-in opponent.
    #[strum(serialize = "AI")]
    Computer,
    /// Queue for another human.
    #[strum(serialize = "WAIT")]
    Human,
}

impl ModeChoice {
    /// Parses a trimmed, case-insensitive handshake line.
    pub fn parse(line: &str) -> Option<Self> {
        line.trim().parse().ok()
    }
}

/// Command sent by a client once a mode has been chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Two digits `rc`. Range checking happens in the session.
    Move {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },
    /// Ask for a rematch.
    Replay,
    /// Leave the server.
    Quit,
    /// Anything else.
    Unrecognized(String),
}

impl ClientCommand {
    /// Parses a line. Keywords are case-insensitive, surrounding whitespace ignored.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("REPLAY") {
            return Self::Replay;
        }
        if trimmed.eq_ignore_ascii_case("QUIT") {
            return Self::Quit;
        }
        match Position::parse_digits(trimmed) {
            Some((row, col)) => Self::Move { row, col },
            None => Self::Unrecognized(trimmed.to_string()),
        }
    }
}

/// Tag opening every non-board server line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Greeting.
    Welcome,
    /// Mode prompt, repeated after an unknown answer.
    Choose,
    /// Informational notice.
    Info,
    /// Waiting in the matchmaking queue.
    Queued,
    /// A round is starting.
    Start,
    /// The recipient holds the move.
    Turn,
    /// The other side holds the move.
    Waiting,
    /// A move or request was refused.
    Rejected,
    /// The line was not understood.
    Unknown,
    /// Round result, first word `won`, `lost` or `draw`.
    Result,
    /// Replay prompt after a round.
    Replay,
    /// Rematch negotiation.
    Rematch,
    /// The other human left.
    Abandoned,
    /// Reply to `QUIT`.
    Bye,
}

/// Who opens a round, from the recipient's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opening {
    /// The recipient moves first.
    You,
    /// The named opponent moves first.
    Opponent(String),
}

impl std::fmt::Display for Opening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Opening::You => write!(f, "You start."),
            Opening::Opponent(name) => write!(f, "{name} starts."),
        }
    }
}

/// Result of a round for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundResult {
    /// The recipient completed a line.
    Won,
    /// The named opponent completed a line.
    Lost {
        /// Winner's display name.
        winner: String,
    },
    /// Full board, no line.
    Draw,
}

/// Message queued for a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Greeting on connect.
    Welcome,
    /// Mode prompt.
    ChooseMode,
    /// Handshake answer was neither AI nor WAIT.
    UnknownChoice,
    /// Computer match confirmed.
    ComputerSelected,
    /// Entered the queue.
    Searching,
    /// Input while still queued.
    StillSearching,
    /// First round of a match.
    MatchStart {
        /// Opponent's display name.
        opponent: String,
        /// Recipient's mark.
        mark: Mark,
        /// Who moves first.
        opening: Opening,
    },
    /// Rematch round with reassigned marks.
    NewRound {
        /// Recipient's mark.
        mark: Mark,
        /// Who moves first.
        opening: Opening,
    },
    /// Board block.
    Board(Board),
    /// The recipient holds the move.
    YourTurn {
        /// Recipient's mark.
        mark: Mark,
    },
    /// The named human holds the move.
    WaitingFor {
        /// Name of the player to move.
        name: String,
    },
    /// The computer holds the move.
    ComputerThinking,
    /// The computer just played.
    ComputerPlayed {
        /// Square it took.
        position: Position,
    },
    /// A move or rematch request was refused.
    Rejected(MoveRejection),
    /// Unparseable command during a match.
    Unrecognized,
    /// Round result for the recipient.
    Result(RoundResult),
    /// Asks whether to play again.
    ReplayPrompt,
    /// Rematch requested, other human has not answered.
    RematchWaiting,
    /// The other human asked for a rematch.
    RematchRequested {
        /// Requester's name.
        name: String,
    },
    /// The other human disconnected.
    OpponentLeft {
        /// Name of the player who left.
        name: String,
    },
    /// Rematch requested after the other human left.
    OpponentGone,
    /// Reply to `QUIT`.
    Goodbye,
}

impl ServerMessage {
    /// Tag of the line, or `None` for the board block.
    pub fn kind(&self) -> Option<MessageKind> {
        let kind = match self {
            ServerMessage::Board(_) => return None,
            ServerMessage::Welcome => MessageKind::Welcome,
            ServerMessage::ChooseMode | ServerMessage::UnknownChoice => MessageKind::Choose,
            ServerMessage::ComputerSelected | ServerMessage::ComputerPlayed { .. } => {
                MessageKind::Info
            }
            ServerMessage::Searching | ServerMessage::StillSearching => MessageKind::Queued,
            ServerMessage::MatchStart { .. } | ServerMessage::NewRound { .. } => MessageKind::Start,
            ServerMessage::YourTurn { .. } => MessageKind::Turn,
            ServerMessage::WaitingFor { .. } | ServerMessage::ComputerThinking => {
                MessageKind::Waiting
            }
            ServerMessage::Rejected(_) => MessageKind::Rejected,
            ServerMessage::Unrecognized => MessageKind::Unknown,
            ServerMessage::Result(_) => MessageKind::Result,
            ServerMessage::ReplayPrompt => MessageKind::Replay,
            ServerMessage::RematchWaiting | ServerMessage::RematchRequested { .. } => {
                MessageKind::Rematch
            }
            ServerMessage::OpponentLeft { .. } | ServerMessage::OpponentGone => {
                MessageKind::Abandoned
            }
            ServerMessage::Goodbye => MessageKind::Bye,
        };
        Some(kind)
    }

    /// Text following the tag.
    fn text(&self) -> String {
        match self {
            ServerMessage::Board(_) => String::new(),
            ServerMessage::Welcome => "Welcome to the morpion server!".to_string(),
            ServerMessage::ChooseMode => "Play against the computer (send AI) or wait for \
                 another player (send WAIT)?"
                .to_string(),
            ServerMessage::UnknownChoice => "Unrecognized option. Send AI to play the computer \
                 or WAIT to wait for another player."
                .to_string(),
            ServerMessage::ComputerSelected => "You will play against the computer.".to_string(),
            ServerMessage::Searching => "Looking for a human opponent...".to_string(),
            ServerMessage::StillSearching => {
                "Still waiting for another player. Send QUIT to leave.".to_string()
            }
            ServerMessage::MatchStart {
                opponent,
                mark,
                opening,
            } => format!("Match started against {opponent}. You play {mark}. {opening}"),
            ServerMessage::NewRound { mark, opening } => {
                format!("New game! You play {mark}. {opening}")
            }
            ServerMessage::YourTurn { mark } => {
                format!("Your turn ({mark})! Send row and column as two digits (e.g. 01).")
            }
            ServerMessage::WaitingFor { name } => format!("Waiting for {name} to move..."),
            ServerMessage::ComputerThinking => "The computer is thinking...".to_string(),
            ServerMessage::ComputerPlayed { position } => {
                format!("The computer played {position}.")
            }
            ServerMessage::Rejected(rejection) => {
                format!("{rejection}: {}", rejection.explanation())
            }
            ServerMessage::Unrecognized => "Unrecognized command. Send a move as two digits \
                 (e.g. 01), REPLAY or QUIT."
                .to_string(),
            ServerMessage::Result(RoundResult::Won) => "won: Congratulations, you won!".to_string(),
            ServerMessage::Result(RoundResult::Lost { winner }) => {
                format!("lost: You lost. {winner} won.")
            }
            ServerMessage::Result(RoundResult::Draw) => {
                "draw: Draw! The board is full.".to_string()
            }
            ServerMessage::ReplayPrompt => {
                "Game over. Send REPLAY to play again or QUIT to leave.".to_string()
            }
            ServerMessage::RematchWaiting => {
                "Waiting for the other player's answer...".to_string()
            }
            ServerMessage::RematchRequested { name } => {
                format!("{name} wants a rematch. Send REPLAY to accept.")
            }
            ServerMessage::OpponentLeft { name } => format!("{name} disconnected. Game over."),
            ServerMessage::OpponentGone => {
                "The other player is no longer connected.".to_string()
            }
            ServerMessage::Goodbye => "Goodbye!".to_string(),
        }
    }

    /// Wire lines for this message, without trailing newlines.
    pub fn to_lines(&self) -> Vec<String> {
        match (self, self.kind()) {
            (ServerMessage::Board(board), _) => board.render_lines(),
            (_, Some(kind)) => vec![format!("{kind} {}", self.text())],
            (_, None) => Vec::new(),
        }
    }

    /// Newline-terminated wire text, written in one piece.
    pub fn encode(&self) -> String {
        self.to_lines().into_iter().map(|line| line + "\n").collect()
    }
}

/// A decoded server line, or a completed board block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// Tagged line.
    Message {
        /// Leading tag.
        kind: MessageKind,
        /// Text after the tag.
        text: String,
    },
    /// A full board block.
    Board(Board),
}

impl ServerLine {
    /// Tag of a message line.
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            ServerLine::Message { kind, .. } => Some(*kind),
            ServerLine::Board(_) => None,
        }
    }

    /// Text before the first `:` of a message, e.g. `won` or `occupied`.
    pub fn keyword(&self) -> Option<&str> {
        match self {
            ServerLine::Message { text, .. } => text.split(':').next(),
            ServerLine::Board(_) => None,
        }
    }
}

/// Error decoding a server line.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DecodeError {
    /// Malformed board block.
    #[display("invalid board block: {source}")]
    Board {
        /// Underlying parse failure.
        source: ParseError,
    },
    /// Line did not start with a known tag.
    #[display("unknown message tag in {line:?}")]
    UnknownTag {
        /// The offending line.
        line: String,
    },
}

impl From<ParseError> for DecodeError {
    fn from(source: ParseError) -> Self {
        DecodeError::Board { source }
    }
}

/// Client-side decoder turning received lines into [`ServerLine`]s.
#[derive(Debug, Default)]
pub struct MessageReader {
    boards: BoardBlockParser,
}

impl MessageReader {
    /// Creates a reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line. Returns `None` while a board block is incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for a malformed board or an unknown tag.
    #[instrument(skip(self))]
    pub fn feed(&mut self, line: &str) -> Result<Option<ServerLine>, DecodeError> {
        match self.boards.feed(line)? {
            Feed::Complete(board) => return Ok(Some(ServerLine::Board(board))),
            Feed::Pending => return Ok(None),
            Feed::Passthrough => {}
        }
        let (tag, text) = line.split_once(' ').unwrap_or((line, ""));
        let kind = MessageKind::from_str(tag).map_err(|_| DecodeError::UnknownTag {
            line: line.to_string(),
        })?;
        trace!(%kind, "Decoded message");
        Ok(Some(ServerLine::Message {
            kind,
            text: text.to_string(),
        }))
    }
}
