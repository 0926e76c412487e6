//! Morpion server library.
//!
//! A line-protocol tic-tac-toe server. Each TCP client picks an opponent
//! (`AI` or `WAIT`), gets paired by the [`Matchmaker`], and plays inside a
//! session task that owns the board and serializes every move.
//!
//! # Architecture
//!
//! - [`GameServer`] accepts sockets and spawns one [`handle_connection`]
//!   worker per client.
//! - The [`Matchmaker`] owns the waiting queue and the session registry.
//! - Each session is a [`SessionState`] driven through a [`SessionHandle`];
//!   delayed computer moves are queued onto the same session task.
//! - [`protocol`] defines client commands, tagged server messages, and the
//!   [`MessageReader`] used to decode them.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod connection;
mod error;
mod matchmaker;
mod participant;
pub mod protocol;
mod server;
mod session;

pub use config::{ConfigError, DEFAULT_PORT, ServerConfig};
pub use connection::handle_connection;
pub use error::{ServerError, ServerErrorKind};
pub use matchmaker::{HumanMatch, Matchmaker};
pub use participant::{Outbox, Participant, ParticipantId};
pub use protocol::{
    ClientCommand, DecodeError, MessageKind, MessageReader, ModeChoice, ServerLine, ServerMessage,
};
pub use server::GameServer;
pub use session::{
    Effects, MoveRejection, Outcome, Seat, SessionHandle, SessionId, SessionPhase, SessionState,
    Turn,
};

pub use morpion_board::{Board, Mark, Position, Square};
