//! Morpion board - pure 3×3 game logic.
//!
//! This crate knows nothing about sockets or sessions. It provides:
//!
//! - **Board**: the grid of marks with win/draw detection
//! - **Rules**: line enumeration and outcome checks
//! - **Render**: the ASCII block used on the wire, and its parser
//! - **Opponent**: the deterministic heuristic used by the built-in computer player
//!
//! # Example
//!
//! ```
//! use morpion_board::{Board, Mark, choose_move};
//!
//! let mut board = Board::new();
//! board.place(0, 0, Mark::X).unwrap();
//! board.place(0, 1, Mark::X).unwrap();
//!
//! // The computer blocks the open end of row 0.
//! let reply = choose_move(&board, Mark::O).unwrap();
//! assert_eq!((reply.row(), reply.col()), (0, 2));
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod opponent;
mod position;
mod render;
mod rules;
mod types;

pub use error::{ParseError, PlaceError};
pub use opponent::choose_move;
pub use position::Position;
pub use render::{
    BAR, BOTTOM_BORDER, BoardBlockParser, Feed, HEADER, MIDDLE_BORDER, TOP_BORDER,
};
pub use rules::{LINES, cells_of_line, check_win, check_winner, is_full, winning_line};
pub use types::{Board, Mark, Square};
