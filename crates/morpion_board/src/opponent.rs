//! Heuristic computer opponent.
//!
//! Deterministic, not optimal. Priority order:
//!
//! 1. complete one of its own lines (first empty square in row-major order)
//! 2. block a line the other mark would complete (first found, row-major)
//! 3. take the center
//! 4. take a corner: top-left, top-right, bottom-left, bottom-right
//! 5. take the first empty square in row-major order

use crate::position::Position;
use crate::types::{Board, Mark};
use tracing::{debug, instrument};

/// Chooses the computer's next square, or `None` on a full board.
#[instrument(skip(board))]
pub fn choose_move(board: &Board, own: Mark) -> Option<Position> {
    if let Some(pos) = completing_square(board, own) {
        debug!(position = %pos, "Taking winning square");
        return Some(pos);
    }
    if let Some(pos) = completing_square(board, own.opponent()) {
        debug!(position = %pos, "Blocking opponent line");
        return Some(pos);
    }
    if board.is_empty(Position::Center) {
        return Some(Position::Center);
    }
    Position::CORNERS
        .into_iter()
        .find(|pos| board.is_empty(*pos))
        .or_else(|| board.empty_positions().next())
}

/// First empty square that would complete a line for `mark`.
fn completing_square(board: &Board, mark: Mark) -> Option<Position> {
    board
        .empty_positions()
        .find(|pos| board.with_mark(*pos, mark).winning_line(mark).is_some())
}
