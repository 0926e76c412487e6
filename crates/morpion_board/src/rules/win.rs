//! Win detection logic for morpion.

use crate::position::Position;
use crate::types::{Board, Mark, Square};

/// The eight lines of the board.
///
/// Indices 0-2 are rows, 3-5 columns, 6 the main diagonal and 7 the
/// anti-diagonal.
pub const LINES: [[Position; 3]; 8] = [
    // Rows
    [Position::TopLeft, Position::TopCenter, Position::TopRight],
    [Position::MiddleLeft, Position::Center, Position::MiddleRight],
    [
        Position::BottomLeft,
        Position::BottomCenter,
        Position::BottomRight,
    ],
    // Columns
    [Position::TopLeft, Position::MiddleLeft, Position::BottomLeft],
    [Position::TopCenter, Position::Center, Position::BottomCenter],
    [Position::TopRight, Position::MiddleRight, Position::BottomRight],
    // Diagonals
    [Position::TopLeft, Position::Center, Position::BottomRight],
    [Position::TopRight, Position::Center, Position::BottomLeft],
];

/// Returns the three squares of line `index`, or `None` past 7.
pub fn cells_of_line(index: usize) -> Option<[Position; 3]> {
    LINES.get(index).copied()
}

/// Index of the first line entirely held by `mark`.
pub fn winning_line(board: &Board, mark: Mark) -> Option<usize> {
    let target = Square::Occupied(mark);
    LINES
        .iter()
        .position(|line| line.iter().all(|pos| board.get(*pos) == target))
}

/// True iff `mark` holds a complete line.
pub fn check_win(board: &Board, mark: Mark) -> bool {
    winning_line(board, mark).is_some()
}

/// Returns the mark holding a complete line, if any.
pub fn check_winner(board: &Board) -> Option<Mark> {
    [Mark::X, Mark::O]
        .into_iter()
        .find(|mark| check_win(board, *mark))
}
