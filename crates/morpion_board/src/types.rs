//! Core domain types for morpion.

use crate::error::PlaceError;
use crate::position::Position;
use crate::rules;
use derive_more::Display;
use strum::IntoEnumIterator;
use tracing::{debug, instrument};

/// Mark placed by a participant.
///
/// Whoever opens a round plays [`Mark::X`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Mark {
    /// The opening mark.
    X,
    /// The replying mark.
    O,
}

impl Mark {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// Character drawn in a board cell.
    pub fn symbol(self) -> char {
        match self {
            Mark::X => 'X',
            Mark::O => 'O',
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Square {
    /// No mark yet.
    #[default]
    Empty,
    /// Square holding a mark.
    Occupied(Mark),
}

impl Square {
    /// Character drawn in a board cell (a space when empty).
    pub fn symbol(self) -> char {
        match self {
            Square::Empty => ' ',
            Square::Occupied(mark) => mark.symbol(),
        }
    }
}

/// 3×3 morpion board.
///
/// Marks only ever appear through [`Board::place`], which refuses occupied
/// squares, so the board is append-only between resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board {
    /// Squares in row-major order (0-8).
    squares: [Square; 9],
    /// Most recent placement, for client-side highlighting.
    last_played: Option<Position>,
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a board from row-major squares, with no last move recorded.
    pub fn from_squares(squares: [Square; 9]) -> Self {
        Self {
            squares,
            last_played: None,
        }
    }

    /// Gets the square at the given position.
    pub fn get(&self, pos: Position) -> Square {
        self.squares[pos.to_index()]
    }

    /// Checks if a square is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos) == Square::Empty
    }

    /// Returns all squares in row-major order.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Position of the most recent placement, if any.
    pub fn last_played(&self) -> Option<Position> {
        self.last_played
    }

    /// Places `mark` at `(row, col)`.
    ///
    /// # Errors
    ///
    /// - [`PlaceError::OutOfRange`] if row or column is outside `0..=2`
    /// - [`PlaceError::CellOccupied`] if the square already holds a mark
    #[instrument(skip(self))]
    pub fn place(&mut self, row: usize, col: usize, mark: Mark) -> Result<Position, PlaceError> {
        let pos = Position::from_row_col(row, col)?;
        self.place_at(pos, mark)?;
        Ok(pos)
    }

    /// Places `mark` at an already validated position.
    ///
    /// # Errors
    ///
    /// Returns [`PlaceError::CellOccupied`] if the square already holds a mark.
    #[instrument(skip(self, pos), fields(position = %pos))]
    pub fn place_at(&mut self, pos: Position, mark: Mark) -> Result<(), PlaceError> {
        if !self.is_empty(pos) {
            debug!("Square already occupied");
            return Err(PlaceError::CellOccupied { position: pos });
        }
        self.squares[pos.to_index()] = Square::Occupied(mark);
        self.last_played = Some(pos);
        Ok(())
    }

    /// Copy of this board with `mark` hypothetically placed at `pos`.
    ///
    /// Used for look-ahead; the square is overwritten even if occupied.
    pub fn with_mark(&self, pos: Position, mark: Mark) -> Self {
        let mut next = *self;
        next.squares[pos.to_index()] = Square::Occupied(mark);
        next.last_played = Some(pos);
        next
    }

    /// Clears every square.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// True iff some row, column or diagonal is entirely `mark`.
    pub fn check_win(&self, mark: Mark) -> bool {
        rules::check_win(self, mark)
    }

    /// Index (0-7) of the first line completed by `mark`.
    pub fn winning_line(&self, mark: Mark) -> Option<usize> {
        rules::winning_line(self, mark)
    }

    /// True iff no square is empty.
    pub fn is_full(&self) -> bool {
        rules::is_full(self)
    }

    /// Number of squares holding `mark`.
    pub fn count(&self, mark: Mark) -> usize {
        self.squares
            .iter()
            .filter(|sq| **sq == Square::Occupied(mark))
            .count()
    }

    /// True iff `X` leads `O` by zero or one mark.
    pub fn is_balanced(&self) -> bool {
        let (x, o) = (self.count(Mark::X), self.count(Mark::O));
        x == o || x == o + 1
    }

    /// Empty squares in row-major order.
    pub fn empty_positions(&self) -> impl Iterator<Item = Position> + '_ {
        Position::iter().filter(|pos| self.is_empty(*pos))
    }
}
