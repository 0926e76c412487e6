//! Board coordinates.

use crate::error::PlaceError;
use tracing::instrument;

/// A square on the 3×3 board.
///
/// Variants are declared in row-major order, so iterating with
/// [`strum::IntoEnumIterator`] scans the board row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::EnumIter)]
pub enum Position {
    /// Row 0, column 0.
    TopLeft,
    /// Row 0, column 1.
    TopCenter,
    /// Row 0, column 2.
    TopRight,
    /// Row 1, column 0.
    MiddleLeft,
    /// Row 1, column 1.
    Center,
    /// Row 1, column 2.
    MiddleRight,
    /// Row 2, column 0.
    BottomLeft,
    /// Row 2, column 1.
    BottomCenter,
    /// Row 2, column 2.
    BottomRight,
}

impl Position {
    /// Corners in the order the computer player prefers them.
    pub const CORNERS: [Position; 4] = [
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
    ];

    /// Builds a position from a row and column.
    ///
    /// # Errors
    ///
    /// Returns [`PlaceError::OutOfRange`] unless both values are in `0..=2`.
    #[instrument]
    pub fn from_row_col(row: usize, col: usize) -> Result<Self, PlaceError> {
        if row > 2 || col > 2 {
            return Err(PlaceError::OutOfRange { row, col });
        }
        Self::from_index(row * 3 + col).ok_or(PlaceError::OutOfRange { row, col })
    }

    /// Creates a position from its row-major index (0-8).
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Position::TopLeft),
            1 => Some(Position::TopCenter),
            2 => Some(Position::TopRight),
            3 => Some(Position::MiddleLeft),
            4 => Some(Position::Center),
            5 => Some(Position::MiddleRight),
            6 => Some(Position::BottomLeft),
            7 => Some(Position::BottomCenter),
            8 => Some(Position::BottomRight),
            _ => None,
        }
    }

    /// Row-major index (0-8).
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Row of this square (0-2).
    pub fn row(self) -> usize {
        self.to_index() / 3
    }

    /// Column of this square (0-2).
    pub fn col(self) -> usize {
        self.to_index() % 3
    }

    /// Parses the two-digit `rc` wire form, accepting any digits.
    ///
    /// Returns `(row, col)` without range checking so callers can report
    /// out-of-range moves distinctly from garbage.
    pub fn parse_digits(text: &str) -> Option<(usize, usize)> {
        let mut chars = text.chars();
        let row = chars.next()?.to_digit(10)? as usize;
        let col = chars.next()?.to_digit(10)? as usize;
        chars.next().is_none().then_some((row, col))
    }

    /// Human-readable label, used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Position::TopLeft => "Top-left",
            Position::TopCenter => "Top-center",
            Position::TopRight => "Top-right",
            Position::MiddleLeft => "Middle-left",
            Position::Center => "Center",
            Position::MiddleRight => "Middle-right",
            Position::BottomLeft => "Bottom-left",
            Position::BottomCenter => "Bottom-center",
            Position::BottomRight => "Bottom-right",
        }
    }
}

/// Renders the two-digit `rc` form used by the line protocol.
impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.row(), self.col())
    }
}
