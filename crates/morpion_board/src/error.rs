//! Board error types.

use crate::position::Position;
use derive_more::{Display, Error};

/// Error returned when a mark cannot be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum PlaceError {
    /// Row or column is outside `0..=2`.
    #[display("position ({row}, {col}) is out of range")]
    OutOfRange {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },

    /// The target square already holds a mark.
    #[display("square {position} is already occupied")]
    CellOccupied {
        /// The occupied square.
        position: Position,
    },
}

/// Error returned when a board block received over the wire is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ParseError {
    /// A row line did not start with a row digit or lacked four bars.
    #[display("malformed board row: {line:?}")]
    MalformedRow {
        /// The offending line.
        line: String,
    },

    /// A cell held something other than `X`, `O` or blank.
    #[display("unknown cell content: {content:?}")]
    UnknownCell {
        /// The text found between two bars.
        content: String,
    },

    /// The bottom border arrived before all three rows.
    #[display("board block ended after {rows} of 3 rows")]
    IncompleteBlock {
        /// Number of rows that were parsed.
        rows: usize,
    },
}
