//! Wire rendering of the board block, and the matching parser.
//!
//! The block is part of the line protocol, not a debug aid:
//!
//! ```text
//!     0   1   2
//!   ┌───┬───┬───┐
//! 0 │ X │   │ O │
//!   ├───┼───┼───┤
//! 1 │   │ X │   │
//!   ├───┼───┼───┤
//! 2 │   │   │ O │
//!   └───┴───┴───┘
//! ```

use crate::error::ParseError;
use crate::types::{Board, Mark, Square};
use tracing::{debug, instrument, warn};

/// Column header line, first line of the block.
pub const HEADER: &str = "    0   1   2";
/// Border above row 0.
pub const TOP_BORDER: &str = "  ┌───┬───┬───┐";
/// Border between rows.
pub const MIDDLE_BORDER: &str = "  ├───┼───┼───┤";
/// Border below row 2, last line of the block.
pub const BOTTOM_BORDER: &str = "  └───┴───┴───┘";
/// Cell separator.
pub const BAR: char = '│';

impl Board {
    /// Renders the board block, one string per line, without newlines.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(9);
        lines.push(HEADER.to_string());
        lines.push(TOP_BORDER.to_string());
        for row in 0..3 {
            let cell = |col: usize| self.squares()[row * 3 + col].symbol();
            lines.push(format!(
                "{row} {BAR} {} {BAR} {} {BAR} {} {BAR}",
                cell(0),
                cell(1),
                cell(2)
            ));
            if row < 2 {
                lines.push(MIDDLE_BORDER.to_string());
            }
        }
        lines.push(BOTTOM_BORDER.to_string());
        lines
    }

    /// Renders the board block as newline-terminated text.
    pub fn serialize(&self) -> String {
        self.render_lines()
            .into_iter()
            .map(|line| line + "\n")
            .collect()
    }
}

/// Outcome of feeding one line to a [`BoardBlockParser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// The line is not part of a board block.
    Passthrough,
    /// The line was buffered; the block is not finished yet.
    Pending,
    /// The bottom border arrived and the block parsed cleanly.
    Complete(Board),
}

/// Receiving-side assembler for board blocks.
///
/// A block starts at the header or top-border marker and ends at the
/// bottom-border marker. Cell content is read strictly between the 1st/2nd,
/// 2nd/3rd and 3rd/4th bars of each row line.
#[derive(Debug, Default)]
pub struct BoardBlockParser {
    rows: Option<[Option<[Square; 3]>; 3]>,
}

impl BoardBlockParser {
    /// Creates an idle parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// True while between a start marker and the bottom border.
    pub fn is_collecting(&self) -> bool {
        self.rows.is_some()
    }

    /// Feeds one received line.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] for a malformed row or an incomplete block.
    /// The parser is reset and ready for the next block either way.
    #[instrument(skip(self))]
    pub fn feed(&mut self, line: &str) -> Result<Feed, ParseError> {
        if self.rows.is_none() {
            if is_marker(line, HEADER) || is_marker(line, TOP_BORDER) {
                debug!("Board block started");
                self.rows = Some([None; 3]);
                return Ok(Feed::Pending);
            }
            return Ok(Feed::Passthrough);
        }
        let Some(rows) = self.rows.as_mut() else {
            return Ok(Feed::Passthrough);
        };

        if is_marker(line, BOTTOM_BORDER) {
            let parsed = *rows;
            self.rows = None;
            let found = parsed.iter().flatten().count();
            let [Some(r0), Some(r1), Some(r2)] = parsed else {
                warn!(rows = found, "Board block ended early");
                return Err(ParseError::IncompleteBlock { rows: found });
            };
            let mut squares = [Square::Empty; 9];
            squares[0..3].copy_from_slice(&r0);
            squares[3..6].copy_from_slice(&r1);
            squares[6..9].copy_from_slice(&r2);
            return Ok(Feed::Complete(Board::from_squares(squares)));
        }

        if !line.contains(BAR) {
            // Header repeat, top or middle border.
            return Ok(Feed::Pending);
        }

        match parse_row_line(line) {
            Ok((row, cells)) => {
                rows[row] = Some(cells);
                Ok(Feed::Pending)
            }
            Err(e) => {
                self.rows = None;
                Err(e)
            }
        }
    }
}

/// Whole-line comparison; only a trailing carriage return is tolerated.
fn is_marker(line: &str, marker: &str) -> bool {
    line.strip_suffix('\r').unwrap_or(line) == marker
}

/// Parses `"r │ a │ b │ c │"` into the row index and its three squares.
fn parse_row_line(line: &str) -> Result<(usize, [Square; 3]), ParseError> {
    let malformed = || ParseError::MalformedRow {
        line: line.to_string(),
    };

    let row = line
        .trim_start()
        .chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .map(|d| d as usize)
        .filter(|r| *r <= 2)
        .ok_or_else(malformed)?;

    let bars: Vec<usize> = line
        .char_indices()
        .filter(|(_, c)| *c == BAR)
        .map(|(i, _)| i)
        .take(4)
        .collect();
    if bars.len() < 4 {
        return Err(malformed());
    }

    let mut cells = [Square::Empty; 3];
    for (col, cell) in cells.iter_mut().enumerate() {
        let content = line[bars[col] + BAR.len_utf8()..bars[col + 1]].trim();
        *cell = match content {
            "" => Square::Empty,
            "X" => Square::Occupied(Mark::X),
            "O" => Square::Occupied(Mark::O),
            other => {
                return Err(ParseError::UnknownCell {
                    content: other.to_string(),
                });
            }
        };
    }
    Ok((row, cells))
}
