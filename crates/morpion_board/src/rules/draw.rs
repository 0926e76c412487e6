//! Draw detection logic for morpion.

use crate::types::{Board, Square};

/// Checks if the board is full (all squares occupied).
///
/// A full board with no completed line is a draw.
pub fn is_full(board: &Board) -> bool {
    board.squares().iter().all(|s| *s != Square::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::check_winner;
    use crate::types::Mark;

    fn is_draw(board: &Board) -> bool {
        is_full(board) && check_winner(board).is_none()
    }

    #[test]
    fn test_empty_board_not_full() {
        assert!(!is_full(&Board::new()));
    }

    #[test]
    fn test_partial_board_not_full() {
        let mut board = Board::new();
        board.place(1, 1, Mark::X).expect("valid placement");
        assert!(!is_full(&board));
    }

    #[test]
    fn test_draw_detection() {
        // X O X / O X X / O X O
        let mut board = Board::new();
        for (row, col, mark) in [
            (0, 0, Mark::X),
            (0, 1, Mark::O),
            (0, 2, Mark::X),
            (1, 0, Mark::O),
            (1, 1, Mark::X),
            (1, 2, Mark::X),
            (2, 0, Mark::O),
            (2, 1, Mark::X),
            (2, 2, Mark::O),
        ] {
            board.place(row, col, mark).expect("valid placement");
        }

        assert!(is_full(&board));
        assert!(is_draw(&board));
    }

    #[test]
    fn test_not_draw_if_winner() {
        let mut board = Board::new();
        for (row, col, mark) in [
            (0, 0, Mark::X),
            (1, 0, Mark::O),
            (0, 1, Mark::X),
            (1, 1, Mark::O),
            (0, 2, Mark::X),
        ] {
            board.place(row, col, mark).expect("valid placement");
        }

        assert!(!is_draw(&board));
    }
}
