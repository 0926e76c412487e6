//! Game rules for morpion.
//!
//! Pure functions over a [`Board`](crate::Board). Rules are kept apart from
//! board storage so the heuristic opponent can probe hypothetical boards.

mod draw;
mod win;

pub use draw::is_full;
pub use win::{LINES, cells_of_line, check_win, check_winner, winning_line};
