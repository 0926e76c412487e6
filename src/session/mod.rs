//! Game sessions.
//!
//! A session is a synchronous [`SessionState`] owned by its own task. Moves,
//! rematch requests, disconnects and delayed computer turns all arrive as
//! commands on that task's queue, so they are applied one at a time.

mod actor;
mod state;

pub(crate) use actor::SessionTask;
pub use actor::SessionHandle;
pub use state::{
    Effects, MoveRejection, Outcome, Seat, SessionId, SessionPhase, SessionState, Turn,
};
