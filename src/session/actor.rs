//! Per-session task that serializes moves, rematches, disconnects and
//! delayed computer turns.

use super::state::{Effects, SessionId, SessionState};
use crate::participant::ParticipantId;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

#[derive(Debug)]
enum SessionCommand {
    Play {
        participant: ParticipantId,
        row: usize,
        col: usize,
    },
    Rematch {
        participant: ParticipantId,
    },
    Disconnect {
        participant: ParticipantId,
    },
    ComputerTurn {
        round: u64,
    },
}

/// Cheap handle used by connections to drive a session.
///
/// Commands sent after the session retired are dropped.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Submits a move.
    pub fn play(&self, participant: ParticipantId, row: usize, col: usize) {
        self.send(SessionCommand::Play {
            participant,
            row,
            col,
        });
    }

    /// Submits a rematch request.
    pub fn rematch(&self, participant: ParticipantId) {
        self.send(SessionCommand::Rematch { participant });
    }

    /// Reports that a participant left.
    pub fn disconnect(&self, participant: ParticipantId) {
        self.send(SessionCommand::Disconnect { participant });
    }

    /// True once the session task has stopped.
    pub fn is_retired(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: SessionCommand) {
        if self.commands.send(command).is_err() {
            debug!(session_id = %self.id, "Session already retired");
        }
    }
}

/// The session's execution context: owns the state and its command queue.
#[derive(Debug)]
pub(crate) struct SessionTask {
    state: SessionState,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    scheduler: mpsc::WeakUnboundedSender<SessionCommand>,
    computer_delay: Duration,
}

impl SessionTask {
    /// Wraps a freshly built session.
    pub(crate) fn new(state: SessionState, computer_delay: Duration) -> (Self, SessionHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle {
            id: state.id().clone(),
            commands: tx.clone(),
        };
        let task = Self {
            state,
            commands: rx,
            scheduler: tx.downgrade(),
            computer_delay,
        };
        (task, handle)
    }

    /// Runs until the session retires, then returns its id.
    #[instrument(skip(self), fields(session_id = %self.state.id()))]
    pub(crate) async fn run(mut self) -> SessionId {
        let effects = self.state.start();
        if !self.apply(effects) {
            while let Some(command) = self.commands.recv().await {
                let effects = self.dispatch(command);
                if self.apply(effects) {
                    break;
                }
            }
        }
        info!(rounds = self.state.round(), "Session finished");
        self.state.id().clone()
    }

    fn dispatch(&mut self, command: SessionCommand) -> Effects {
        match command {
            SessionCommand::Play {
                participant,
                row,
                col,
            } => self
                .state
                .apply_move(participant, row, col)
                .unwrap_or_default(),
            SessionCommand::Rematch { participant } => {
                self.state.request_rematch(participant).unwrap_or_default()
            }
            SessionCommand::Disconnect { participant } => {
                self.state.handle_disconnect(participant)
            }
            SessionCommand::ComputerTurn { round } => self.state.apply_computer_move(round),
        }
    }

    /// Carries out follow-up work. Returns `true` when the task should stop.
    fn apply(&self, effects: Effects) -> bool {
        if let Some(round) = effects.computer_turn {
            self.schedule_computer_turn(round);
        }
        effects.retire
    }

    /// Enqueues a computer turn onto this same task after the configured delay.
    fn schedule_computer_turn(&self, round: u64) {
        let scheduler = self.scheduler.clone();
        let delay = self.computer_delay;
        debug!(round, delay_ms = delay.as_millis() as u64, "Scheduling computer turn");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(commands) = scheduler.upgrade() {
                let _ = commands.send(SessionCommand::ComputerTurn { round });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Participant;
    use crate::protocol::ServerMessage;
    use crate::session::Seat;
    use morpion_board::{Mark, Position};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::timeout;

    async fn next_message(rx: &mut UnboundedReceiver<ServerMessage>) -> ServerMessage {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("message in time")
            .expect("channel open")
    }

    async fn wait_for(
        rx: &mut UnboundedReceiver<ServerMessage>,
        wanted: impl Fn(&ServerMessage) -> bool,
    ) -> ServerMessage {
        loop {
            let message = next_message(rx).await;
            if wanted(&message) {
                return message;
            }
        }
    }

    #[tokio::test]
    async fn test_computer_turn_runs_on_session_task() {
        let (human, mut rx) = Participant::channel("dave");
        let dave = *human.id();
        let state = SessionState::against_computer("game-actor".to_string(), human, Seat::First);
        let (task, handle) = SessionTask::new(state, Duration::from_millis(10));
        let join = tokio::spawn(task.run());

        wait_for(&mut rx, |m| matches!(m, ServerMessage::YourTurn { .. })).await;
        handle.play(dave, 0, 0);

        let played = wait_for(&mut rx, |m| matches!(m, ServerMessage::ComputerPlayed { .. })).await;
        assert_eq!(
            played,
            ServerMessage::ComputerPlayed {
                position: Position::Center
            }
        );
        assert_eq!(
            next_message(&mut rx).await,
            ServerMessage::YourTurn { mark: Mark::X }
        );

        handle.disconnect(dave);
        let id = timeout(Duration::from_secs(5), join)
            .await
            .expect("task stops")
            .expect("task did not panic");
        assert_eq!(id, "game-actor");
        assert!(handle.is_retired());
    }

    #[tokio::test]
    async fn test_disconnect_during_computer_delay_skips_the_move() {
        let (human, mut rx) = Participant::channel("erin");
        let erin = *human.id();
        let state = SessionState::against_computer("game-delay".to_string(), human, Seat::Second);
        let (task, handle) = SessionTask::new(state, Duration::from_millis(200));
        let join = tokio::spawn(task.run());

        wait_for(&mut rx, |m| *m == ServerMessage::ComputerThinking).await;
        handle.disconnect(erin);
        join.await.expect("task did not panic");
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(timeout(Duration::from_secs(1), rx.recv()).await, Ok(None));
    }
}
