//! Synchronous session state machine.
//!
//! Every method runs on the session's own task, so the state needs no lock.
//! Methods queue outbound messages directly and report follow-up work to the
//! task through [`Effects`].

use crate::participant::{Participant, ParticipantId};
use crate::protocol::{COMPUTER_NAME, Opening, RoundResult, ServerMessage};
use derive_more::{Display, Error};
use morpion_board::{Board, Mark, PlaceError, Position, choose_move};
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a session, e.g. `game-1718000000000-3`.
pub type SessionId = String;

/// Why a move or rematch request was refused.
///
/// The display form is the reason keyword sent after `REJECTED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MoveRejection {
    /// The sender does not hold the move.
    #[display("not your turn")]
    NotYourTurn,
    /// Row or column outside `0..=2`.
    #[display("out of range")]
    OutOfRange,
    /// Target square already marked.
    #[display("occupied")]
    Occupied,
    /// The round has ended.
    #[display("game over")]
    GameOver,
    /// Rematch asked for while a round is still being played.
    #[display("game in progress")]
    InProgress,
}

impl MoveRejection {
    /// Human-readable hint following the reason keyword.
    pub fn explanation(self) -> &'static str {
        match self {
            MoveRejection::NotYourTurn => "wait for your opponent to move.",
            MoveRejection::OutOfRange => "row and column must each be 0, 1 or 2.",
            MoveRejection::Occupied => "that square is already taken.",
            MoveRejection::GameOver => "the round is over. Send REPLAY or QUIT.",
            MoveRejection::InProgress => "finish the current round first.",
        }
    }
}

impl From<PlaceError> for MoveRejection {
    fn from(err: PlaceError) -> Self {
        match err {
            PlaceError::OutOfRange { .. } => MoveRejection::OutOfRange,
            PlaceError::CellOccupied { .. } => MoveRejection::Occupied,
        }
    }
}

/// One of the two places at the table.
///
/// `First` is always a human: the requester of a computer match, or the
/// earlier-queued player of a human match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Seat {
    /// First seat.
    First,
    /// Second seat, the computer in a computer match.
    Second,
}

impl Seat {
    /// The opposite seat.
    pub fn other(self) -> Self {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }
}

/// Who holds the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    /// A connected human.
    Human(ParticipantId),
    /// The built-in opponent; no connection owns the turn.
    Computer,
}

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The given mark completed a line.
    Win(Mark),
    /// Full board, no line.
    Draw,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Constructed, first round not started.
    AwaitingFirstMove,
    /// A round is being played.
    InProgress(Turn),
    /// A round ended; replay may be requested.
    Concluded(Outcome),
    /// One of two humans asked for a rematch.
    RematchPending,
    /// A human left a two-human session; the other is still connected.
    Abandoned,
    /// No human remains; the session is being removed.
    Retired,
}

/// Follow-up work for the session task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[must_use]
pub struct Effects {
    /// Schedule a computer move for this round.
    pub computer_turn: Option<u64>,
    /// Stop the task and drop the session from the registry.
    pub retire: bool,
}

#[derive(Debug, Clone)]
struct HumanSeat {
    participant: Participant,
    mark: Mark,
    connected: bool,
    wants_rematch: bool,
}

impl HumanSeat {
    fn new(participant: Participant) -> Self {
        Self {
            participant,
            mark: Mark::X,
            connected: true,
            wants_rematch: false,
        }
    }

    fn id(&self) -> ParticipantId {
        *self.participant.id()
    }

    fn send(&self, message: ServerMessage) {
        if self.connected {
            self.participant.send(message);
        }
    }
}

#[derive(Debug, Clone)]
enum Opponent {
    Human(HumanSeat),
    Computer { mark: Mark },
}

/// State of one match: the board, both seats, and the phase.
#[derive(Debug)]
pub struct SessionState {
    id: SessionId,
    board: Board,
    host: HumanSeat,
    opponent: Opponent,
    opener: Seat,
    phase: SessionPhase,
    round: u64,
}

impl SessionState {
    /// A human against the built-in opponent.
    pub fn against_computer(id: SessionId, human: Participant, opener: Seat) -> Self {
        Self::with_opponent(id, human, Opponent::Computer { mark: Mark::O }, opener)
    }

    /// Two humans; `first` is the one who queued earlier.
    pub fn between_humans(
        id: SessionId,
        first: Participant,
        second: Participant,
        opener: Seat,
    ) -> Self {
        Self::with_opponent(id, first, Opponent::Human(HumanSeat::new(second)), opener)
    }

    fn with_opponent(id: SessionId, host: Participant, opponent: Opponent, opener: Seat) -> Self {
        Self {
            id,
            board: Board::new(),
            host: HumanSeat::new(host),
            opponent,
            opener,
            phase: SessionPhase::AwaitingFirstMove,
            round: 0,
        }
    }

    /// Session id.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Round counter, starting at 1 once the first round begins.
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Seat that opened the current round.
    pub fn opener(&self) -> Seat {
        self.opener
    }

    /// True while a round is being played.
    pub fn is_active(&self) -> bool {
        matches!(self.phase, SessionPhase::InProgress(_))
    }

    /// Who holds the move, if a round is being played.
    pub fn current_turn(&self) -> Option<Turn> {
        match self.phase {
            SessionPhase::InProgress(turn) => Some(turn),
            _ => None,
        }
    }

    /// True when the second seat is the built-in opponent.
    pub fn is_against_computer(&self) -> bool {
        matches!(self.opponent, Opponent::Computer { .. })
    }

    /// Mark currently assigned to a participant.
    pub fn mark_of(&self, participant: ParticipantId) -> Option<Mark> {
        self.seat_of(participant).map(|seat| self.mark_at(seat))
    }

    /// Whether a participant has asked for a rematch.
    pub fn wants_rematch(&self, participant: ParticipantId) -> Option<bool> {
        self.seat_of(participant)
            .and_then(|seat| self.human(seat))
            .map(|human| human.wants_rematch)
    }

    /// Starts the first round.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn start(&mut self) -> Effects {
        if self.phase != SessionPhase::AwaitingFirstMove {
            warn!(phase = ?self.phase, "Session already started");
            return Effects::default();
        }
        self.begin_round(true)
    }

    /// Applies a human move.
    ///
    /// # Errors
    ///
    /// Returns the [`MoveRejection`] after sending it, followed by the
    /// sender's unchanged turn indicator. The board is untouched.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn apply_move(
        &mut self,
        participant: ParticipantId,
        row: usize,
        col: usize,
    ) -> Result<Effects, MoveRejection> {
        let Some(seat) = self.seat_of(participant) else {
            warn!(%participant, "Move from participant outside this session");
            return Err(MoveRejection::NotYourTurn);
        };
        if let Err(rejection) = self.check_turn(participant) {
            debug!(%participant, %rejection, "Move refused");
            return Err(self.reject(seat, rejection));
        }

        let mark = self.mark_at(seat);
        let position = match self.board.place(row, col, mark) {
            Ok(position) => position,
            Err(e) => {
                debug!(%participant, error = %e, "Placement refused");
                return Err(self.reject(seat, e.into()));
            }
        };

        info!(%participant, %position, %mark, "Move applied");
        Ok(self.after_placement(seat, mark, position))
    }

    /// Applies the computer's move for `round`.
    ///
    /// Ignored unless the session is still in that round and the computer
    /// holds the move.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn apply_computer_move(&mut self, round: u64) -> Effects {
        if round != self.round || self.phase != SessionPhase::InProgress(Turn::Computer) {
            debug!(current_round = self.round, phase = ?self.phase, "Ignoring stale computer turn");
            return Effects::default();
        }
        let Opponent::Computer { mark } = self.opponent else {
            return Effects::default();
        };
        let Some(position) = choose_move(&self.board, mark) else {
            warn!("Computer has no square left");
            return Effects::default();
        };
        if let Err(e) = self.board.place_at(position, mark) {
            warn!(error = %e, "Computer chose an occupied square");
            return Effects::default();
        }

        info!(%position, %mark, "Computer moved");
        self.after_placement(Seat::Second, mark, position)
    }

    /// Handles `REPLAY`.
    ///
    /// Against the computer a new round starts at once. Between humans both
    /// must ask; a single request leaves the session in
    /// [`SessionPhase::RematchPending`].
    ///
    /// # Errors
    ///
    /// Returns [`MoveRejection::InProgress`] while a round is being played.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn request_rematch(&mut self, participant: ParticipantId) -> Result<Effects, MoveRejection> {
        let Some(seat) = self.seat_of(participant) else {
            warn!(%participant, "Rematch from participant outside this session");
            return Ok(Effects::default());
        };
        match self.phase {
            SessionPhase::AwaitingFirstMove | SessionPhase::InProgress(_) => {
                return Err(self.reject(seat, MoveRejection::InProgress));
            }
            SessionPhase::Abandoned | SessionPhase::Retired => {
                if let Some(human) = self.human(seat) {
                    human.send(ServerMessage::OpponentGone);
                }
                return Ok(Effects::default());
            }
            SessionPhase::Concluded(_) | SessionPhase::RematchPending => {}
        }

        if self.is_against_computer() {
            info!("Rematch against computer");
            return Ok(self.next_round());
        }

        if let Some(human) = self.human_mut(seat) {
            human.wants_rematch = true;
        }
        let everyone_agrees = self.humans().all(|(_, human)| human.wants_rematch);
        if everyone_agrees {
            info!("Both players accepted the rematch");
            return Ok(self.next_round());
        }

        self.phase = SessionPhase::RematchPending;
        let requester = self.name_at(seat).to_string();
        info!(%participant, "Rematch requested");
        for (other_seat, human) in self.humans() {
            if other_seat == seat {
                human.send(ServerMessage::RematchWaiting);
            } else {
                human.send(ServerMessage::RematchRequested {
                    name: requester.clone(),
                });
            }
        }
        Ok(Effects::default())
    }

    /// Handles a participant leaving, by `QUIT` or transport failure.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn handle_disconnect(&mut self, participant: ParticipantId) -> Effects {
        let Some(seat) = self.seat_of(participant) else {
            return Effects::default();
        };
        match self.human_mut(seat) {
            Some(human) if human.connected => {
                human.connected = false;
                human.wants_rematch = false;
            }
            _ => return Effects::default(),
        }

        let remaining = self
            .humans()
            .any(|(other, human)| other != seat && human.connected);
        if !remaining {
            info!(%participant, "Last participant left, retiring session");
            self.phase = SessionPhase::Retired;
            return Effects {
                retire: true,
                ..Effects::default()
            };
        }

        if self.phase != SessionPhase::Abandoned {
            info!(%participant, phase = ?self.phase, "Participant left, session abandoned");
            self.phase = SessionPhase::Abandoned;
            let name = self.name_at(seat).to_string();
            if let Some(other) = self.human(seat.other()) {
                other.send(ServerMessage::OpponentLeft { name });
            }
        }
        Effects::default()
    }

    fn next_round(&mut self) -> Effects {
        for seat in [Seat::First, Seat::Second] {
            if let Some(human) = self.human_mut(seat) {
                human.wants_rematch = false;
            }
        }
        self.opener = self.opener.other();
        self.begin_round(false)
    }

    fn begin_round(&mut self, first_round: bool) -> Effects {
        self.board.reset();
        self.round += 1;

        let host_mark = if self.opener == Seat::First {
            Mark::X
        } else {
            Mark::O
        };
        self.host.mark = host_mark;
        match &mut self.opponent {
            Opponent::Human(human) => human.mark = host_mark.opponent(),
            Opponent::Computer { mark } => *mark = host_mark.opponent(),
        }
        self.phase = SessionPhase::InProgress(self.turn_for(self.opener));
        info!(
            session_id = %self.id,
            round = self.round,
            opener = self.name_at(self.opener),
            "Round started"
        );

        let opener_name = self.name_at(self.opener).to_string();
        for (seat, human) in self.humans() {
            let opening = if seat == self.opener {
                Opening::You
            } else {
                Opening::Opponent(opener_name.clone())
            };
            let announcement = if first_round {
                ServerMessage::MatchStart {
                    opponent: self.name_at(seat.other()).to_string(),
                    mark: human.mark,
                    opening,
                }
            } else {
                ServerMessage::NewRound {
                    mark: human.mark,
                    opening,
                }
            };
            human.send(announcement);
            human.send(ServerMessage::Board(self.board));
        }
        self.announce_turn()
    }

    fn after_placement(&mut self, mover: Seat, mark: Mark, position: Position) -> Effects {
        debug_assert!(self.board.is_balanced());
        self.broadcast(ServerMessage::Board(self.board));
        if mover == Seat::Second && self.is_against_computer() {
            self.host.send(ServerMessage::ComputerPlayed { position });
        }

        if self.board.check_win(mark) {
            self.conclude(Outcome::Win(mark));
            return Effects::default();
        }
        if self.board.is_full() {
            self.conclude(Outcome::Draw);
            return Effects::default();
        }

        self.phase = SessionPhase::InProgress(self.turn_for(mover.other()));
        self.announce_turn()
    }

    fn conclude(&mut self, outcome: Outcome) {
        self.phase = SessionPhase::Concluded(outcome);
        info!(?outcome, round = self.round, "Round concluded");
        for (seat, human) in self.humans() {
            let result = match outcome {
                Outcome::Win(mark) if mark == human.mark => RoundResult::Won,
                Outcome::Win(_) => RoundResult::Lost {
                    winner: self.name_at(seat.other()).to_string(),
                },
                Outcome::Draw => RoundResult::Draw,
            };
            human.send(ServerMessage::Result(result));
            human.send(ServerMessage::ReplayPrompt);
        }
    }

    fn announce_turn(&self) -> Effects {
        let mut effects = Effects::default();
        match self.current_turn() {
            Some(Turn::Computer) => {
                self.host.send(ServerMessage::ComputerThinking);
                effects.computer_turn = Some(self.round);
            }
            Some(Turn::Human(_)) => {
                for (seat, human) in self.humans() {
                    if let Some(status) = self.status_for(seat) {
                        human.send(status);
                    }
                }
            }
            None => {}
        }
        effects
    }

    /// Turn or phase indicator for a seat, as re-sent after a rejection.
    fn status_for(&self, seat: Seat) -> Option<ServerMessage> {
        let human = self.human(seat)?;
        match self.phase {
            SessionPhase::InProgress(Turn::Human(id)) if id == human.id() => {
                Some(ServerMessage::YourTurn { mark: human.mark })
            }
            SessionPhase::InProgress(Turn::Human(_)) => Some(ServerMessage::WaitingFor {
                name: self.name_at(seat.other()).to_string(),
            }),
            SessionPhase::InProgress(Turn::Computer) => Some(ServerMessage::ComputerThinking),
            SessionPhase::Concluded(_) => Some(ServerMessage::ReplayPrompt),
            SessionPhase::RematchPending if human.wants_rematch => {
                Some(ServerMessage::RematchWaiting)
            }
            SessionPhase::RematchPending => Some(ServerMessage::ReplayPrompt),
            SessionPhase::Abandoned => Some(ServerMessage::OpponentGone),
            SessionPhase::AwaitingFirstMove | SessionPhase::Retired => None,
        }
    }

    fn reject(&self, seat: Seat, rejection: MoveRejection) -> MoveRejection {
        if let Some(human) = self.human(seat) {
            human.send(ServerMessage::Rejected(rejection));
            if let Some(status) = self.status_for(seat) {
                human.send(status);
            }
        }
        rejection
    }

    fn check_turn(&self, participant: ParticipantId) -> Result<(), MoveRejection> {
        match self.phase {
            SessionPhase::InProgress(Turn::Human(id)) if id == participant => Ok(()),
            SessionPhase::InProgress(_) | SessionPhase::AwaitingFirstMove => {
                Err(MoveRejection::NotYourTurn)
            }
            SessionPhase::Concluded(_)
            | SessionPhase::RematchPending
            | SessionPhase::Abandoned
            | SessionPhase::Retired => Err(MoveRejection::GameOver),
        }
    }

    fn broadcast(&self, message: ServerMessage) {
        for (_, human) in self.humans() {
            human.send(message.clone());
        }
    }

    fn seat_of(&self, participant: ParticipantId) -> Option<Seat> {
        self.humans()
            .find(|(_, human)| human.id() == participant)
            .map(|(seat, _)| seat)
    }

    fn humans(&self) -> impl Iterator<Item = (Seat, &HumanSeat)> {
        let second = match &self.opponent {
            Opponent::Human(human) => Some((Seat::Second, human)),
            Opponent::Computer { .. } => None,
        };
        std::iter::once((Seat::First, &self.host)).chain(second)
    }

    fn human(&self, seat: Seat) -> Option<&HumanSeat> {
        match (seat, &self.opponent) {
            (Seat::First, _) => Some(&self.host),
            (Seat::Second, Opponent::Human(human)) => Some(human),
            (Seat::Second, Opponent::Computer { .. }) => None,
        }
    }

    fn human_mut(&mut self, seat: Seat) -> Option<&mut HumanSeat> {
        match (seat, &mut self.opponent) {
            (Seat::First, _) => Some(&mut self.host),
            (Seat::Second, Opponent::Human(human)) => Some(human),
            (Seat::Second, Opponent::Computer { .. }) => None,
        }
    }

    fn mark_at(&self, seat: Seat) -> Mark {
        match (seat, &self.opponent) {
            (Seat::First, _) => self.host.mark,
            (Seat::Second, Opponent::Human(human)) => human.mark,
            (Seat::Second, Opponent::Computer { mark }) => *mark,
        }
    }

    fn name_at(&self, seat: Seat) -> &str {
        match self.human(seat) {
            Some(human) => human.participant.name(),
            None => COMPUTER_NAME,
        }
    }

    fn turn_for(&self, seat: Seat) -> Turn {
        match self.human(seat) {
            Some(human) => Turn::Human(human.id()),
            None => Turn::Computer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morpion_board::Square;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    struct Table {
        state: SessionState,
        alice: ParticipantId,
        bob: ParticipantId,
        alice_rx: UnboundedReceiver<ServerMessage>,
        bob_rx: UnboundedReceiver<ServerMessage>,
    }

    fn human_table() -> Table {
        let (alice, alice_rx) = Participant::channel("alice");
        let (bob, bob_rx) = Participant::channel("bob");
        let (alice_id, bob_id) = (*alice.id(), *bob.id());
        let mut state =
            SessionState::between_humans("game-test".to_string(), alice, bob, Seat::First);
        let _ = state.start();
        let mut table = Table {
            state,
            alice: alice_id,
            bob: bob_id,
            alice_rx,
            bob_rx,
        };
        drain(&mut table.alice_rx);
        drain(&mut table.bob_rx);
        table
    }

    fn play(table: &mut Table, moves: &[(ParticipantId, usize, usize)]) {
        for (who, row, col) in moves {
            table
                .state
                .apply_move(*who, *row, *col)
                .expect("legal move");
        }
        drain(&mut table.alice_rx);
        drain(&mut table.bob_rx);
    }

    #[test]
    fn test_start_announces_match_to_both_humans() {
        let (alice, mut alice_rx) = Participant::channel("alice");
        let (bob, mut bob_rx) = Participant::channel("bob");
        let alice_id = *alice.id();
        let mut state = SessionState::between_humans("game-test".to_string(), alice, bob, Seat::First);

        let effects = state.start();

        assert_eq!(effects, Effects::default());
        assert_eq!(state.current_turn(), Some(Turn::Human(alice_id)));
        assert_eq!(
            drain(&mut alice_rx),
            vec![
                ServerMessage::MatchStart {
                    opponent: "bob".to_string(),
                    mark: Mark::X,
                    opening: Opening::You,
                },
                ServerMessage::Board(Board::new()),
                ServerMessage::YourTurn { mark: Mark::X },
            ]
        );
        assert_eq!(
            drain(&mut bob_rx),
            vec![
                ServerMessage::MatchStart {
                    opponent: "alice".to_string(),
                    mark: Mark::O,
                    opening: Opening::Opponent("alice".to_string()),
                },
                ServerMessage::Board(Board::new()),
                ServerMessage::WaitingFor {
                    name: "alice".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_accepted_move_broadcasts_board_and_passes_turn() {
        let mut table = human_table();

        let effects = table.state.apply_move(table.alice, 1, 1).expect("legal move");

        assert_eq!(effects, Effects::default());
        let board = *table.state.board();
        assert_eq!(board.get(Position::Center), Square::Occupied(Mark::X));
        assert_eq!(
            drain(&mut table.bob_rx),
            vec![
                ServerMessage::Board(board),
                ServerMessage::YourTurn { mark: Mark::O },
            ]
        );
        assert_eq!(
            drain(&mut table.alice_rx),
            vec![
                ServerMessage::Board(board),
                ServerMessage::WaitingFor {
                    name: "bob".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_out_of_turn_move_is_rejected_without_change() {
        let mut table = human_table();

        let result = table.state.apply_move(table.bob, 0, 0);

        assert_eq!(result, Err(MoveRejection::NotYourTurn));
        assert_eq!(*table.state.board(), Board::new());
        assert_eq!(
            drain(&mut table.bob_rx),
            vec![
                ServerMessage::Rejected(MoveRejection::NotYourTurn),
                ServerMessage::WaitingFor {
                    name: "alice".to_string()
                },
            ]
        );
        assert!(drain(&mut table.alice_rx).is_empty());
    }

    #[test]
    fn test_occupied_square_is_rejected_and_turn_kept() {
        let mut table = human_table();
        let (alice, bob) = (table.alice, table.bob);
        play(&mut table, &[(alice, 1, 1)]);
        let before = *table.state.board();

        let result = table.state.apply_move(bob, 1, 1);

        assert_eq!(result, Err(MoveRejection::Occupied));
        assert_eq!(*table.state.board(), before);
        assert_eq!(table.state.current_turn(), Some(Turn::Human(bob)));
        assert_eq!(
            drain(&mut table.bob_rx),
            vec![
                ServerMessage::Rejected(MoveRejection::Occupied),
                ServerMessage::YourTurn { mark: Mark::O },
            ]
        );
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        let mut table = human_table();
        assert_eq!(
            table.state.apply_move(table.alice, 3, 0),
            Err(MoveRejection::OutOfRange)
        );
        assert_eq!(*table.state.board(), Board::new());
    }

    #[test]
    fn test_completed_line_concludes_with_per_player_result() {
        let mut table = human_table();
        let (alice, bob) = (table.alice, table.bob);
        play(
            &mut table,
            &[(alice, 0, 0), (bob, 1, 0), (alice, 0, 1), (bob, 1, 1)],
        );

        table.state.apply_move(alice, 0, 2).expect("winning move");

        assert_eq!(
            table.state.phase(),
            SessionPhase::Concluded(Outcome::Win(Mark::X))
        );
        let alice_msgs = drain(&mut table.alice_rx);
        assert_eq!(
            alice_msgs[1..],
            [
                ServerMessage::Result(RoundResult::Won),
                ServerMessage::ReplayPrompt
            ]
        );
        let bob_msgs = drain(&mut table.bob_rx);
        assert_eq!(
            bob_msgs[1..],
            [
                ServerMessage::Result(RoundResult::Lost {
                    winner: "alice".to_string()
                }),
                ServerMessage::ReplayPrompt
            ]
        );

        assert_eq!(
            table.state.apply_move(bob, 2, 2),
            Err(MoveRejection::GameOver)
        );
    }

    #[test]
    fn test_rematch_needs_both_humans_and_alternates_opener() {
        let mut table = human_table();
        let (alice, bob) = (table.alice, table.bob);
        play(
            &mut table,
            &[
                (alice, 0, 0),
                (bob, 1, 0),
                (alice, 0, 1),
                (bob, 1, 1),
                (alice, 0, 2),
            ],
        );
        let concluded = *table.state.board();

        let effects = table.state.request_rematch(alice).expect("round is over");
        assert_eq!(effects, Effects::default());
        assert_eq!(table.state.phase(), SessionPhase::RematchPending);
        assert_eq!(*table.state.board(), concluded);
        assert_eq!(table.state.round(), 1);
        assert_eq!(table.state.wants_rematch(alice), Some(true));
        assert_eq!(drain(&mut table.alice_rx), vec![ServerMessage::RematchWaiting]);
        assert_eq!(
            drain(&mut table.bob_rx),
            vec![ServerMessage::RematchRequested {
                name: "alice".to_string()
            }]
        );

        table.state.request_rematch(bob).expect("round is over");

        assert_eq!(table.state.round(), 2);
        assert_eq!(table.state.opener(), Seat::Second);
        assert_eq!(table.state.current_turn(), Some(Turn::Human(bob)));
        assert_eq!(table.state.mark_of(bob), Some(Mark::X));
        assert_eq!(table.state.mark_of(alice), Some(Mark::O));
        assert_eq!(table.state.wants_rematch(alice), Some(false));
        assert_eq!(*table.state.board(), Board::new());
        assert_eq!(
            drain(&mut table.bob_rx)[0],
            ServerMessage::NewRound {
                mark: Mark::X,
                opening: Opening::You,
            }
        );
    }

    #[test]
    fn test_rematch_refused_during_play() {
        let mut table = human_table();
        assert_eq!(
            table.state.request_rematch(table.bob),
            Err(MoveRejection::InProgress)
        );
        assert!(table.state.is_active());
    }

    #[test]
    fn test_disconnect_abandons_then_retires() {
        let mut table = human_table();
        let (alice, bob) = (table.alice, table.bob);

        let effects = table.state.handle_disconnect(alice);

        assert!(!effects.retire);
        assert_eq!(table.state.phase(), SessionPhase::Abandoned);
        assert_eq!(
            drain(&mut table.bob_rx),
            vec![ServerMessage::OpponentLeft {
                name: "alice".to_string()
            }]
        );

        table.state.request_rematch(bob).expect("no round running");
        assert_eq!(drain(&mut table.bob_rx), vec![ServerMessage::OpponentGone]);
        assert_eq!(table.state.apply_move(bob, 0, 0), Err(MoveRejection::GameOver));

        assert!(table.state.handle_disconnect(bob).retire);
        assert_eq!(table.state.phase(), SessionPhase::Retired);
    }

    #[test]
    fn test_computer_opening_is_scheduled_then_applied() {
        let (human, mut rx) = Participant::channel("carol");
        let mut state = SessionState::against_computer("game-ai".to_string(), human, Seat::Second);

        let effects = state.start();

        assert_eq!(effects.computer_turn, Some(1));
        assert_eq!(state.current_turn(), Some(Turn::Computer));
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::MatchStart {
                    opponent: COMPUTER_NAME.to_string(),
                    mark: Mark::O,
                    opening: Opening::Opponent(COMPUTER_NAME.to_string()),
                },
                ServerMessage::Board(Board::new()),
                ServerMessage::ComputerThinking,
            ]
        );

        let effects = state.apply_computer_move(1);

        assert_eq!(effects, Effects::default());
        let board = *state.board();
        assert_eq!(board.get(Position::Center), Square::Occupied(Mark::X));
        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::Board(board),
                ServerMessage::ComputerPlayed {
                    position: Position::Center
                },
                ServerMessage::YourTurn { mark: Mark::O },
            ]
        );
    }

    #[test]
    fn test_stale_computer_turn_is_ignored() {
        let (human, _rx) = Participant::channel("carol");
        let mut state = SessionState::against_computer("game-ai".to_string(), human, Seat::Second);
        let _ = state.start();

        assert_eq!(state.apply_computer_move(7), Effects::default());
        assert_eq!(*state.board(), Board::new());

        let _ = state.handle_disconnect(*state.host.participant.id());
        assert_eq!(state.apply_computer_move(1), Effects::default());
        assert_eq!(*state.board(), Board::new());
    }

    #[test]
    fn test_computer_game_to_draw_then_rematch_swaps_opener() {
        let (human, mut rx) = Participant::channel("carol");
        let carol = *human.id();
        let mut state = SessionState::against_computer("game-ai".to_string(), human, Seat::First);
        let _ = state.start();

        // Computer replies: center, block (0, 2), block (1, 0), corner (2, 2).
        let replies = [
            ((0, 0), Position::Center),
            ((0, 1), Position::TopRight),
            ((2, 0), Position::MiddleLeft),
            ((1, 2), Position::BottomRight),
        ];
        for ((row, col), reply) in replies {
            let effects = state.apply_move(carol, row, col).expect("legal move");
            let round = effects.computer_turn.expect("computer to move");
            let _ = state.apply_computer_move(round);
            assert_eq!(state.board().get(reply), Square::Occupied(Mark::O));
        }
        state.apply_move(carol, 2, 1).expect("last square");

        assert_eq!(state.phase(), SessionPhase::Concluded(Outcome::Draw));
        let messages = drain(&mut rx);
        assert!(messages.contains(&ServerMessage::Result(RoundResult::Draw)));

        let effects = state.request_rematch(carol).expect("round is over");

        assert_eq!(effects.computer_turn, Some(2));
        assert_eq!(state.mark_of(carol), Some(Mark::O));
        assert_eq!(
            drain(&mut rx)[0],
            ServerMessage::NewRound {
                mark: Mark::O,
                opening: Opening::Opponent(COMPUTER_NAME.to_string()),
            }
        );
    }
}
