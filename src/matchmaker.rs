//! Pairs waiting humans and spins up computer matches.
//!
//! The waiting queue and the session registry sit behind one lock, so a
//! connection can never be paired twice and a session cannot be retired
//! while a pairing is in flight.

use crate::participant::{Participant, ParticipantId};
use crate::session::{Seat, SessionHandle, SessionId, SessionState, SessionTask};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

/// Result of asking for a human opponent.
#[derive(Debug)]
pub enum HumanMatch {
    /// Someone was already waiting; the session is running.
    Matched(SessionHandle),
    /// Queued; the handle arrives once another human shows up.
    Pending(oneshot::Receiver<SessionHandle>),
}

#[derive(Debug)]
struct WaitingPlayer {
    participant: Participant,
    paired: oneshot::Sender<SessionHandle>,
}

#[derive(Debug, Default)]
struct Registry {
    waiting: VecDeque<WaitingPlayer>,
    sessions: HashMap<SessionId, SessionHandle>,
}

/// Process-wide matchmaking service.
#[derive(Debug, Clone)]
pub struct Matchmaker {
    registry: Arc<Mutex<Registry>>,
    computer_delay: Duration,
}

impl Matchmaker {
    /// Creates a matchmaker whose computer opponents wait `computer_delay`
    /// before each move.
    #[instrument]
    pub fn new(computer_delay: Duration) -> Self {
        info!("Creating matchmaker");
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            computer_delay,
        }
    }

    /// Starts a match against the computer; a coin flip picks the opener.
    pub fn request_ai_match(&self, participant: Participant) -> SessionHandle {
        self.request_ai_match_with(participant, random_opener())
    }

    /// Starts a match against the computer with a fixed opener.
    #[instrument(skip(self, participant), fields(participant = %participant.id()))]
    pub fn request_ai_match_with(&self, participant: Participant, opener: Seat) -> SessionHandle {
        let mut registry = self.registry();
        let id = next_session_id();
        info!(session_id = %id, name = %participant.name(), "Starting computer match");
        let state = SessionState::against_computer(id, participant, opener);
        self.launch(&mut registry, state)
    }

    /// Pairs with the longest-waiting human, or joins the queue.
    pub fn request_human_match(&self, participant: Participant) -> HumanMatch {
        self.request_human_match_with(participant, random_opener())
    }

    /// Same as [`Matchmaker::request_human_match`] with a fixed opener.
    ///
    /// [`Seat::First`] is the player who was already waiting.
    #[instrument(skip(self, participant), fields(participant = %participant.id()))]
    pub fn request_human_match_with(&self, participant: Participant, opener: Seat) -> HumanMatch {
        let mut registry = self.registry();

        while let Some(waiting) = registry.waiting.pop_front() {
            if waiting.paired.is_closed() {
                debug!(skipped = %waiting.participant.id(), "Skipping departed queue entry");
                continue;
            }
            let waiting_id = *waiting.participant.id();
            let id = next_session_id();
            info!(
                session_id = %id,
                first = %waiting.participant.name(),
                second = %participant.name(),
                "Pairing human players"
            );
            let state = SessionState::between_humans(id, waiting.participant, participant, opener);
            let handle = self.launch(&mut registry, state);
            if waiting.paired.send(handle.clone()).is_err() {
                warn!(participant = %waiting_id, "Queued player left while being paired");
                handle.disconnect(waiting_id);
            }
            return HumanMatch::Matched(handle);
        }

        let (paired, pending) = oneshot::channel();
        info!(name = %participant.name(), "Queued for a human opponent");
        registry.waiting.push_back(WaitingPlayer {
            participant,
            paired,
        });
        HumanMatch::Pending(pending)
    }

    /// Drops a participant from the queue. Returns `false` if it was not
    /// queued, e.g. because it was paired already.
    #[instrument(skip(self))]
    pub fn remove_from_queue(&self, participant: ParticipantId) -> bool {
        let mut registry = self.registry();
        let before = registry.waiting.len();
        registry
            .waiting
            .retain(|waiting| *waiting.participant.id() != participant);
        let removed = registry.waiting.len() < before;
        if removed {
            info!("Left the matchmaking queue");
        }
        removed
    }

    /// Removes a session from the registry. Returns `false` if unknown.
    #[instrument(skip(self))]
    pub fn retire_session(&self, id: &str) -> bool {
        let removed = self.registry().sessions.remove(id).is_some();
        if removed {
            info!("Session retired");
        } else {
            debug!("Session was not registered");
        }
        removed
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry().sessions.len()
    }

    /// Number of queued humans, including entries whose connection is gone.
    pub fn queue_len(&self) -> usize {
        self.registry().waiting.len()
    }

    /// Handle for a live session.
    pub fn session(&self, id: &str) -> Option<SessionHandle> {
        self.registry().sessions.get(id).cloned()
    }

    fn launch(&self, registry: &mut Registry, state: SessionState) -> SessionHandle {
        let (task, handle) = SessionTask::new(state, self.computer_delay);
        registry.sessions.insert(handle.id().clone(), handle.clone());
        let matchmaker = self.clone();
        tokio::spawn(async move {
            let id = task.run().await;
            matchmaker.retire_session(&id);
        });
        handle
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn random_opener() -> Seat {
    if rand::random::<bool>() {
        Seat::First
    } else {
        Seat::Second
    }
}

/// Builds ids of the form `game-<unix-millis>-<sequence>`.
fn next_session_id() -> SessionId {
    static SEQUENCE: AtomicU64 = AtomicU64::new(1);
    format!(
        "game-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        SEQUENCE.fetch_add(1, Ordering::Relaxed)
    )
}
