//! Per-connection worker: handshake, queueing, and forwarding commands to
//! the session.

use crate::matchmaker::{HumanMatch, Matchmaker};
use crate::participant::{Participant, ParticipantId};
use crate::protocol::{ClientCommand, ModeChoice, ServerMessage};
use crate::session::SessionHandle;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Split};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

/// Where a connection stands with the matchmaker.
#[derive(Debug)]
enum Link {
    AwaitingChoice,
    Queued(oneshot::Receiver<SessionHandle>),
    Matched(SessionHandle),
}

enum Event {
    Line(std::io::Result<Option<Vec<u8>>>),
    Paired(Option<SessionHandle>),
}

struct ConnectionHandler<R> {
    participant: Participant,
    lines: Split<BufReader<R>>,
    matchmaker: Matchmaker,
    link: Link,
}

/// Serves one client until it quits or the transport fails.
///
/// Transport failure is treated as an implicit `QUIT`: the participant leaves
/// the queue or its session, and nothing is surfaced to the caller.
#[instrument(skip(stream, matchmaker))]
pub async fn handle_connection<S>(stream: S, peer: SocketAddr, matchmaker: Matchmaker)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (participant, outbound) = Participant::channel(format!("Player-{peer}"));
    let id = *participant.id();
    info!(participant = %id, "Client connected");

    let (shutdown, shutdown_rx) = oneshot::channel();
    let writer_task = tokio::spawn(write_messages(writer, outbound, shutdown_rx, id));

    let mut handler = ConnectionHandler {
        participant,
        lines: BufReader::new(reader).split(b'\n'),
        matchmaker,
        link: Link::AwaitingChoice,
    };
    handler.run().await;
    handler.leave();

    let _ = shutdown.send(());
    if let Err(e) = writer_task.await {
        warn!(participant = %id, error = %e, "Writer task failed");
    }
    info!(participant = %id, "Client disconnected");
}

impl<R> ConnectionHandler<R>
where
    R: AsyncRead + Unpin,
{
    async fn run(&mut self) {
        self.send(ServerMessage::Welcome);
        self.send(ServerMessage::ChooseMode);

        loop {
            let event = match &mut self.link {
                Link::Queued(pending) => tokio::select! {
                    paired = pending => Event::Paired(paired.ok()),
                    line = self.lines.next_segment() => Event::Line(line),
                },
                _ => Event::Line(self.lines.next_segment().await),
            };

            match event {
                Event::Paired(Some(handle)) => {
                    info!(session_id = %handle.id(), "Paired with a human opponent");
                    self.link = Link::Matched(handle);
                }
                Event::Paired(None) => {
                    warn!("Matchmaker dropped the queue entry");
                    self.link = Link::AwaitingChoice;
                    self.send(ServerMessage::ChooseMode);
                }
                Event::Line(Ok(Some(bytes))) => {
                    // Undecodable bytes become U+FFFD and fall through to UNKNOWN.
                    let line = String::from_utf8_lossy(&bytes);
                    if self.handle_line(&line).is_break() {
                        break;
                    }
                }
                Event::Line(Ok(None)) => {
                    info!("Connection closed by peer");
                    break;
                }
                Event::Line(Err(e)) => {
                    warn!(error = %e, "Read failed, treating as quit");
                    break;
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) -> ControlFlow<()> {
        debug!(line, "Received");
        let command = ClientCommand::parse(line);
        if command == ClientCommand::Quit {
            info!("Client quit");
            self.send(ServerMessage::Goodbye);
            return ControlFlow::Break(());
        }
        if matches!(self.link, Link::AwaitingChoice) {
            self.choose(line);
            return ControlFlow::Continue(());
        }

        match (&self.link, command) {
            (Link::Matched(session), ClientCommand::Move { row, col }) => {
                session.play(self.id(), row, col);
            }
            (Link::Matched(session), ClientCommand::Replay) => session.rematch(self.id()),
            (Link::Matched(_), _) => self.send(ServerMessage::Unrecognized),
            _ => self.send(ServerMessage::StillSearching),
        }
        ControlFlow::Continue(())
    }

    fn choose(&mut self, line: &str) {
        match ModeChoice::parse(line) {
            Some(ModeChoice::Computer) => {
                self.send(ServerMessage::ComputerSelected);
                let handle = self.matchmaker.request_ai_match(self.participant.clone());
                self.link = Link::Matched(handle);
            }
            Some(ModeChoice::Human) => {
                self.send(ServerMessage::Searching);
                self.link = match self.matchmaker.request_human_match(self.participant.clone()) {
                    HumanMatch::Matched(handle) => Link::Matched(handle),
                    HumanMatch::Pending(pending) => Link::Queued(pending),
                };
            }
            None => {
                debug!(line, "Unknown mode choice");
                self.send(ServerMessage::UnknownChoice);
            }
        }
    }
}

impl<R> ConnectionHandler<R> {
    fn id(&self) -> ParticipantId {
        *self.participant.id()
    }

    fn send(&self, message: ServerMessage) {
        self.participant.send(message);
    }

    /// Detaches from the queue or session.
    fn leave(&mut self) {
        let id = self.id();
        match std::mem::replace(&mut self.link, Link::AwaitingChoice) {
            Link::AwaitingChoice => {}
            Link::Queued(mut pending) => {
                if !self.matchmaker.remove_from_queue(id) {
                    // Paired while we were leaving; the handle is already here.
                    if let Ok(handle) = pending.try_recv() {
                        handle.disconnect(id);
                    }
                }
            }
            Link::Matched(session) => session.disconnect(id),
        }
    }
}

/// Drains the outbound queue onto the socket, one flush per message.
///
/// On shutdown, messages already queued are still written before the write
/// half is closed.
async fn write_messages<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    mut shutdown: oneshot::Receiver<()>,
    participant: ParticipantId,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let message = tokio::select! {
            biased;
            message = outbound.recv() => message,
            _ = &mut shutdown => {
                outbound.close();
                while let Ok(message) = outbound.try_recv() {
                    if write_message(&mut writer, &message, participant).await.is_err() {
                        break;
                    }
                }
                None
            }
        };
        let Some(message) = message else {
            break;
        };
        if let Err(e) = write_message(&mut writer, &message, participant).await {
            debug!(%participant, error = %e, "Write failed");
            break;
        }
    }
    if let Err(e) = writer.shutdown().await {
        debug!(%participant, error = %e, "Socket shutdown failed");
    }
}

async fn write_message<W>(
    writer: &mut W,
    message: &ServerMessage,
    participant: ParticipantId,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match message.kind() {
        Some(kind) => debug!(%participant, %kind, "Sending"),
        None => trace!(%participant, "Sending board"),
    }
    writer.write_all(message.encode().as_bytes()).await?;
    writer.flush().await
}
