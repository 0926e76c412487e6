//! Shared helpers for the TCP integration tests.

#![allow(dead_code)]

use morpion_server::{GameServer, Matchmaker, MessageKind, MessageReader, ServerConfig, ServerLine};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Loopback config on an ephemeral port with a short computer delay.
pub fn test_config() -> ServerConfig {
    ServerConfig::default()
        .with_host("127.0.0.1")
        .with_port(0)
        .with_ai_delay_ms(20)
}

/// Starts a server with [`test_config`].
pub async fn start_server() -> (SocketAddr, Matchmaker) {
    start_server_with(test_config()).await
}

/// Starts a server with the given config and returns its address.
pub async fn start_server_with(config: ServerConfig) -> (SocketAddr, Matchmaker) {
    let server = GameServer::bind(&config).await.expect("bind loopback");
    let addr = server.local_addr().expect("local address");
    let matchmaker = server.matchmaker().clone();
    tokio::spawn(server.run());
    (addr, matchmaker)
}

/// A line-protocol client decoding replies with [`MessageReader`].
pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    reader: MessageReader,
}

impl Client {
    /// Connects and consumes the greeting and mode prompt.
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        let mut client = Self {
            lines: BufReader::new(read_half).lines(),
            writer,
            reader: MessageReader::new(),
        };
        client.expect(MessageKind::Welcome).await;
        client.expect(MessageKind::Choose).await;
        client
    }

    /// Sends one command line.
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("send line");
    }

    /// Sends raw bytes, newline included by the caller.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("send bytes");
    }

    /// Next decoded line or board block; `None` once the server closed.
    pub async fn try_next(&mut self) -> Option<ServerLine> {
        loop {
            let line = timeout(STEP_TIMEOUT, self.lines.next_line())
                .await
                .expect("server replied in time")
                .expect("read line")?;
            if let Some(decoded) = self.reader.feed(&line).expect("well-formed server line") {
                return Some(decoded);
            }
        }
    }

    /// Next decoded line or board block.
    pub async fn next(&mut self) -> ServerLine {
        self.try_next().await.expect("connection still open")
    }

    /// Next line, which must carry `kind`. Returns its text.
    pub async fn expect(&mut self, kind: MessageKind) -> String {
        match self.next().await {
            ServerLine::Message { kind: got, text } if got == kind => text,
            other => panic!("expected {kind}, got {other:?}"),
        }
    }

    /// Next item, which must be a board block.
    pub async fn expect_board(&mut self) -> morpion_server::Board {
        match self.next().await {
            ServerLine::Board(board) => board,
            other => panic!("expected board, got {other:?}"),
        }
    }

    /// Skips ahead to the next line carrying `kind`. Returns its text.
    pub async fn skip_to(&mut self, kind: MessageKind) -> String {
        loop {
            if let ServerLine::Message { kind: got, text } = self.next().await {
                if got == kind {
                    return text;
                }
            }
        }
    }

    /// Reads the round opening (START, board, TURN or WAITING). Returns
    /// true if this client moves first.
    pub async fn read_opening(&mut self) -> bool {
        self.expect(MessageKind::Start).await;
        let board = self.expect_board().await;
        assert_eq!(board, morpion_server::Board::new());
        match self.next().await {
            ServerLine::Message {
                kind: MessageKind::Turn,
                ..
            } => true,
            ServerLine::Message {
                kind: MessageKind::Waiting,
                ..
            } => false,
            other => panic!("expected turn indicator, got {other:?}"),
        }
    }
}

/// Connects two clients through `WAIT` and returns `(opener, other)`.
pub async fn paired_clients(addr: SocketAddr) -> (Client, Client) {
    let mut first = Client::connect(addr).await;
    first.send("WAIT").await;
    first.expect(MessageKind::Queued).await;

    let mut second = Client::connect(addr).await;
    second.send("wait").await;
    second.expect(MessageKind::Queued).await;

    let first_opens = first.read_opening().await;
    let second_opens = second.read_opening().await;
    assert_ne!(first_opens, second_opens, "exactly one player opens");
    if first_opens {
        (first, second)
    } else {
        (second, first)
    }
}
