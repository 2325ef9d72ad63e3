//! Persistent session with the Lutron lighting processor
//!
//! The processor only pushes levels on change, so the relay keeps one
//! telnet connection open for its whole life: connect, answer the login
//! prompt, then read unsolicited `~OUTPUT,<address>,<level>` lines forever.
//! Anything that breaks the stream drops the session back to Disconnected
//! and a fresh connect is attempted after a fixed delay. The loop has no
//! exit; process shutdown is the only stop.

use crate::config::LightingConfig;
use crate::directory::LightKind;
use crate::error::{RelayError, Result};
use crate::state::StateCache;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, trace, warn};

const LOGIN_PROMPT: &str = "login:";
const ACK_PROMPT: &str = "GNET>";
const OUTPUT_MARKER: &str = "~OUTPUT,";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Disconnected,
    Authenticating,
    Streaming,
}

/// Owner of the lighting controller connection
pub struct LightingSession {
    config: LightingConfig,
    cache: Arc<StateCache>,
    kinds: HashMap<u32, LightKind>,
    state: SessionState,
}

impl LightingSession {
    /// `kinds` is the address->kind map snapshotted from the directory at
    /// startup; the directory is immutable for the process lifetime, so a
    /// one-time snapshot is enough. Addresses missing from the map are
    /// treated as dimmers.
    pub fn new(
        config: LightingConfig,
        cache: Arc<StateCache>,
        kinds: HashMap<u32, LightKind>,
    ) -> Self {
        Self {
            config,
            cache,
            kinds,
            state: SessionState::Disconnected,
        }
    }

    /// Reconnect loop; never returns
    pub async fn run(mut self) {
        loop {
            match self.connect_and_stream().await {
                Ok(()) => info!("lighting controller closed the connection"),
                Err(e) => warn!("lighting session failed: {e}"),
            }
            self.transition(SessionState::Disconnected);
            debug!(
                "reconnecting to lighting controller in {:?}",
                self.config.reconnect_delay
            );
            sleep(self.config.reconnect_delay).await;
        }
    }

    async fn connect_and_stream(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| RelayError::connection(format!("connect {addr}: {e}")))?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        self.transition(SessionState::Authenticating);
        timeout(self.config.handshake_timeout, async {
            read_until_pattern(&mut reader, LOGIN_PROMPT).await?;
            write_half
                .write_all(format!("{}\r\n", self.config.password).as_bytes())
                .await
                .map_err(|e| RelayError::connection(format!("login write: {e}")))?;
            read_until_pattern(&mut reader, ACK_PROMPT).await
        })
        .await
        .map_err(|_| RelayError::connection(format!("handshake with {addr} timed out")))??;

        info!("lighting session established with {addr}");
        self.transition(SessionState::Streaming);

        let mut line = String::new();
        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .await
                .map_err(|e| RelayError::connection(format!("stream read: {e}")))?;
            if n == 0 {
                return Ok(());
            }
            self.handle_line(line.trim()).await;
        }
    }

    fn transition(&mut self, next: SessionState) {
        trace!("lighting session {:?} -> {next:?}", self.state);
        self.state = next;
    }

    async fn handle_line(&self, line: &str) {
        match parse_output_line(line) {
            Some((address, level)) => {
                let level = normalize_level(self.kinds.get(&address).copied(), level);
                debug!("output update: address {address} -> {level}");
                self.cache.set_light_status(address, level).await;
            }
            // The processor also echoes prompts, command responses and
            // monitoring chatter; everything but output updates is noise.
            None => trace!("ignoring line: {line:?}"),
        }
    }
}

/// Parse an unsolicited output update line.
///
/// Levels arrive as fixed-point decimals (`75.00`); they round to the
/// nearest integer and clamp to 0..=100.
fn parse_output_line(line: &str) -> Option<(u32, u8)> {
    let rest = line.strip_prefix(OUTPUT_MARKER)?;
    let mut parts = rest.split(',');
    let address = parts.next()?.trim().parse::<u32>().ok()?;
    let level = parts.next()?.trim().parse::<f64>().ok()?;
    if !level.is_finite() {
        return None;
    }
    Some((address, level.round().clamp(0.0, 100.0) as u8))
}

/// Switches report binary state; any nonzero level reads as fully on
fn normalize_level(kind: Option<LightKind>, level: u8) -> u8 {
    match kind {
        Some(LightKind::Switch) if level > 0 => 100,
        _ => level,
    }
}

/// Consume bytes until `pattern` has been seen.
///
/// Prompts are not newline-terminated, so the handshake scans the raw byte
/// stream instead of reading lines.
async fn read_until_pattern<R>(reader: &mut R, pattern: &str) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let pattern = pattern.as_bytes();
    let mut window: Vec<u8> = Vec::with_capacity(pattern.len());
    loop {
        let byte = reader
            .read_u8()
            .await
            .map_err(|e| RelayError::connection(format!("handshake read: {e}")))?;
        window.push(byte);
        if window.len() > pattern.len() {
            window.remove(0);
        }
        if window == pattern {
            return Ok(());
        }
    }
}
