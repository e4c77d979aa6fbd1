use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::app::source::{GameSource, LookEvent, MoveOutcome, SourceEvents};

use super::wire::{
    result_is_ok, ActionKind, ActorDetail, ActorId, Direction, LookSnapshot, Request,
    ResponseEnvelope,
};

/// A request older than this is treated as lost; a response that still shows
/// up afterwards is dropped instead of applied.
pub(crate) const REQUEST_DEADLINE: Duration = Duration::from_millis(200);

/// How long an expired entry is kept around so its late response can be
/// matched and discarded without confusing newer requests for the action.
const CANCELLED_RETENTION: Duration = Duration::from_secs(2);

/// Unflushed bytes tolerated before the connection counts as stalled. A
/// server that accepts but never reads would otherwise grow the write queue
/// at frame rate.
const MAX_PENDING_WRITE_BYTES: usize = 1 << 20;

#[derive(Debug)]
enum SessionMode {
    Disabled,
    Connected(Conn),
}

#[derive(Debug)]
struct Conn {
    stream: TcpStream,
    read_buf: Vec<u8>,
    pending_writes: VecDeque<Vec<u8>>,
    write_offset: usize,
}

impl Conn {
    fn backlog_bytes(&self) -> usize {
        let queued: usize = self.pending_writes.iter().map(Vec::len).sum();
        queued.saturating_sub(self.write_offset)
    }
}

#[derive(Debug)]
struct PendingRequest {
    action: ActionKind,
    direction: Option<Direction>,
    deadline: Instant,
    cancelled: bool,
    cancelled_at: Option<Instant>,
}

/// Non-blocking session connection. Requests are serialized immediately and
/// tracked in a per-action FIFO; responses echo only the action name, so the
/// oldest pending entry for that action is the one a response settles.
#[derive(Debug)]
pub(crate) struct SessionClient {
    sid: String,
    mode: SessionMode,
    pending: VecDeque<PendingRequest>,
    latest_server_tick: Option<u64>,
    stale_responses_dropped: u64,
}

impl SessionClient {
    /// Connects to `addr`. A failed connection logs and leaves the client
    /// detached: every request then resolves as a timeout, so the game keeps
    /// running on fallback data.
    pub(crate) fn connect(addr: &str, sid: String) -> Self {
        let mode = match TcpStream::connect(addr) {
            Ok(stream) => match stream.set_nonblocking(true) {
                Ok(()) => {
                    if let Err(err) = stream.set_nodelay(true) {
                        warn!(error = %err, "session_nodelay_failed");
                    }
                    info!(addr, "session_connected");
                    SessionMode::Connected(Conn {
                        stream,
                        read_buf: Vec::new(),
                        pending_writes: VecDeque::new(),
                        write_offset: 0,
                    })
                }
                Err(err) => {
                    warn!(addr, error = %err, "session_nonblocking_failed_detached");
                    SessionMode::Disabled
                }
            },
            Err(err) => {
                warn!(addr, error = %err, "session_connect_failed_detached");
                SessionMode::Disabled
            }
        };

        Self {
            sid,
            mode,
            pending: VecDeque::new(),
            latest_server_tick: None,
            stale_responses_dropped: 0,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        matches!(self.mode, SessionMode::Connected(_))
    }

    #[cfg(test)]
    pub(crate) fn stale_responses_dropped(&self) -> u64 {
        self.stale_responses_dropped
    }

    fn enqueue(&mut self, request: &Request, now: Instant) {
        let direction = match request {
            Request::Move { direction, .. } => Some(*direction),
            _ => None,
        };
        // Detached entries expire on the next poll so callers still see a
        // timeout resolution for every request they issued.
        let deadline = match self.mode {
            SessionMode::Connected(_) => now + REQUEST_DEADLINE,
            SessionMode::Disabled => now,
        };
        self.pending.push_back(PendingRequest {
            action: request.action(),
            direction,
            deadline,
            cancelled: false,
            cancelled_at: None,
        });

        if let SessionMode::Connected(conn) = &mut self.mode {
            match serde_json::to_vec(request) {
                Ok(mut bytes) => {
                    bytes.push(b'\n');
                    conn.pending_writes.push_back(bytes);
                    match flush_writes(conn) {
                        Ok(()) if conn.backlog_bytes() > MAX_PENDING_WRITE_BYTES => {
                            warn!(
                                backlog_bytes = conn.backlog_bytes(),
                                "session_write_backlog_detached"
                            );
                            self.mode = SessionMode::Disabled;
                        }
                        Ok(()) => {}
                        Err(err) => {
                            warn!(error = %err, "session_write_failed_detached");
                            self.mode = SessionMode::Disabled;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "session_request_encode_failed");
                }
            }
        }
    }

    fn dispatch_line(&mut self, line: &str, events: &mut SourceEvents) {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "session_invalid_json_line_dropped");
                return;
            }
        };
        let envelope: ResponseEnvelope = match serde_path_to_error::deserialize(&value) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(path = %err.path(), error = %err, "session_malformed_envelope_dropped");
                return;
            }
        };

        let Some(action_name) = envelope.action.as_deref() else {
            if let Some(tick) = envelope.tick {
                self.latest_server_tick = Some(tick);
            } else {
                debug!(line, "session_unsolicited_line_ignored");
            }
            return;
        };
        let Some(action) = ActionKind::from_wire(action_name) else {
            warn!(action = action_name, "session_unknown_action_dropped");
            return;
        };
        let Some(entry) = self.take_oldest_pending(action) else {
            self.stale_responses_dropped += 1;
            debug!(action = action_name, "session_unmatched_response_dropped");
            return;
        };
        if entry.cancelled {
            self.stale_responses_dropped += 1;
            debug!(action = action_name, "session_stale_response_dropped");
            return;
        }

        let result_ok = result_is_ok(envelope.result.as_deref());
        match action {
            ActionKind::Look => {
                if !result_ok {
                    warn!(result = ?envelope.result, "look_rejected");
                    events.look.get_or_insert(LookEvent::Fallback);
                    return;
                }
                match serde_path_to_error::deserialize::<_, LookSnapshot>(&value) {
                    Ok(snapshot) => events.look = Some(LookEvent::Fresh(snapshot)),
                    Err(err) => {
                        warn!(path = %err.path(), error = %err, "look_payload_malformed");
                        events.look.get_or_insert(LookEvent::Fallback);
                    }
                }
            }
            ActionKind::Move => {
                let Some(direction) = entry.direction else {
                    warn!("move_response_without_direction");
                    return;
                };
                let outcome = if result_ok {
                    MoveOutcome::Accepted
                } else {
                    MoveOutcome::Rejected(envelope.result.unwrap_or_default())
                };
                events.move_results.push((direction, outcome));
            }
            ActionKind::Examine => {
                if !result_ok {
                    debug!(result = ?envelope.result, "examine_rejected");
                    return;
                }
                match serde_path_to_error::deserialize::<_, ActorDetail>(&value) {
                    Ok(detail) => events.examined = Some(detail),
                    Err(err) => {
                        warn!(path = %err.path(), error = %err, "examine_payload_malformed");
                    }
                }
            }
            ActionKind::GetDictionary => {
                if !result_ok {
                    warn!(result = ?envelope.result, "dictionary_rejected");
                    return;
                }
                match serde_path_to_error::deserialize::<_, super::wire::DictionaryPayload>(&value)
                {
                    Ok(payload) => events.dictionary = Some(payload.dictionary),
                    Err(err) => {
                        warn!(path = %err.path(), error = %err, "dictionary_payload_malformed");
                    }
                }
            }
        }
    }

    fn take_oldest_pending(&mut self, action: ActionKind) -> Option<PendingRequest> {
        let index = self
            .pending
            .iter()
            .position(|entry| entry.action == action)?;
        self.pending.remove(index)
    }

    fn expire_pending(&mut self, now: Instant, events: &mut SourceEvents) {
        for entry in self.pending.iter_mut() {
            if entry.cancelled || entry.deadline > now {
                continue;
            }
            entry.cancelled = true;
            entry.cancelled_at = Some(now);
            match entry.action {
                ActionKind::Look => {
                    debug!("look_request_timed_out");
                    events.look.get_or_insert(LookEvent::Fallback);
                }
                ActionKind::Move => {
                    if let Some(direction) = entry.direction {
                        debug!(direction = direction.as_str(), "move_request_timed_out");
                        events.move_results.push((direction, MoveOutcome::TimedOut));
                    }
                }
                ActionKind::Examine => {
                    debug!("examine_request_timed_out");
                }
                ActionKind::GetDictionary => {
                    warn!("dictionary_request_timed_out");
                }
            }
        }
    }

    fn prune_cancelled(&mut self, now: Instant) {
        self.pending.retain(|entry| match entry.cancelled_at {
            Some(cancelled_at) => now.saturating_duration_since(cancelled_at) < CANCELLED_RETENTION,
            None => true,
        });
    }
}

impl GameSource for SessionClient {
    fn request_dictionary(&mut self, now: Instant) {
        self.enqueue(&Request::GetDictionary, now);
    }

    fn request_look(&mut self, now: Instant) {
        self.enqueue(
            &Request::Look {
                sid: self.sid.clone(),
            },
            now,
        );
    }

    fn send_move(&mut self, direction: Direction, tick: u64, now: Instant) {
        self.enqueue(
            &Request::Move {
                sid: self.sid.clone(),
                direction,
                tick,
            },
            now,
        );
    }

    fn request_examine(&mut self, id: ActorId, now: Instant) {
        self.enqueue(
            &Request::Examine {
                sid: self.sid.clone(),
                id,
            },
            now,
        );
    }

    fn poll(&mut self, now: Instant) -> SourceEvents {
        let mut events = SourceEvents::default();

        let mut lines = Vec::new();
        if let SessionMode::Connected(conn) = &mut self.mode {
            let io_result = flush_writes(conn).and_then(|()| read_lines(conn, &mut lines));
            if let Err(err) = io_result {
                warn!(error = %err, "session_io_failed_detached");
                self.mode = SessionMode::Disabled;
            }
        }

        for line in &lines {
            self.dispatch_line(line, &mut events);
        }
        self.expire_pending(now, &mut events);
        self.prune_cancelled(now);

        events
    }

    fn server_tick(&self) -> Option<u64> {
        self.latest_server_tick
    }
}

fn flush_writes(conn: &mut Conn) -> io::Result<()> {
    while let Some(chunk) = conn.pending_writes.front() {
        let remaining = &chunk[conn.write_offset..];
        match conn.stream.write(remaining) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "session_write_zero",
                ));
            }
            Ok(bytes_written) => {
                conn.write_offset = conn.write_offset.saturating_add(bytes_written);
                if conn.write_offset >= chunk.len() {
                    conn.pending_writes.pop_front();
                    conn.write_offset = 0;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn read_lines(conn: &mut Conn, out: &mut Vec<String>) -> io::Result<()> {
    let mut chunk = [0u8; 1024];
    loop {
        match conn.stream.read(&mut chunk) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "session_closed_by_server",
                ));
            }
            Ok(bytes_read) => {
                conn.read_buf.extend_from_slice(&chunk[..bytes_read]);
                drain_complete_lines(&mut conn.read_buf, out);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(()),
            Err(err) => return Err(err),
        }
    }
}

fn drain_complete_lines(buffer: &mut Vec<u8>, out: &mut Vec<String>) {
    while let Some(newline_index) = buffer.iter().position(|byte| *byte == b'\n') {
        let mut line_bytes = buffer.drain(..=newline_index).collect::<Vec<u8>>();
        line_bytes.pop(); // newline
        if line_bytes.last().copied() == Some(b'\r') {
            line_bytes.pop();
        }

        match String::from_utf8(line_bytes) {
            Ok(line) => out.push(line),
            Err(err) => warn!(error = %err, "session_invalid_utf8_line_dropped"),
        }
    }
}
