mod fixture;

use std::time::Instant;

pub(crate) use fixture::FixtureSource;

use super::session::wire::{ActorDetail, ActorId, Dictionary, Direction, LookSnapshot};

/// Outcome of one `look` request. A request that timed out, was rejected, or
/// came back malformed resolves to `Fallback`: callers keep rendering from
/// the last good snapshot instead of stalling.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LookEvent {
    Fresh(LookSnapshot),
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MoveOutcome {
    Accepted,
    Rejected(String),
    TimedOut,
}

/// Everything a source resolved during one poll.
#[derive(Debug, Default)]
pub(crate) struct SourceEvents {
    pub(crate) look: Option<LookEvent>,
    pub(crate) move_results: Vec<(Direction, MoveOutcome)>,
    pub(crate) examined: Option<ActorDetail>,
    pub(crate) dictionary: Option<Dictionary>,
}

/// Seam between the scene and where its world state comes from: either a
/// live session over TCP or the built-in offline fixture. Requests are
/// fire-and-forget; results surface later through `poll`.
pub(crate) trait GameSource {
    fn request_dictionary(&mut self, now: Instant);

    fn request_look(&mut self, now: Instant);

    fn send_move(&mut self, direction: Direction, tick: u64, now: Instant);

    fn request_examine(&mut self, id: ActorId, now: Instant);

    fn poll(&mut self, now: Instant) -> SourceEvents;

    /// Most recent tick broadcast by the server, if any has been seen.
    fn server_tick(&self) -> Option<u64>;
}
