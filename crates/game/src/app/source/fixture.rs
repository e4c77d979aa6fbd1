use std::time::Instant;

use tracing::{info, warn};

use crate::app::session::wire::{
    ActorDetail, ActorId, ActorSnapshot, Dictionary, Direction, LookSnapshot,
};

use super::{GameSource, LookEvent, MoveOutcome, SourceEvents};

/// Offline world used when no session address is configured. Small enough to
/// walk across in a few keypresses, with walls to bump into.
const FIXTURE_JSON: &str = r##"{
    "x": 4.0,
    "y": 2.0,
    "map": [
        ["#", "#", "#", "#", "#", "#"],
        ["#", ".", ".", ".", ".", "#"],
        ["#", ".", ".", ".", ".", "#"],
        ["#", "#", "#", "#", "#", "#"]
    ],
    "actors": [
        {"id": 1, "type": "player", "x": 4.0, "y": 2.0},
        {"id": 2, "type": "rat", "x": 2.0, "y": 1.0}
    ]
}"##;

/// In-process stand-in for the live session. Moves resolve against the
/// fixture map immediately, and every poll advances a local tick so the
/// scene exercises the same tick plumbing it uses against a real server.
pub(crate) struct FixtureSource {
    player_id: ActorId,
    player_x: f32,
    player_y: f32,
    map: Vec<Vec<char>>,
    actors: Vec<ActorSnapshot>,
    tick: u64,
    look_requested: bool,
    dictionary_requested: bool,
    examine_requested: Option<ActorId>,
    pending_moves: Vec<(Direction, MoveOutcome)>,
}

impl FixtureSource {
    pub(crate) fn new() -> Self {
        let deserializer = &mut serde_json::Deserializer::from_str(FIXTURE_JSON);
        let snapshot: LookSnapshot = match serde_path_to_error::deserialize(deserializer) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                // The fixture is compiled in, so a parse failure is a bug;
                // fall back to an empty world rather than crashing.
                warn!(path = %err.path(), error = %err, "fixture_parse_failed_using_empty_world");
                LookSnapshot {
                    x: 0.0,
                    y: 0.0,
                    map: Vec::new(),
                    actors: Vec::new(),
                }
            }
        };

        info!("fixture_source_active");
        Self {
            player_id: ActorId(1),
            player_x: snapshot.x,
            player_y: snapshot.y,
            map: snapshot.map,
            actors: snapshot.actors,
            tick: 0,
            look_requested: false,
            dictionary_requested: false,
            examine_requested: None,
            pending_moves: Vec::new(),
        }
    }

    fn cell_at(&self, x: f32, y: f32) -> Option<char> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let row = self.map.get(y as usize)?;
        row.get(x as usize).copied()
    }

    fn snapshot(&self) -> LookSnapshot {
        LookSnapshot {
            x: self.player_x,
            y: self.player_y,
            map: self.map.clone(),
            actors: self.actors.clone(),
        }
    }
}

impl GameSource for FixtureSource {
    fn request_dictionary(&mut self, _now: Instant) {
        self.dictionary_requested = true;
    }

    fn request_look(&mut self, _now: Instant) {
        self.look_requested = true;
    }

    fn send_move(&mut self, direction: Direction, _tick: u64, _now: Instant) {
        let (target_x, target_y) = match direction {
            Direction::North => (self.player_x, self.player_y - 1.0),
            Direction::South => (self.player_x, self.player_y + 1.0),
            Direction::West => (self.player_x - 1.0, self.player_y),
            Direction::East => (self.player_x + 1.0, self.player_y),
        };

        let outcome = match self.cell_at(target_x, target_y) {
            Some(cell) if cell != '#' => {
                self.player_x = target_x;
                self.player_y = target_y;
                let player_id = self.player_id;
                if let Some(actor) = self.actors.iter_mut().find(|actor| actor.id == player_id) {
                    actor.x = target_x;
                    actor.y = target_y;
                }
                MoveOutcome::Accepted
            }
            _ => MoveOutcome::Rejected("badMove".to_string()),
        };
        self.pending_moves.push((direction, outcome));
    }

    fn request_examine(&mut self, id: ActorId, _now: Instant) {
        self.examine_requested = Some(id);
    }

    fn poll(&mut self, _now: Instant) -> SourceEvents {
        self.tick = self.tick.wrapping_add(1);

        let mut events = SourceEvents::default();
        if self.dictionary_requested {
            self.dictionary_requested = false;
            let mut dictionary = Dictionary::new();
            dictionary.insert('.', "grass".to_string());
            dictionary.insert('#', "wall".to_string());
            events.dictionary = Some(dictionary);
        }
        if self.look_requested {
            self.look_requested = false;
            events.look = Some(LookEvent::Fresh(self.snapshot()));
        }
        if let Some(id) = self.examine_requested.take() {
            events.examined = self
                .actors
                .iter()
                .find(|actor| actor.id == id)
                .map(|actor| ActorDetail {
                    id: actor.id,
                    kind: actor.kind.clone(),
                    login: None,
                    x: actor.x,
                    y: actor.y,
                });
        }
        events.move_results = std::mem::take(&mut self.pending_moves);
        events
    }

    fn server_tick(&self) -> Option<u64> {
        Some(self.tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn look_resolves_fixture_snapshot() {
        let mut source = FixtureSource::new();
        source.request_look(now());
        let events = source.poll(now());

        match events.look {
            Some(LookEvent::Fresh(snapshot)) => {
                assert_eq!(snapshot.map.len(), 4);
                assert_eq!(snapshot.actors.len(), 2);
                assert!((snapshot.x - 4.0).abs() < 0.0001);
            }
            other => panic!("expected fresh look, got {other:?}"),
        }
    }

    #[test]
    fn move_into_wall_is_rejected() {
        let mut source = FixtureSource::new();
        source.send_move(Direction::South, 0, now());
        let events = source.poll(now());

        assert_eq!(
            events.move_results,
            vec![(
                Direction::South,
                MoveOutcome::Rejected("badMove".to_string())
            )]
        );
    }

    #[test]
    fn accepted_move_updates_player_and_actor() {
        let mut source = FixtureSource::new();
        source.send_move(Direction::West, 0, now());
        let events = source.poll(now());
        assert_eq!(events.move_results, vec![(Direction::West, MoveOutcome::Accepted)]);

        source.request_look(now());
        let events = source.poll(now());
        match events.look {
            Some(LookEvent::Fresh(snapshot)) => {
                assert!((snapshot.x - 3.0).abs() < 0.0001);
                let player = snapshot
                    .actors
                    .iter()
                    .find(|actor| actor.id == ActorId(1))
                    .expect("player actor");
                assert!((player.x - 3.0).abs() < 0.0001);
            }
            other => panic!("expected fresh look, got {other:?}"),
        }
    }

    #[test]
    fn examine_resolves_known_actor_only() {
        let mut source = FixtureSource::new();
        source.request_examine(ActorId(2), now());
        let events = source.poll(now());
        let detail = events.examined.expect("detail");
        assert_eq!(detail.kind, "rat");

        source.request_examine(ActorId(99), now());
        let events = source.poll(now());
        assert!(events.examined.is_none());
    }

    #[test]
    fn dictionary_maps_cell_codes() {
        let mut source = FixtureSource::new();
        source.request_dictionary(now());
        let events = source.poll(now());
        let dictionary = events.dictionary.expect("dictionary");
        assert_eq!(dictionary.get(&'#').map(String::as_str), Some("wall"));
        assert_eq!(dictionary.get(&'.').map(String::as_str), Some("grass"));
    }

    #[test]
    fn tick_advances_every_poll() {
        let mut source = FixtureSource::new();
        source.poll(now());
        let first = source.server_tick();
        source.poll(now());
        assert_eq!(source.server_tick(), first.map(|tick| tick + 1));
    }
}
