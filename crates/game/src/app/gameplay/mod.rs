mod registry;
mod viewmap;

use std::time::Instant;

use engine::{
    InputAction, InputSnapshot, LoopMetricsSnapshot, Scene, SceneCommand, Stage, Vec2,
};
use tracing::{debug, info, warn};

use crate::app::session::wire::{ActorId, Dictionary, LookSnapshot};
use crate::app::source::{GameSource, LookEvent, MoveOutcome, SourceEvents};

use registry::ActorRegistry;
use viewmap::{TILE_FLOOR, TILE_WALL};

/// Half-extent of the clickable box around each actor sprite. Covers a full
/// cell so placeholder squares stay clickable too.
const EXAMINE_HIT_HALF_SIZE_PX: f32 = 32.0;

/// Crawler scene: forwards input to the source as move requests, re-polls
/// the world every frame, and mirrors the latest snapshot into the stage.
/// The player position only changes when a snapshot says it did.
pub(crate) struct CrawlScene {
    source: Box<dyn GameSource>,
    registry: ActorRegistry,
    last_snapshot: Option<LookSnapshot>,
    local_tick: u64,
    last_examined: Option<String>,
    look_fallbacks: u64,
}

impl CrawlScene {
    pub(crate) fn new(source: Box<dyn GameSource>) -> Self {
        Self {
            source,
            registry: ActorRegistry::new(),
            last_snapshot: None,
            local_tick: 0,
            last_examined: None,
            look_fallbacks: 0,
        }
    }

    fn current_tick(&self) -> u64 {
        self.source.server_tick().unwrap_or(self.local_tick)
    }

    fn send_moves(&mut self, input: &InputSnapshot, now: Instant) {
        use crate::app::session::wire::Direction;

        let tick = self.current_tick();
        // One axis wins per frame so opposed keys never cancel into a
        // diagonal request the server would reject.
        if input.is_down(InputAction::MoveUp) {
            self.source.send_move(Direction::North, tick, now);
        } else if input.is_down(InputAction::MoveDown) {
            self.source.send_move(Direction::South, tick, now);
        }
        if input.is_down(InputAction::MoveLeft) {
            self.source.send_move(Direction::West, tick, now);
        } else if input.is_down(InputAction::MoveRight) {
            self.source.send_move(Direction::East, tick, now);
        }
    }

    fn handle_examine_click(&mut self, input: &InputSnapshot, stage: &Stage, now: Instant) {
        if !input.left_click_pressed() {
            return;
        }
        let Some(cursor) = input.cursor_position_px() else {
            return;
        };
        let Some(sprite_id) = stage.sprite_at_px(cursor, EXAMINE_HIT_HALF_SIZE_PX) else {
            return;
        };
        match self.registry.actor_for_sprite(sprite_id) {
            Some(actor_id) => {
                debug!(actor_id = actor_id.0, "examine_requested");
                self.source.request_examine(actor_id, now);
            }
            None => debug!("examine_click_hit_unregistered_sprite"),
        }
    }

    fn bind_dictionary(&self, stage: &mut Stage, dictionary: &Dictionary) {
        for (cell, index) in [('.', TILE_FLOOR), ('#', TILE_WALL)] {
            match dictionary.get(&cell) {
                Some(texture_key) => stage.tiles_mut().bind_texture(index, texture_key),
                None => warn!(cell = %cell, "dictionary_missing_cell_code"),
            }
        }
    }

    fn absorb_events(&mut self, events: SourceEvents, stage: &mut Stage) {
        if let Some(dictionary) = &events.dictionary {
            info!(entries = dictionary.len(), "dictionary_received");
            self.bind_dictionary(stage, dictionary);
        }

        for (direction, outcome) in &events.move_results {
            match outcome {
                MoveOutcome::Accepted => {}
                MoveOutcome::Rejected(result) => {
                    warn!(direction = direction.as_str(), result, "move_rejected")
                }
                MoveOutcome::TimedOut => {
                    debug!(direction = direction.as_str(), "move_timed_out")
                }
            }
        }

        if let Some(detail) = &events.examined {
            let label = match detail.login.as_deref() {
                Some(login) => format!("{} ({})", login, detail.kind),
                None => detail.kind.clone(),
            };
            info!(actor_id = detail.id.0, label, "actor_examined");
            self.last_examined = Some(label);
        }

        match events.look {
            Some(LookEvent::Fresh(snapshot)) => {
                self.last_snapshot = Some(snapshot);
                self.refresh_stage(stage);
            }
            Some(LookEvent::Fallback) => {
                self.look_fallbacks += 1;
                // Stale world beats a blank one.
                self.refresh_stage(stage);
            }
            None => {}
        }
    }

    fn refresh_stage(&mut self, stage: &mut Stage) {
        let Some(snapshot) = &self.last_snapshot else {
            return;
        };
        viewmap::apply(stage, snapshot);
        let player = Vec2 {
            x: snapshot.x,
            y: snapshot.y,
        };
        self.registry.reconcile(stage, player, &snapshot.actors);
    }
}

impl Scene for CrawlScene {
    fn load(&mut self, _stage: &mut Stage) {
        info!("crawl_scene_loaded");
        self.source.request_dictionary(Instant::now());
    }

    fn update(&mut self, now: Instant, input: &InputSnapshot, stage: &mut Stage) -> SceneCommand {
        if input.quit_requested() {
            return SceneCommand::Quit;
        }

        self.local_tick = self.local_tick.wrapping_add(1);
        self.send_moves(input, now);
        self.handle_examine_click(input, stage, now);
        self.source.request_look(now);

        let events = self.source.poll(now);
        self.absorb_events(events, stage);

        SceneCommand::None
    }

    fn overlay_lines(&self, metrics: &LoopMetricsSnapshot) -> Vec<String> {
        let mut lines = vec![
            format!("FPS {:.0}", metrics.fps),
            format!("ACTORS {}", self.registry.len()),
            format!(
                "POS {:.1},{:.1}",
                self.last_snapshot.as_ref().map_or(0.0, |s| s.x),
                self.last_snapshot.as_ref().map_or(0.0, |s| s.y),
            ),
        ];
        if let Some(label) = &self.last_examined {
            lines.push(label.to_uppercase());
        }
        lines
    }

    fn unload(&mut self, stage: &mut Stage) {
        info!(look_fallbacks = self.look_fallbacks, "crawl_scene_unloaded");
        self.registry.clear(stage);
        stage.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use engine::{GRID_COLS, GRID_ROWS};

    use crate::app::session::wire::{ActorDetail, ActorSnapshot, Direction};

    use super::*;

    #[derive(Debug, Default)]
    struct Recorded {
        dictionary_requests: u32,
        look_requests: u32,
        moves: Vec<(Direction, u64)>,
        examines: Vec<ActorId>,
    }

    /// Scripted source: records requests, plays back queued events on poll.
    struct ScriptedSource {
        recorded: Rc<RefCell<Recorded>>,
        queued: Vec<SourceEvents>,
        server_tick: Option<u64>,
    }

    impl ScriptedSource {
        fn new(recorded: Rc<RefCell<Recorded>>) -> Self {
            Self {
                recorded,
                queued: Vec::new(),
                server_tick: None,
            }
        }

        fn queue(&mut self, events: SourceEvents) {
            self.queued.push(events);
        }
    }

    impl GameSource for ScriptedSource {
        fn request_dictionary(&mut self, _now: Instant) {
            self.recorded.borrow_mut().dictionary_requests += 1;
        }

        fn request_look(&mut self, _now: Instant) {
            self.recorded.borrow_mut().look_requests += 1;
        }

        fn send_move(&mut self, direction: Direction, tick: u64, _now: Instant) {
            self.recorded.borrow_mut().moves.push((direction, tick));
        }

        fn request_examine(&mut self, id: ActorId, _now: Instant) {
            self.recorded.borrow_mut().examines.push(id);
        }

        fn poll(&mut self, _now: Instant) -> SourceEvents {
            if self.queued.is_empty() {
                SourceEvents::default()
            } else {
                self.queued.remove(0)
            }
        }

        fn server_tick(&self) -> Option<u64> {
            self.server_tick
        }
    }

    fn scene_with_script(
        configure: impl FnOnce(&mut ScriptedSource),
    ) -> (CrawlScene, Rc<RefCell<Recorded>>) {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut source = ScriptedSource::new(Rc::clone(&recorded));
        configure(&mut source);
        (CrawlScene::new(Box::new(source)), recorded)
    }

    fn snapshot(x: f32, y: f32, actors: Vec<ActorSnapshot>) -> LookSnapshot {
        LookSnapshot {
            x,
            y,
            map: vec![vec!['.'; GRID_COLS as usize]; GRID_ROWS as usize],
            actors,
        }
    }

    fn actor(id: u64, x: f32, y: f32) -> ActorSnapshot {
        ActorSnapshot {
            id: ActorId(id),
            kind: "player".to_string(),
            x,
            y,
        }
    }

    fn look_event(s: LookSnapshot) -> SourceEvents {
        SourceEvents {
            look: Some(LookEvent::Fresh(s)),
            ..SourceEvents::default()
        }
    }

    #[test]
    fn every_frame_requests_a_look() {
        let (mut scene, recorded) = scene_with_script(|_| {});
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);

        for _ in 0..3 {
            scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);
        }
        assert_eq!(recorded.borrow().look_requests, 3);
    }

    #[test]
    fn opposed_vertical_keys_send_only_north() {
        let (mut scene, recorded) = scene_with_script(|_| {});
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        let input = InputSnapshot::empty()
            .with_action_down(InputAction::MoveUp)
            .with_action_down(InputAction::MoveDown)
            .with_action_down(InputAction::MoveRight);

        scene.update(Instant::now(), &input, &mut stage);

        let moves = recorded.borrow().moves.clone();
        let directions: Vec<Direction> = moves.iter().map(|(d, _)| *d).collect();
        assert_eq!(directions, vec![Direction::North, Direction::East]);
    }

    #[test]
    fn moves_carry_server_tick_when_known() {
        let (mut scene, recorded) = scene_with_script(|source| {
            source.server_tick = Some(40);
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveUp);

        scene.update(Instant::now(), &input, &mut stage);
        assert_eq!(recorded.borrow().moves, vec![(Direction::North, 40)]);
    }

    #[test]
    fn fresh_snapshot_populates_tiles_and_sprites() {
        let (mut scene, _) = scene_with_script(|source| {
            source.queue(look_event(snapshot(
                4.0,
                2.0,
                vec![actor(1, 4.0, 2.0), actor(2, 5.0, 2.0)],
            )));
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);

        scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);

        assert_eq!(stage.sprite_count(), 2);
        assert_eq!(stage.tiles().tile_at(0, 0), Some(TILE_FLOOR));
    }

    #[test]
    fn player_position_only_moves_with_snapshots() {
        let (mut scene, _) = scene_with_script(|source| {
            source.queue(look_event(snapshot(4.0, 2.0, vec![actor(1, 4.0, 2.0)])));
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveUp);

        scene.update(Instant::now(), &input, &mut stage);
        let before = stage.sprites()[0].position_px();

        // Further keypresses without a new snapshot leave the sprite put.
        scene.update(Instant::now(), &input, &mut stage);
        scene.update(Instant::now(), &input, &mut stage);
        let after = stage.sprites()[0].position_px();
        assert_eq!(before, after);
    }

    #[test]
    fn fallback_look_rerenders_last_snapshot() {
        let (mut scene, _) = scene_with_script(|source| {
            source.queue(look_event(snapshot(4.0, 2.0, vec![actor(1, 4.0, 2.0)])));
            source.queue(SourceEvents {
                look: Some(LookEvent::Fallback),
                ..SourceEvents::default()
            });
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);

        scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);
        scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);

        assert_eq!(scene.look_fallbacks, 1);
        assert_eq!(stage.sprite_count(), 1);
        assert_eq!(stage.tiles().tile_at(0, 0), Some(TILE_FLOOR));
    }

    #[test]
    fn clicking_an_actor_sprite_requests_examine() {
        let (mut scene, recorded) = scene_with_script(|source| {
            source.queue(look_event(snapshot(4.0, 2.0, vec![actor(9, 4.0, 2.0)])));
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);

        let position = stage.sprites()[0].position_px();
        let input = InputSnapshot::empty()
            .with_cursor_position_px(position)
            .with_left_click_pressed();
        scene.update(Instant::now(), &input, &mut stage);

        assert_eq!(recorded.borrow().examines, vec![ActorId(9)]);
    }

    #[test]
    fn click_on_empty_space_examines_nothing() {
        let (mut scene, recorded) = scene_with_script(|_| {});
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        let input = InputSnapshot::empty()
            .with_cursor_position_px(Vec2 { x: 10.0, y: 10.0 })
            .with_left_click_pressed();

        scene.update(Instant::now(), &input, &mut stage);
        assert!(recorded.borrow().examines.is_empty());
    }

    #[test]
    fn dictionary_binds_tile_textures() {
        let mut dictionary = Dictionary::new();
        dictionary.insert('.', "grass".to_string());
        dictionary.insert('#', "wall".to_string());
        let (mut scene, _) = scene_with_script(|source| {
            source.queue(SourceEvents {
                dictionary: Some(dictionary),
                ..SourceEvents::default()
            });
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);

        scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);

        assert_eq!(stage.tiles().texture_for(TILE_FLOOR), Some("grass"));
        assert_eq!(stage.tiles().texture_for(TILE_WALL), Some("wall"));
    }

    #[test]
    fn examined_actor_shows_in_overlay() {
        let (mut scene, _) = scene_with_script(|source| {
            source.queue(SourceEvents {
                examined: Some(ActorDetail {
                    id: ActorId(3),
                    kind: "player".to_string(),
                    login: Some("ada".to_string()),
                    x: 1.0,
                    y: 1.0,
                }),
                ..SourceEvents::default()
            });
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);

        let metrics = LoopMetricsSnapshot {
            fps: 60.0,
            frame_time_ms: 16.0,
        };
        let lines = scene.overlay_lines(&metrics);
        assert!(lines.iter().any(|line| line.contains("ADA")));
    }

    #[test]
    fn quit_input_ends_the_scene() {
        let (mut scene, _) = scene_with_script(|_| {});
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        let input = InputSnapshot::empty().with_quit_requested();

        let command = scene.update(Instant::now(), &input, &mut stage);
        assert_eq!(command, SceneCommand::Quit);
    }

    #[test]
    fn unload_clears_stage() {
        let (mut scene, _) = scene_with_script(|source| {
            source.queue(look_event(snapshot(4.0, 2.0, vec![actor(1, 4.0, 2.0)])));
        });
        let mut stage = Stage::new(GRID_COLS, GRID_ROWS);
        scene.update(Instant::now(), &InputSnapshot::empty(), &mut stage);
        assert_eq!(stage.sprite_count(), 1);

        scene.unload(&mut stage);
        assert_eq!(stage.sprite_count(), 0);
    }
}
