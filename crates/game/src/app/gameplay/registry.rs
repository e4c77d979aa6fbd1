use std::collections::{HashMap, HashSet};

use engine::{SpriteId, Stage, Vec2, CELL_SIZE_PX, GRID_COLS, GRID_ROWS};
use tracing::debug;

use crate::app::session::wire::{ActorId, ActorSnapshot};

/// Screen-space center of an actor's cell, relative to a player kept at the
/// middle of the viewport.
pub(crate) fn actor_screen_px(player: Vec2, actor_x: f32, actor_y: f32) -> Vec2 {
    let cell = CELL_SIZE_PX as f32;
    Vec2 {
        x: (-(player.x - actor_x) + GRID_COLS as f32 * 0.5) * cell,
        y: (-(player.y - actor_y) + GRID_ROWS as f32 * 0.5) * cell,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ReconcileStats {
    pub(crate) created: usize,
    pub(crate) repositioned: usize,
    pub(crate) removed: usize,
}

/// Owns the actor-id to sprite-handle mapping. Each reconcile pass makes the
/// stage's sprite set equal to the actors visible in the latest snapshot.
#[derive(Debug, Default)]
pub(crate) struct ActorRegistry {
    sprites: HashMap<ActorId, SpriteId>,
}

impl ActorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reconcile(
        &mut self,
        stage: &mut Stage,
        player: Vec2,
        actors: &[ActorSnapshot],
    ) -> ReconcileStats {
        let mut stats = ReconcileStats::default();

        let mut seen_ids = HashSet::new();
        for actor in actors {
            // The wire does not guard against repeated ids; the last
            // occurrence wins.
            if !seen_ids.insert(actor.id) {
                debug!(actor_id = actor.id.0, "duplicate_actor_id_in_snapshot");
            }
            let position = actor_screen_px(player, actor.x, actor.y);
            match self.sprites.get(&actor.id) {
                Some(sprite_id) if stage.set_sprite_position(*sprite_id, position) => {
                    stats.repositioned += 1;
                }
                _ => {
                    let sprite_id = stage.spawn_sprite(&actor.kind, position);
                    self.sprites.insert(actor.id, sprite_id);
                    stats.created += 1;
                }
            }
        }

        let live_ids: HashMap<ActorId, ()> =
            actors.iter().map(|actor| (actor.id, ())).collect();
        self.sprites.retain(|actor_id, sprite_id| {
            if live_ids.contains_key(actor_id) {
                return true;
            }
            stage.remove_sprite(*sprite_id);
            stats.removed += 1;
            false
        });

        if stats.created > 0 || stats.removed > 0 {
            debug!(
                created = stats.created,
                removed = stats.removed,
                live = self.sprites.len(),
                "actor_registry_reconciled"
            );
        }
        stats
    }

    pub(crate) fn actor_for_sprite(&self, sprite_id: SpriteId) -> Option<ActorId> {
        self.sprites
            .iter()
            .find(|(_, candidate)| **candidate == sprite_id)
            .map(|(actor_id, _)| *actor_id)
    }

    pub(crate) fn clear(&mut self, stage: &mut Stage) {
        for sprite_id in self.sprites.values() {
            stage.remove_sprite(*sprite_id);
        }
        self.sprites.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.sprites.len()
    }
}
