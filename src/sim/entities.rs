/// Entity registry: flat id-keyed storage for every non-player actor.
///
/// Despawns are deferred: systems flag an entry dead mid-pass and the
/// step function sweeps once at the end of the tick, so no index is
/// invalidated while another system is still iterating.

use crate::domain::entity::{Ball, Particle, Portal, PowerUp, ScorePopup, Woodstock};

pub type EntityId = u32;

#[derive(Clone, Debug)]
pub enum Entity {
    Ball(Ball),
    Woodstock(Woodstock),
    PowerUp(PowerUp),
    Portal(Portal),
    Particle(Particle),
    Popup(ScorePopup),
}

#[derive(Clone, Debug)]
pub struct EntityEntry {
    pub id: EntityId,
    pub entity: Entity,
    pub dead: bool,
}

#[derive(Default)]
pub struct EntityRegistry {
    pub entries: Vec<EntityEntry>,
    next_id: EntityId,
}

impl EntityRegistry {
    pub fn new() -> Self {
        EntityRegistry { entries: Vec::new(), next_id: 0 }
    }

    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(EntityEntry { id, entity, dead: false });
        id
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id && !e.dead)
            .map(|e| &mut e.entity)
    }

    /// Flag an entry for removal at the end-of-tick sweep.
    pub fn kill(&mut self, id: EntityId) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.dead = true;
        }
    }

    /// Drop everything flagged dead. Called once per tick.
    pub fn sweep(&mut self) {
        self.entries.retain(|e| !e.dead);
    }

    pub fn balls(&self) -> impl Iterator<Item = (EntityId, &Ball)> {
        self.entries.iter().filter_map(|e| match &e.entity {
            Entity::Ball(b) if !e.dead => Some((e.id, b)),
            _ => None,
        })
    }

    pub fn woodstocks(&self) -> impl Iterator<Item = (EntityId, &Woodstock)> {
        self.entries.iter().filter_map(|e| match &e.entity {
            Entity::Woodstock(w) if !e.dead => Some((e.id, w)),
            _ => None,
        })
    }

    pub fn powerups(&self) -> impl Iterator<Item = (EntityId, &PowerUp)> {
        self.entries.iter().filter_map(|e| match &e.entity {
            Entity::PowerUp(p) if !e.dead => Some((e.id, p)),
            _ => None,
        })
    }

    pub fn portals(&self) -> impl Iterator<Item = (EntityId, &Portal)> {
        self.entries.iter().filter_map(|e| match &e.entity {
            Entity::Portal(p) if !e.dead => Some((e.id, p)),
            _ => None,
        })
    }

    pub fn live_woodstocks(&self) -> u32 {
        self.woodstocks().count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn ids_are_unique_and_stable() {
        let mut reg = EntityRegistry::new();
        let a = reg.spawn(Entity::Woodstock(Woodstock::new((1, 1))));
        let b = reg.spawn(Entity::Woodstock(Woodstock::new((2, 1))));
        assert_ne!(a, b);
        reg.kill(a);
        reg.sweep();
        // Killing one entry does not disturb the other.
        assert!(reg.get_mut(a).is_none());
        assert!(reg.get_mut(b).is_some());
        // Freed ids are not recycled.
        let c = reg.spawn(Entity::Ball(Ball::new(Vec2::ZERO, Vec2::new(40.0, 40.0))));
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn dead_entries_hidden_until_sweep() {
        let mut reg = EntityRegistry::new();
        let id = reg.spawn(Entity::Ball(Ball::new(Vec2::ZERO, Vec2::ONE)));
        reg.kill(id);
        // Flagged but not yet swept: iterators already skip it.
        assert_eq!(reg.balls().count(), 0);
        assert_eq!(reg.entries.len(), 1);
        reg.sweep();
        assert!(reg.entries.is_empty());
    }

    #[test]
    fn woodstock_count_tracks_kills() {
        let mut reg = EntityRegistry::new();
        let a = reg.spawn(Entity::Woodstock(Woodstock::new((0, 0))));
        reg.spawn(Entity::Woodstock(Woodstock::new((1, 0))));
        assert_eq!(reg.live_woodstocks(), 2);
        reg.kill(a);
        assert_eq!(reg.live_woodstocks(), 1);
    }
}
