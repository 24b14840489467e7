/// LevelGrid: the level/tile state machine.
///
/// ## Tile layers
///
/// Two layers, composed at query time:
///   - `base_tiles` — the level as loaded. Never mutated after load.
///   - `tiles`      — the effective grid (base + push/break changes).
/// `reset_tiles()` restores `tiles = base_tiles` on respawn.
///
/// ## Solidity
///
/// `is_solid` is the single source of truth for movement and bounce
/// queries. Out-of-bounds coordinates are solid (the boundary is an
/// implicit wall), the destination of an in-flight pushed block is
/// solid for the whole flight, and toggle cells report their current
/// phase solidity.
///
/// ## Hidden items
///
/// Entities hidden inside blocks are owned by the EntityRegistry; the
/// grid holds only a `(x, y) → EntityId` lookup key, removed exactly
/// once when the covering block is pushed away or broken.

use std::collections::HashMap;

use glam::Vec2;

use crate::config::TimingConfig;
use crate::domain::entity::Dir;
use crate::domain::physics::{cell_center, ease_in_out_quad};
use crate::domain::tile::{TeleportKind, Tile};
use super::entities::EntityId;
use super::event::GameEvent;

/// Per toggle-tile record. Solidity commits immediately at the phase
/// boundary; `transition` is a cosmetic fade countdown.
#[derive(Clone, Debug)]
pub struct ToggleBlock {
    pub cell: (i32, i32),
    pub solid: bool,
    pub transition: f32,
}

/// A pushed block in flight. The destination is reserved (solid) for
/// the whole flight and commits as a permanent Wall on completion.
#[derive(Clone, Debug)]
pub struct MovingBlock {
    pub tile: Tile,
    pub from: (i32, i32),
    pub to: (i32, i32),
    pub progress: f32,
    pub duration: f32,
}

impl MovingBlock {
    /// Eased pixel-center position along the flight.
    pub fn pixel_pos(&self, tile_size: f32) -> Vec2 {
        let t = ease_in_out_quad(self.progress);
        cell_center(self.from, tile_size).lerp(cell_center(self.to, tile_size), t)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PushOutcome {
    /// Not pushable, direction disallowed, or destination blocked.
    /// The grid is unchanged.
    Blocked,
    Pushed {
        dest: (i32, i32),
        revealed: Option<EntityId>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BreakOutcome {
    NotBreakable,
    Broken { revealed: Option<EntityId> },
}

pub struct LevelGrid {
    base_tiles: Vec<Vec<Tile>>,
    tiles: Vec<Vec<Tile>>,
    pub width: i32,
    pub height: i32,
    pub toggles: Vec<ToggleBlock>,
    pub moving: Vec<MovingBlock>,
    hidden_items: HashMap<(i32, i32), EntityId>,
    toggle_clock: f32,
    start: (i32, i32),
    timing: TimingConfig,
}

impl LevelGrid {
    /// Build a grid from decoded row strings. Rows shorter than the
    /// board or missing entirely degrade to Empty cells.
    pub fn from_rows(
        rows: &[String],
        width: i32,
        height: i32,
        start: (i32, i32),
        timing: TimingConfig,
    ) -> Self {
        let mut tiles = vec![vec![Tile::Empty; width as usize]; height as usize];
        let mut toggles = Vec::new();

        for y in 0..height as usize {
            let Some(row) = rows.get(y) else { continue };
            for (x, ch) in row.chars().enumerate() {
                if x >= width as usize {
                    break;
                }
                let tile = Tile::from_char(ch);
                tiles[y][x] = tile;
                if tile == Tile::Toggle {
                    // Cycle starts in the solid half.
                    toggles.push(ToggleBlock {
                        cell: (x as i32, y as i32),
                        solid: true,
                        transition: 0.0,
                    });
                }
            }
        }

        LevelGrid {
            base_tiles: tiles.clone(),
            tiles,
            width,
            height,
            toggles,
            moving: Vec::new(),
            hidden_items: HashMap::new(),
            toggle_clock: 0.0,
            start,
            timing,
        }
    }

    pub fn start_position(&self) -> (i32, i32) {
        self.start
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    /// Effective tile at (x, y). Out of bounds reads as Wall.
    pub fn tile_at(&self, x: i32, y: i32) -> Tile {
        if self.in_bounds(x, y) {
            self.tiles[y as usize][x as usize]
        } else {
            Tile::Wall
        }
    }

    pub fn set_tile(&mut self, x: i32, y: i32, tile: Tile) {
        if self.in_bounds(x, y) {
            self.tiles[y as usize][x as usize] = tile;
        }
    }

    /// Reset the effective layer to the level as loaded. Clears
    /// transient push/toggle state; hidden-item keys are rebuilt by the
    /// caller as part of entity respawn.
    pub fn reset_tiles(&mut self) {
        self.tiles = self.base_tiles.clone();
        self.moving.clear();
        self.toggle_clock = 0.0;
        self.hidden_items.clear();
        for t in &mut self.toggles {
            t.solid = true;
            t.transition = 0.0;
        }
    }

    // ── Solidity / pushability queries ──

    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return true;
        }
        if self.moving.iter().any(|m| m.to == (x, y)) {
            return true;
        }
        let tile = self.tiles[y as usize][x as usize];
        if tile == Tile::Toggle {
            return self.toggle_solid_at((x, y)).unwrap_or(false);
        }
        tile.is_solid()
    }

    pub fn is_pushable(&self, x: i32, y: i32) -> bool {
        self.tile_at(x, y).is_pushable()
    }

    pub fn is_animating(&self) -> bool {
        !self.moving.is_empty()
    }

    /// Current solidity of the toggle block at `cell`, if one is there.
    pub fn toggle_solid_at(&self, cell: (i32, i32)) -> Option<bool> {
        self.toggles.iter().find(|t| t.cell == cell).map(|t| t.solid)
    }

    /// True iff the player's cell is a toggle block in its solid phase.
    pub fn is_player_trapped(&self, player_cell: (i32, i32)) -> bool {
        self.toggle_solid_at(player_cell).unwrap_or(false)
    }

    // ── Mutations ──

    /// Push the block at (x, y) one cell along `dir`.
    /// Succeeds atomically or leaves the grid untouched.
    pub fn try_push(&mut self, x: i32, y: i32, dir: Dir) -> PushOutcome {
        let tile = self.tile_at(x, y);
        if !tile.push_allowed(dir) {
            return PushOutcome::Blocked;
        }
        let dest = dir.step((x, y));
        if !self.in_bounds(dest.0, dest.1) || self.is_solid(dest.0, dest.1) {
            return PushOutcome::Blocked;
        }

        self.set_tile(x, y, Tile::Empty);
        let revealed = self.hidden_items.remove(&(x, y));
        self.moving.push(MovingBlock {
            tile,
            from: (x, y),
            to: dest,
            progress: 0.0,
            duration: self.timing.push_duration,
        });
        PushOutcome::Pushed { dest, revealed }
    }

    /// Break the breakable tile at `cell` into a Broken tile,
    /// surfacing anything hidden underneath. No-op otherwise.
    pub fn break_tile(&mut self, cell: (i32, i32)) -> BreakOutcome {
        if !self.tile_at(cell.0, cell.1).is_breakable() {
            return BreakOutcome::NotBreakable;
        }
        self.set_tile(cell.0, cell.1, Tile::Broken);
        let revealed = self.hidden_items.remove(&cell);
        BreakOutcome::Broken { revealed }
    }

    // ── Hidden items ──

    pub fn register_hidden(&mut self, cell: (i32, i32), id: EntityId) {
        self.hidden_items.insert(cell, id);
    }

    pub fn has_hidden(&self, cell: (i32, i32)) -> bool {
        self.hidden_items.contains_key(&cell)
    }

    // ── Teleport pairing ──

    /// The other occurrence of the same teleport tile kind, or None for
    /// a lone unpaired tile (which is then a no-op).
    pub fn find_teleport_partner(
        &self,
        cell: (i32, i32),
        kind: TeleportKind,
    ) -> Option<(i32, i32)> {
        for y in 0..self.height {
            for x in 0..self.width {
                if (x, y) != cell && self.tile_at(x, y).teleport_kind() == Some(kind) {
                    return Some((x, y));
                }
            }
        }
        None
    }

    // ── Per-tick update ──

    /// Advance block flights and the toggle cycle.
    ///
    /// A toggle cell occupied by the player never transitions into
    /// solid while occupied; the flip is suppressed for this tick and
    /// re-evaluated next tick.
    pub fn update(
        &mut self,
        dt: f32,
        player_cell: Option<(i32, i32)>,
        events: &mut Vec<GameEvent>,
    ) {
        // Block flights
        let mut landed: Vec<(i32, i32)> = Vec::new();
        for m in &mut self.moving {
            m.progress += dt / m.duration.max(f32::EPSILON);
            if m.progress >= 1.0 {
                landed.push(m.to);
            }
        }
        if !landed.is_empty() {
            self.moving.retain(|m| m.progress < 1.0);
            for to in landed {
                self.set_tile(to.0, to.1, Tile::Wall);
                events.push(GameEvent::BlockLanded { x: to.0, y: to.1 });
            }
        }

        // Toggle cycle: first half solid, second half passable.
        self.toggle_clock += dt;
        let cycle = self.timing.toggle_cycle().max(f32::EPSILON);
        let phase_solid = self.toggle_clock.rem_euclid(cycle) < self.timing.toggle_solid_secs;

        for t in &mut self.toggles {
            if t.transition > 0.0 {
                t.transition -= dt;
            }
            if t.solid != phase_solid {
                if phase_solid && player_cell == Some(t.cell) {
                    // Occupied: the flip into solid is suppressed entirely.
                    continue;
                }
                t.solid = phase_solid;
                t.transition = self.timing.toggle_transition;
                events.push(GameEvent::ToggleFlipped {
                    x: t.cell.0,
                    y: t.cell.1,
                    solid: phase_solid,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    fn timing() -> TimingConfig {
        GameConfig::defaults().timing
    }

    fn grid_from(rows: &[&str]) -> LevelGrid {
        let rows: Vec<String> = rows.iter().map(|s| s.to_string()).collect();
        let h = rows.len() as i32;
        let w = rows.iter().map(|r| r.len()).max().unwrap_or(0) as i32;
        LevelGrid::from_rows(&rows, w, h, (0, 0), timing())
    }

    fn drain(grid: &mut LevelGrid, dt: f32, player: Option<(i32, i32)>) -> Vec<GameEvent> {
        let mut events = Vec::new();
        grid.update(dt, player, &mut events);
        events
    }

    // ── Boundary solidity ──

    #[test]
    fn out_of_bounds_is_solid_everywhere() {
        let g = grid_from(&["000", "000"]);
        for (x, y) in [(-1, 0), (0, -1), (3, 0), (0, 2), (-5, -5), (99, 99)] {
            assert!(g.is_solid(x, y), "({x},{y}) should be solid");
            assert_eq!(g.tile_at(x, y), Tile::Wall);
        }
        assert!(!g.is_solid(1, 1));
    }

    // ── Push ──

    #[test]
    fn push_scenario_atomic_and_committed() {
        // Generic pushable at (3,3), (4,3) empty.
        let mut g = grid_from(&[
            "000000000",
            "000000000",
            "000000000",
            "000200000",
            "000000000",
        ]);
        let outcome = g.try_push(3, 3, Dir::Right);
        assert!(matches!(outcome, PushOutcome::Pushed { dest: (4, 3), revealed: None }));

        // Source cleared immediately, destination reserved for the flight.
        assert_eq!(g.tile_at(3, 3), Tile::Empty);
        assert_eq!(g.tile_at(4, 3), Tile::Empty);
        assert!(g.is_solid(4, 3));
        assert!(g.is_animating());

        // After the flight the destination commits as Wall.
        let events = drain(&mut g, 0.25, None);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::BlockLanded { x: 4, y: 3 })));
        assert_eq!(g.tile_at(4, 3), Tile::Wall);
        assert!(!g.is_solid(3, 3));
        assert!(!g.is_animating());
    }

    #[test]
    fn push_rejections_leave_grid_unchanged() {
        let mut g = grid_from(&["210", "00A"]);
        // Not pushable
        assert_eq!(g.try_push(1, 0, Dir::Right), PushOutcome::Blocked);
        // Destination solid
        assert_eq!(g.try_push(0, 0, Dir::Right), PushOutcome::Blocked);
        // Out of bounds
        assert_eq!(g.try_push(0, 0, Dir::Left), PushOutcome::Blocked);
        // Directional pushable, wrong direction (A only goes up)
        assert_eq!(g.try_push(2, 1, Dir::Left), PushOutcome::Blocked);
        assert_eq!(g.tile_at(0, 0), Tile::Pushable);
        assert_eq!(g.tile_at(2, 1), Tile::PushUp);
        assert!(!g.is_animating());
    }

    #[test]
    fn push_into_reserved_destination_blocked() {
        let mut g = grid_from(&["202", "000"]);
        // First block flies right into (1,0).
        assert!(matches!(g.try_push(0, 0, Dir::Right), PushOutcome::Pushed { .. }));
        // Second block can't move into the reserved cell.
        assert_eq!(g.try_push(2, 0, Dir::Left), PushOutcome::Blocked);
    }

    // ── Break ──

    #[test]
    fn break_only_breakables() {
        let mut g = grid_from(&["310"]);
        assert_eq!(g.break_tile((1, 0)), BreakOutcome::NotBreakable);
        assert_eq!(g.break_tile((2, 0)), BreakOutcome::NotBreakable);
        assert_eq!(g.break_tile((0, 0)), BreakOutcome::Broken { revealed: None });
        assert_eq!(g.tile_at(0, 0), Tile::Broken);
        assert!(!g.is_solid(0, 0));
        // Breaking the same cell again is a no-op.
        assert_eq!(g.break_tile((0, 0)), BreakOutcome::NotBreakable);
    }

    // ── Hidden items ──

    #[test]
    fn hidden_item_revealed_exactly_once() {
        let mut g = grid_from(&["200"]);
        g.register_hidden((0, 0), 42);
        assert!(g.has_hidden((0, 0)));

        let PushOutcome::Pushed { revealed, .. } = g.try_push(0, 0, Dir::Right) else {
            panic!("push should succeed");
        };
        assert_eq!(revealed, Some(42));
        assert!(!g.has_hidden((0, 0)));

        // The key is gone; a later break of the landed wall reveals nothing.
        drain(&mut g, 0.25, None);
        assert_eq!(g.break_tile((0, 0)), BreakOutcome::NotBreakable);
    }

    #[test]
    fn hidden_item_under_breakable() {
        let mut g = grid_from(&["300"]);
        g.register_hidden((0, 0), 7);
        assert_eq!(g.break_tile((0, 0)), BreakOutcome::Broken { revealed: Some(7) });
        assert!(!g.has_hidden((0, 0)));
    }

    // ── Teleport pairing ──

    #[test]
    fn teleport_partner_lookup() {
        let g = grid_from(&["400", "050", "045"]);
        assert_eq!(
            g.find_teleport_partner((0, 0), TeleportKind::A),
            Some((1, 2))
        );
        assert_eq!(
            g.find_teleport_partner((1, 2), TeleportKind::A),
            Some((0, 0))
        );
        // Two B tiles pair with each other.
        assert_eq!(
            g.find_teleport_partner((1, 1), TeleportKind::B),
            Some((2, 2))
        );
    }

    #[test]
    fn lone_teleport_tile_has_no_partner() {
        let g = grid_from(&["400"]);
        assert_eq!(g.find_teleport_partner((0, 0), TeleportKind::A), None);
    }

    // ── Toggle cycle ──

    #[test]
    fn toggle_phase_first_half_solid() {
        let mut g = grid_from(&["E00"]);
        assert_eq!(g.toggle_solid_at((0, 0)), Some(true));
        assert!(g.is_solid(0, 0));

        // Cross into the passable half (defaults: 7s solid + 7s passable).
        drain(&mut g, 7.5, None);
        assert_eq!(g.toggle_solid_at((0, 0)), Some(false));
        assert!(!g.is_solid(0, 0));

        // And back around into solid.
        drain(&mut g, 7.0, None);
        assert_eq!(g.toggle_solid_at((0, 0)), Some(true));
    }

    #[test]
    fn toggle_flip_into_solid_deferred_while_occupied() {
        let mut g = grid_from(&["E00"]);
        // Move into the passable half, then stand on the cell.
        drain(&mut g, 7.5, None);
        assert!(!g.is_solid(0, 0));

        // The cycle wants to flip solid, but the player is standing there.
        let events = drain(&mut g, 7.0, Some((0, 0)));
        assert_eq!(g.toggle_solid_at((0, 0)), Some(false));
        assert!(!g.is_player_trapped((0, 0)));
        assert!(!events
            .iter()
            .any(|e| matches!(e, GameEvent::ToggleFlipped { .. })));

        // Still deferred every tick the player stays.
        drain(&mut g, 0.5, Some((0, 0)));
        assert_eq!(g.toggle_solid_at((0, 0)), Some(false));

        // The player leaves: the flip lands on the next tick.
        drain(&mut g, 0.02, None);
        assert_eq!(g.toggle_solid_at((0, 0)), Some(true));
        assert!(g.is_player_trapped((0, 0)));
    }

    #[test]
    fn moving_block_interpolates_between_cells() {
        let mut g = grid_from(&["20"]);
        g.try_push(0, 0, Dir::Right);
        drain(&mut g, 0.1, None); // halfway through the 0.2s flight
        let m = &g.moving[0];
        let pos = m.pixel_pos(16.0);
        assert!(pos.x > 8.0 && pos.x < 24.0);
        assert_eq!(pos.y, 8.0);
    }

    #[test]
    fn reset_restores_base_layer() {
        let mut g = grid_from(&["230"]);
        g.register_hidden((1, 0), 3);
        g.try_push(0, 0, Dir::Down);
        g.break_tile((1, 0));
        g.reset_tiles();
        assert_eq!(g.tile_at(0, 0), Tile::Pushable);
        assert_eq!(g.tile_at(1, 0), Tile::Breakable);
        assert!(!g.is_animating());
        assert!(!g.has_hidden((1, 0)));
    }
}
