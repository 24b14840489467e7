/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.toml` files, sorted by name)
///   2. Built-in embedded levels
///   3. Emergency fallback (a playable open room, if everything else
///      fails to produce a single valid level)
///
/// ## Level file format (`.toml`):
///   ```toml
///   name = "Warmup"
///   start = [4, 6]
///   time_limit = 90.0        # optional
///   rows = [
///       "111111111",
///       "100020001",
///       # ... one string per row, top to bottom
///   ]
///
///   [[entities]]
///   type = "ball"
///   pos = [2, 2]             # grid cell
///   dir = [1.0, -1.0]        # normalized at load
///
///   [[entities]]
///   type = "woodstock"
///   pos = [7, 1]
///
///   [[entities]]
///   type = "powerup"
///   kind = "speed"           # speed | invincible | time
///   pos = [3, 4]
///   hidden = true            # starts inside the block at `pos`
///
///   [[entities]]
///   type = "portal"
///   pos = [1, 6]
///   dest = [7, 1]
///   ```
///
/// ## Tile legend (row characters):
///   '0' empty   '1' wall       '2' pushable    '3' breakable
///   '4' warp A  '5' warp B     '6'-'9' arrows (up/right/down/left)
///   'A'-'D' one-way pushables (up/down/left/right)   'E' toggle
///
/// Malformed files are skipped; a malformed cell character reads as
/// empty. Loading never aborts the game.

use std::path::Path;

use glam::Vec2;
use serde::Deserialize;

use crate::config::GameConfig;
use crate::domain::entity::{
    Ball, Player, Portal, PowerKind, PowerUp, RevealTargets, Woodstock,
};
use crate::domain::physics::cell_center;
use crate::sim::entities::Entity;
use crate::sim::grid::LevelGrid;
use crate::sim::world::{Phase, WorldState};

/// Runtime level data (loaded from file or embedded).
#[derive(Clone, Debug, Deserialize)]
pub struct LevelDef {
    pub name: String,
    pub start: (i32, i32),
    pub rows: Vec<String>,
    #[serde(default)]
    pub time_limit: Option<f32>,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityDef {
    Ball {
        pos: (i32, i32),
        dir: (f32, f32),
    },
    Woodstock {
        pos: (i32, i32),
    },
    PowerUp {
        kind: PowerKind,
        pos: (i32, i32),
        #[serde(default)]
        hidden: bool,
        #[serde(default)]
        targets: RevealTargets,
    },
    Portal {
        pos: (i32, i32),
        dest: (i32, i32),
        #[serde(default)]
        hidden: bool,
    },
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Collect the level list once at startup. Never returns empty.
pub fn load_levels(config: &GameConfig) -> Vec<LevelDef> {
    let mut levels = load_from_directory(&config.levels_dir);
    if levels.is_empty() {
        levels = embedded_levels();
    }
    levels.retain(|def| is_playable(def));
    if levels.is_empty() {
        levels.push(fallback_level());
    }
    levels
}

/// Load a level into the world state. Preserves score and lives.
pub fn apply_level(world: &mut WorldState, level_idx: usize) {
    if level_idx >= world.levels.len() {
        world.phase = Phase::GameComplete;
        return;
    }
    let def = world.levels[level_idx].clone();

    world.level_ready = false;
    world.current_level = level_idx;
    world.level_name = def.name.clone();
    world.grid = LevelGrid::from_rows(
        &def.rows,
        world.grid_cfg.width,
        world.grid_cfg.height,
        def.start,
        world.timing,
    );
    world.entities.clear();
    world.anim_clock = 0.0;
    world.tick = 0;

    let start = clamp_cell(def.start, world.grid_cfg.width, world.grid_cfg.height);
    world.player = Player::new(start, cell_center(start, world.grid_cfg.tile_size));

    spawn_entities(world, &def.entities);
    world.woodstocks_total = world.entities.live_woodstocks();

    world.time_limit = def.time_limit.unwrap_or(world.timing.level_time);
    world.time_remaining = world.time_limit;

    world.phase = Phase::LevelIntro;
    world.set_message(&def.name, 2.0);
    world.level_ready = true;
}

/// Re-spawn the current level's entities and reset the tile layer
/// after a lost life. Score, lives, and the clock carry over.
pub fn respawn(world: &mut WorldState) {
    if world.current_level >= world.levels.len() {
        return;
    }
    let def = world.levels[world.current_level].clone();

    world.level_ready = false;
    world.grid.reset_tiles();
    world.entities.clear();

    let start = clamp_cell(def.start, world.grid_cfg.width, world.grid_cfg.height);
    world.player = Player::new(start, cell_center(start, world.grid_cfg.tile_size));

    spawn_entities(world, &def.entities);
    world.woodstocks_total = world.entities.live_woodstocks();
    world.level_ready = true;
}

// ══════════════════════════════════════════════════════════════
// Entity spawning
// ══════════════════════════════════════════════════════════════

fn spawn_entities(world: &mut WorldState, defs: &[EntityDef]) {
    let ts = world.grid_cfg.tile_size;
    for def in defs {
        match *def {
            EntityDef::Ball { pos, dir } => {
                let cell = clamp_cell(pos, world.grid_cfg.width, world.grid_cfg.height);
                let mut v = Vec2::new(dir.0, dir.1);
                if v.length() <= f32::EPSILON {
                    v = Vec2::new(1.0, -1.0);
                }
                let vel = v.normalize() * world.timing.ball_speed;
                world
                    .entities
                    .spawn(Entity::Ball(Ball::new(cell_center(cell, ts), vel)));
            }
            EntityDef::Woodstock { pos } => {
                let cell = clamp_cell(pos, world.grid_cfg.width, world.grid_cfg.height);
                world.entities.spawn(Entity::Woodstock(Woodstock::new(cell)));
            }
            EntityDef::PowerUp { kind, pos, hidden, targets } => {
                let cell = clamp_cell(pos, world.grid_cfg.width, world.grid_cfg.height);
                let center = cell_center(cell, ts);
                if hidden {
                    let id = world
                        .entities
                        .spawn(Entity::PowerUp(PowerUp::hidden(kind, center, targets)));
                    world.grid.register_hidden(cell, id);
                } else {
                    world.entities.spawn(Entity::PowerUp(PowerUp::visible(
                        kind,
                        center,
                        world.timing.powerup_lifetime,
                    )));
                }
            }
            EntityDef::Portal { pos, dest, hidden } => {
                let cell = clamp_cell(pos, world.grid_cfg.width, world.grid_cfg.height);
                let dest = clamp_cell(dest, world.grid_cfg.width, world.grid_cfg.height);
                let id = world.entities.spawn(Entity::Portal(Portal::new(
                    cell,
                    dest,
                    hidden,
                    world.timing.portal_activation_delay,
                )));
                if hidden {
                    world.grid.register_hidden(cell, id);
                }
            }
        }
    }
}

fn clamp_cell(cell: (i32, i32), width: i32, height: i32) -> (i32, i32) {
    (
        cell.0.clamp(0, width.max(1) - 1),
        cell.1.clamp(0, height.max(1) - 1),
    )
}

// ══════════════════════════════════════════════════════════════
// File loading
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let mut results: Vec<(String, LevelDef)> = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.extension().map_or(false, |e| e == "toml") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        match toml::from_str::<LevelDef>(&content) {
            Ok(def) => {
                let filename = path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                results.push((filename, def));
            }
            Err(err) => {
                eprintln!("warning: skipping level {}: {}", path.display(), err);
            }
        }
    }

    results.sort_by(|a, b| a.0.cmp(&b.0));
    results.into_iter().map(|(_, def)| def).collect()
}

/// Minimal sanity check; anything structurally present is playable
/// (bad cells degrade to empty, bad coordinates clamp).
fn is_playable(def: &LevelDef) -> bool {
    !def.rows.is_empty()
        && def
            .entities
            .iter()
            .any(|e| matches!(e, EntityDef::Woodstock { .. }))
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

fn embedded_levels() -> Vec<LevelDef> {
    vec![
        make_embedded(
            "Level 1 - First Push",
            (4, 6),
            &[
                "000000000",
                "030000030",
                "000202000",
                "020000020",
                "000202000",
                "030000030",
                "000000000",
                "000000000",
            ],
            vec![
                EntityDef::Ball { pos: (1, 1), dir: (1.0, 1.0) },
                EntityDef::Woodstock { pos: (0, 0) },
                EntityDef::Woodstock { pos: (8, 0) },
                EntityDef::Woodstock { pos: (4, 3) },
                EntityDef::PowerUp {
                    kind: PowerKind::Speed,
                    pos: (3, 2),
                    hidden: true,
                    targets: RevealTargets::default(),
                },
            ],
        ),
        make_embedded(
            "Level 2 - Warp Lines",
            (0, 7),
            &[
                "400000004",
                "011101110",
                "000030000",
                "02E000E20",
                "000030000",
                "011101110",
                "500000005",
                "000000000",
            ],
            vec![
                EntityDef::Ball { pos: (4, 2), dir: (1.0, -1.0) },
                EntityDef::Ball { pos: (4, 4), dir: (-1.0, 1.0) },
                EntityDef::Woodstock { pos: (4, 0) },
                EntityDef::Woodstock { pos: (4, 7) },
                EntityDef::PowerUp {
                    kind: PowerKind::Invincible,
                    pos: (4, 2),
                    hidden: true,
                    targets: RevealTargets::default(),
                },
            ],
        ),
        make_embedded(
            "Level 3 - One-Way Street",
            (4, 4),
            &[
                "000777000",
                "0A00000B0",
                "900030007",
                "0003D3000",
                "900030007",
                "0C00000D0",
                "000999000",
                "000000000",
            ],
            vec![
                EntityDef::Ball { pos: (1, 6), dir: (1.0, -1.0) },
                EntityDef::Ball { pos: (7, 1), dir: (-1.0, 1.0) },
                EntityDef::Woodstock { pos: (0, 0) },
                EntityDef::Woodstock { pos: (8, 7) },
                EntityDef::Woodstock { pos: (4, 1) },
                EntityDef::Portal { pos: (0, 7), dest: (8, 0), hidden: false },
                EntityDef::PowerUp {
                    kind: PowerKind::Time,
                    pos: (4, 3),
                    hidden: true,
                    targets: RevealTargets::default(),
                },
            ],
        ),
    ]
}

fn make_embedded(
    name: &str,
    start: (i32, i32),
    rows: &[&str],
    entities: Vec<EntityDef>,
) -> LevelDef {
    LevelDef {
        name: name.to_string(),
        start,
        rows: rows.iter().map(|s| s.to_string()).collect(),
        time_limit: None,
        entities,
    }
}

/// Last-resort level: an open room with one ball and one pickup.
fn fallback_level() -> LevelDef {
    make_embedded(
        "Level 0 - Open Room",
        (4, 6),
        &[
            "000000000",
            "000000000",
            "000000000",
            "000000000",
            "000000000",
            "000000000",
            "000000000",
            "000000000",
        ],
        vec![
            EntityDef::Ball { pos: (2, 1), dir: (1.0, 1.0) },
            EntityDef::Woodstock { pos: (6, 2) },
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_levels_are_playable() {
        let levels = embedded_levels();
        assert!(!levels.is_empty());
        for def in &levels {
            assert!(is_playable(def), "{} not playable", def.name);
            assert_eq!(def.rows.len(), 8, "{}: wrong row count", def.name);
            for row in &def.rows {
                assert_eq!(row.len(), 9, "{}: wrong row width", def.name);
            }
        }
    }

    #[test]
    fn toml_level_parses() {
        let src = r#"
            name = "Test"
            start = [4, 6]
            rows = ["000", "020", "000"]

            [[entities]]
            type = "ball"
            pos = [1, 1]
            dir = [1.0, -1.0]

            [[entities]]
            type = "woodstock"
            pos = [2, 0]

            [[entities]]
            type = "powerup"
            kind = "invincible"
            pos = [1, 1]
            hidden = true

            [entities.targets]
            up = [1, 0]

            [[entities]]
            type = "portal"
            pos = [0, 2]
            dest = [2, 2]
        "#;
        let def: LevelDef = toml::from_str(src).unwrap();
        assert_eq!(def.name, "Test");
        assert_eq!(def.entities.len(), 4);
        assert!(is_playable(&def));
        let EntityDef::PowerUp { hidden, targets, .. } = &def.entities[2] else {
            panic!("expected powerup");
        };
        assert!(*hidden);
        assert_eq!(targets.up, Some((1, 0)));
        assert_eq!(targets.down, None);
    }

    #[test]
    fn level_without_pickups_rejected() {
        let def = make_embedded("empty", (0, 0), &["000"], vec![]);
        assert!(!is_playable(&def));
    }

    #[test]
    fn fallback_always_available() {
        assert!(is_playable(&fallback_level()));
    }
}
