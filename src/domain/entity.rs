/// Actors: Player, Ball, Woodstock, PowerUp, Portal, plus the cosmetic
/// self-expiring ones (Particle, ScorePopup).
///
/// Every actor with non-trivial behavior carries one explicit state enum.
/// Exactly one state is active at a time; the step function owns the
/// transitions. Sub-state boolean flags are deliberately absent.

use glam::Vec2;
use serde::Deserialize;

/// Grid direction, also the player's facing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Dir {
    Up,
    Down,
    Left,
    Right,
}

impl Dir {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir::Up => (0, -1),
            Dir::Down => (0, 1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
        }
    }

    pub fn step(self, cell: (i32, i32)) -> (i32, i32) {
        let (dx, dy) = self.delta();
        (cell.0 + dx, cell.1 + dy)
    }
}

/// Frame input: movement is continuous (held key), action is
/// edge-triggered (fresh press). Both can fire in one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub movement: Option<Dir>,
    pub action: bool,
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

/// Player state machine. The special states (Teleporting, Defeated,
/// Victorious) suspend every other update in the world for their duration.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PlayerState {
    Idle,
    /// Straight-line interpolation toward the pixel center of `dest`.
    Moving { dest: (i32, i32), target: Vec2 },
    /// Two-phase warp: gone for the first half, reappearing at `dest`
    /// for the second half.
    Teleporting { dest: (i32, i32), elapsed: f32, repositioned: bool },
    Defeated { elapsed: f32 },
    Victorious { elapsed: f32 },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerKind {
    Speed,
    Invincible,
    Time,
}

/// The single active power-up effect. Applying a new one overrides it.
#[derive(Clone, Copy, Debug)]
pub struct ActivePower {
    pub kind: PowerKind,
    pub remaining: f32,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub pos: Vec2,
    pub cell: (i32, i32),
    pub facing: Dir,
    pub state: PlayerState,
    /// Set each tick the occupied toggle cell is solid; blocks all
    /// directional input until the cell turns passable again.
    pub trapped: bool,
    pub break_cooldown: f32,
    pub power: Option<ActivePower>,
}

impl Player {
    pub fn new(cell: (i32, i32), pos: Vec2) -> Self {
        Player {
            pos,
            cell,
            facing: Dir::Down,
            state: PlayerState::Idle,
            trapped: false,
            break_cooldown: 0.0,
            power: None,
        }
    }

    /// Special states block ordinary input handling entirely.
    pub fn is_locked(&self) -> bool {
        !matches!(self.state, PlayerState::Idle | PlayerState::Moving { .. })
    }

    pub fn has_power(&self, kind: PowerKind) -> bool {
        self.power.map_or(false, |p| p.kind == kind)
    }

    pub fn apply_power(&mut self, kind: PowerKind, duration: f32) {
        self.power = Some(ActivePower { kind, remaining: duration });
    }
}

// ══════════════════════════════════════════════════════════════
// Ball
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum BallState {
    Flying,
    /// Same two-phase warp as the player; the ball neither moves nor
    /// collides while mid-warp.
    Teleporting { dest: Vec2, elapsed: f32, repositioned: bool },
}

#[derive(Clone, Debug)]
pub struct Ball {
    pub pos: Vec2,
    /// Fixed-magnitude velocity; bounces change direction only.
    pub vel: Vec2,
    pub state: BallState,
    /// Prevents immediate re-trigger after materializing on a warp tile.
    pub teleport_cooldown: f32,
}

impl Ball {
    pub fn new(pos: Vec2, vel: Vec2) -> Self {
        Ball { pos, vel, state: BallState::Flying, teleport_cooldown: 0.0 }
    }

    pub fn cell(&self, tile_size: f32) -> (i32, i32) {
        (
            (self.pos.x / tile_size).floor() as i32,
            (self.pos.y / tile_size).floor() as i32,
        )
    }
}

// ══════════════════════════════════════════════════════════════
// Pickups
// ══════════════════════════════════════════════════════════════

/// The required pickup. Collecting the last one wins the level.
#[derive(Clone, Debug)]
pub struct Woodstock {
    pub cell: (i32, i32),
    pub bob_clock: f32,
}

impl Woodstock {
    pub fn new(cell: (i32, i32)) -> Self {
        Woodstock { cell, bob_clock: 0.0 }
    }
}

/// Per-direction override for where a hidden power-up travels on reveal.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct RevealTargets {
    pub up: Option<(i32, i32)>,
    pub down: Option<(i32, i32)>,
    pub left: Option<(i32, i32)>,
    pub right: Option<(i32, i32)>,
}

impl RevealTargets {
    pub fn for_dir(&self, dir: Dir) -> Option<(i32, i32)> {
        match dir {
            Dir::Up => self.up,
            Dir::Down => self.down,
            Dir::Left => self.left,
            Dir::Right => self.right,
        }
    }
}

/// Reveal flight: one axis first, then the other, axis order driven by
/// the triggering direction. Duration is proportional to travel distance.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct RevealPath {
    pub from: Vec2,
    pub mid: Vec2,
    pub to: Vec2,
    pub elapsed: f32,
    pub duration: f32,
}

impl RevealPath {
    /// Current position along the two-leg path, parameterized by distance.
    pub fn position(&self) -> Vec2 {
        let leg1 = self.mid.distance(self.from);
        let leg2 = self.to.distance(self.mid);
        let total = leg1 + leg2;
        if total <= f32::EPSILON || self.duration <= f32::EPSILON {
            return self.to;
        }
        let s = (self.elapsed / self.duration).clamp(0.0, 1.0) * total;
        if s <= leg1 {
            self.from.lerp(self.mid, s / leg1.max(f32::EPSILON))
        } else {
            self.mid.lerp(self.to, (s - leg1) / leg2.max(f32::EPSILON))
        }
    }

    pub fn done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PowerUpState {
    /// Inside a block: no update, no render, no collision.
    Hidden,
    Revealing { path: RevealPath },
    /// Counting down the despawn lifetime.
    Visible { lifetime: f32 },
}

#[derive(Clone, Debug)]
pub struct PowerUp {
    pub kind: PowerKind,
    pub pos: Vec2,
    pub state: PowerUpState,
    pub targets: RevealTargets,
    pub blink_clock: f32,
}

impl PowerUp {
    pub fn visible(kind: PowerKind, pos: Vec2, lifetime: f32) -> Self {
        PowerUp {
            kind,
            pos,
            state: PowerUpState::Visible { lifetime },
            targets: RevealTargets::default(),
            blink_clock: 0.0,
        }
    }

    pub fn hidden(kind: PowerKind, pos: Vec2, targets: RevealTargets) -> Self {
        PowerUp { kind, pos, state: PowerUpState::Hidden, targets, blink_clock: 0.0 }
    }

    pub fn is_collectible(&self) -> bool {
        matches!(self.state, PowerUpState::Visible { .. })
    }
}

// ══════════════════════════════════════════════════════════════
// Portal
// ══════════════════════════════════════════════════════════════

/// Key for the portal's per-actor cooldown map.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ActorKey {
    Player,
    Ball(u32),
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PortalState {
    Hidden,
    /// Short delay after reveal before the portal starts testing actors.
    Activating { delay: f32 },
    Active,
}

/// One-way fixed-destination teleporter.
#[derive(Clone, Debug)]
pub struct Portal {
    pub cell: (i32, i32),
    pub dest: (i32, i32),
    pub state: PortalState,
    /// Per-actor cooldowns; an actor may not re-use the portal until
    /// its entry expires.
    pub cooldowns: Vec<(ActorKey, f32)>,
}

impl Portal {
    pub fn new(cell: (i32, i32), dest: (i32, i32), hidden: bool, activation_delay: f32) -> Self {
        let state = if hidden {
            PortalState::Hidden
        } else {
            PortalState::Activating { delay: activation_delay }
        };
        Portal { cell, dest, state, cooldowns: Vec::new() }
    }

    pub fn on_cooldown(&self, key: ActorKey) -> bool {
        self.cooldowns.iter().any(|&(k, t)| k == key && t > 0.0)
    }

    pub fn start_cooldown(&mut self, key: ActorKey, duration: f32) {
        if let Some(entry) = self.cooldowns.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = duration;
        } else {
            self.cooldowns.push((key, duration));
        }
    }

    /// Advance cooldowns, dropping expired entries.
    pub fn tick_cooldowns(&mut self, dt: f32) {
        for entry in &mut self.cooldowns {
            entry.1 -= dt;
        }
        self.cooldowns.retain(|&(_, t)| t > 0.0);
    }
}

// ══════════════════════════════════════════════════════════════
// Cosmetics
// ══════════════════════════════════════════════════════════════

/// Explosion debris from a destroyed ball. Self-expiring.
#[derive(Clone, Debug)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub life: f32,
}

/// Floating score text. Self-expiring.
#[derive(Clone, Debug)]
pub struct ScorePopup {
    pub pos: Vec2,
    pub value: u32,
    pub life: f32,
}
