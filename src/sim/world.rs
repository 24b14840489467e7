/// WorldState: the complete snapshot of a running game session.
///
/// Grid terrain lives in `LevelGrid`, actors in `EntityRegistry`; this
/// struct ties them to the session layer (phase, score, lives, timer)
/// and owns the seeded RNG so a run is reproducible from its seed.
///
/// `level_ready` gates the step function: while a level is being
/// (re)built the tick is a no-op, so no system ever observes a
/// half-constructed world.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::{GameConfig, GridConfig, TimingConfig};
use crate::domain::entity::{Player, PowerKind};
use crate::domain::physics::cell_center;
use crate::sim::entities::EntityRegistry;
use crate::sim::grid::LevelGrid;
use crate::sim::level::LevelDef;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    LevelIntro,
    Playing,
    LevelComplete,
    GameOver,
    GameComplete,
}

pub struct WorldState {
    pub grid_cfg: GridConfig,
    pub timing: TimingConfig,

    pub grid: LevelGrid,
    pub entities: EntityRegistry,
    pub player: Player,

    pub phase: Phase,
    pub paused: bool,
    /// False while a level is being built; the step function no-ops.
    pub level_ready: bool,

    pub levels: Vec<LevelDef>,
    pub current_level: usize,
    pub level_name: String,

    pub score: u32,
    pub lives: u32,
    pub time_limit: f32,
    pub time_remaining: f32,
    pub woodstocks_total: u32,

    pub tick: u64,
    pub anim_clock: f32,
    pub message: String,
    pub message_timer: f32,

    pub rng: Pcg32,
    pub seed: u64,
}

pub const SCORE_WOODSTOCK: u32 = 100;
pub const SCORE_BALL_DESTROYED: u32 = 250;
pub const SCORE_LEVEL_CLEAR: u32 = 500;

impl WorldState {
    pub fn new(config: &GameConfig, levels: Vec<LevelDef>) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::random());
        let grid_cfg = config.grid;
        let timing = config.timing;
        let start = (grid_cfg.width / 2, grid_cfg.height / 2);

        WorldState {
            grid_cfg,
            timing,
            grid: LevelGrid::from_rows(&[], grid_cfg.width, grid_cfg.height, start, timing),
            entities: EntityRegistry::new(),
            player: Player::new(start, cell_center(start, grid_cfg.tile_size)),
            phase: Phase::Title,
            paused: false,
            level_ready: false,
            levels,
            current_level: 0,
            level_name: String::new(),
            score: 0,
            lives: timing.start_lives,
            time_limit: timing.level_time,
            time_remaining: timing.level_time,
            woodstocks_total: 0,
            tick: 0,
            anim_clock: 0.0,
            message: String::new(),
            message_timer: 0.0,
            rng: Pcg32::seed_from_u64(seed),
            seed,
        }
    }

    pub fn set_message(&mut self, msg: &str, duration: f32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    pub fn add_score(&mut self, points: u32) {
        self.score += points;
    }

    /// Remaining-time bonus awarded on level clear.
    pub fn time_bonus(&self) -> u32 {
        (self.time_remaining.max(0.0) as u32) * 10
    }

    /// Balls neither move nor teleport while the time power-up is the
    /// active one. Overriding it with another power ends the freeze.
    pub fn balls_frozen(&self) -> bool {
        self.player.has_power(PowerKind::Time)
    }

    /// Player movement speed, pixels per second, with the speed
    /// power-up applied.
    pub fn player_speed(&self) -> f32 {
        if self.player.has_power(PowerKind::Speed) {
            self.timing.player_speed * self.timing.speed_multiplier
        } else {
            self.timing.player_speed
        }
    }

    /// Fresh session: score and lives reset, back to the first level.
    pub fn reset_session(&mut self) {
        self.score = 0;
        self.lives = self.timing.start_lives;
        self.current_level = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level;

    fn world() -> WorldState {
        let config = GameConfig::defaults();
        let levels = level::load_levels(&config);
        WorldState::new(&config, levels)
    }

    #[test]
    fn fresh_world_starts_on_title() {
        let w = world();
        assert_eq!(w.phase, Phase::Title);
        assert!(!w.level_ready);
        assert_eq!(w.lives, 3);
        assert_eq!(w.score, 0);
    }

    #[test]
    fn same_seed_same_rng_stream() {
        use rand::Rng;
        let mut config = GameConfig::defaults();
        config.seed = Some(99);
        let levels = level::load_levels(&config);
        let mut a = WorldState::new(&config, levels.clone());
        let mut b = WorldState::new(&config, levels);
        let xs: Vec<u32> = (0..8).map(|_| a.rng.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.rng.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn speed_power_scales_player_speed() {
        let mut w = world();
        let base = w.player_speed();
        w.player.apply_power(PowerKind::Speed, 8.0);
        assert!((w.player_speed() - base * w.timing.speed_multiplier).abs() < 1e-3);
    }

    #[test]
    fn apply_level_populates_and_gates() {
        let mut w = world();
        level::apply_level(&mut w, 0);
        assert!(w.level_ready);
        assert_eq!(w.phase, Phase::LevelIntro);
        assert!(w.woodstocks_total > 0);
        assert_eq!(w.time_remaining, w.time_limit);
        // Player spawned at the level start cell.
        assert_eq!(w.player.cell, w.grid.start_position());
    }

    #[test]
    fn apply_level_past_end_completes_game() {
        let mut w = world();
        let n = w.levels.len();
        level::apply_level(&mut w, n);
        assert_eq!(w.phase, Phase::GameComplete);
    }
}
