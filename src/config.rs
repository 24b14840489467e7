/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// The result is one immutable value passed explicitly to every component
/// that needs it.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub grid: GridConfig,
    pub timing: TimingConfig,
    pub levels_dir: PathBuf,
    /// Session RNG seed for the bounce perturbation; None = derive from clock.
    pub seed: Option<u64>,
}

#[derive(Clone, Copy, Debug)]
pub struct GridConfig {
    pub width: i32,
    pub height: i32,
    /// Pixel size of one grid cell; entities live in this pixel space.
    pub tile_size: f32,
}

impl GridConfig {
    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * self.tile_size
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * self.tile_size
    }
}

#[derive(Clone, Copy, Debug)]
pub struct TimingConfig {
    pub player_speed: f32,        // px/s
    pub ball_speed: f32,          // px/s, conserved across bounces
    pub push_duration: f32,       // block flight, seconds
    pub toggle_solid_secs: f32,   // first half of the toggle cycle
    pub toggle_passable_secs: f32,
    pub toggle_transition: f32,   // cosmetic fade after a flip
    pub break_cooldown: f32,
    pub teleport_duration: f32,   // two-phase warp, total
    pub ball_teleport_cooldown: f32,
    pub portal_activation_delay: f32,
    pub portal_cooldown: f32,
    pub powerup_lifetime: f32,    // despawn timer once visible
    pub powerup_duration: f32,    // effect duration (speed / invincible)
    pub freeze_duration: f32,     // time power-up
    pub speed_multiplier: f32,
    pub reveal_tiles: f32,        // default reveal travel distance, tiles
    pub reveal_speed: f32,        // px/s during reveal flight
    pub bounce_jitter_deg: f32,
    pub defeat_duration: f32,
    pub victory_duration: f32,
    pub level_time: f32,          // segmented timer, seconds
    pub start_lives: u32,
}

impl TimingConfig {
    pub fn toggle_cycle(&self) -> f32 {
        self.toggle_solid_secs + self.toggle_passable_secs
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    grid: TomlGrid,
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGrid {
    #[serde(default = "default_grid_width")]
    width: i32,
    #[serde(default = "default_grid_height")]
    height: i32,
    #[serde(default = "default_tile_size")]
    tile_size: f32,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_player_speed")]
    player_speed: f32,
    #[serde(default = "default_ball_speed")]
    ball_speed: f32,
    #[serde(default = "default_push_duration")]
    push_duration: f32,
    #[serde(default = "default_toggle_solid")]
    toggle_solid_secs: f32,
    #[serde(default = "default_toggle_passable")]
    toggle_passable_secs: f32,
    #[serde(default = "default_toggle_transition")]
    toggle_transition: f32,
    #[serde(default = "default_break_cooldown")]
    break_cooldown: f32,
    #[serde(default = "default_teleport_duration")]
    teleport_duration: f32,
    #[serde(default = "default_ball_teleport_cooldown")]
    ball_teleport_cooldown: f32,
    #[serde(default = "default_portal_activation")]
    portal_activation_delay: f32,
    #[serde(default = "default_portal_cooldown")]
    portal_cooldown: f32,
    #[serde(default = "default_powerup_lifetime")]
    powerup_lifetime: f32,
    #[serde(default = "default_powerup_duration")]
    powerup_duration: f32,
    #[serde(default = "default_freeze_duration")]
    freeze_duration: f32,
    #[serde(default = "default_speed_multiplier")]
    speed_multiplier: f32,
    #[serde(default = "default_reveal_tiles")]
    reveal_tiles: f32,
    #[serde(default = "default_reveal_speed")]
    reveal_speed: f32,
    #[serde(default = "default_bounce_jitter")]
    bounce_jitter_deg: f32,
    #[serde(default = "default_defeat_duration")]
    defeat_duration: f32,
    #[serde(default = "default_victory_duration")]
    victory_duration: f32,
    #[serde(default = "default_level_time")]
    level_time: f32,
    #[serde(default = "default_start_lives")]
    start_lives: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_dir")]
    levels_dir: String,
    #[serde(default)]
    seed: Option<u64>,
}

// ── Defaults ──

fn default_grid_width() -> i32 { 9 }
fn default_grid_height() -> i32 { 8 }
fn default_tile_size() -> f32 { 16.0 }

fn default_player_speed() -> f32 { 72.0 }
fn default_ball_speed() -> f32 { 56.0 }
fn default_push_duration() -> f32 { 0.2 }
fn default_toggle_solid() -> f32 { 7.0 }
fn default_toggle_passable() -> f32 { 7.0 }
fn default_toggle_transition() -> f32 { 0.25 }
fn default_break_cooldown() -> f32 { 0.3 }
fn default_teleport_duration() -> f32 { 0.6 }
fn default_ball_teleport_cooldown() -> f32 { 1.0 }
fn default_portal_activation() -> f32 { 0.5 }
fn default_portal_cooldown() -> f32 { 1.0 }
fn default_powerup_lifetime() -> f32 { 10.0 }
fn default_powerup_duration() -> f32 { 8.0 }
fn default_freeze_duration() -> f32 { 6.0 }
fn default_speed_multiplier() -> f32 { 1.5 }
fn default_reveal_tiles() -> f32 { 2.0 }
fn default_reveal_speed() -> f32 { 96.0 }
fn default_bounce_jitter() -> f32 { 4.0 }
fn default_defeat_duration() -> f32 { 1.6 }
fn default_victory_duration() -> f32 { 2.0 }
fn default_level_time() -> f32 { 90.0 }
fn default_start_lives() -> u32 { 3 }

fn default_levels_dir() -> String { "levels".into() }

impl Default for TomlGrid {
    fn default() -> Self {
        TomlGrid {
            width: default_grid_width(),
            height: default_grid_height(),
            tile_size: default_tile_size(),
        }
    }
}

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            player_speed: default_player_speed(),
            ball_speed: default_ball_speed(),
            push_duration: default_push_duration(),
            toggle_solid_secs: default_toggle_solid(),
            toggle_passable_secs: default_toggle_passable(),
            toggle_transition: default_toggle_transition(),
            break_cooldown: default_break_cooldown(),
            teleport_duration: default_teleport_duration(),
            ball_teleport_cooldown: default_ball_teleport_cooldown(),
            portal_activation_delay: default_portal_activation(),
            portal_cooldown: default_portal_cooldown(),
            powerup_lifetime: default_powerup_lifetime(),
            powerup_duration: default_powerup_duration(),
            freeze_duration: default_freeze_duration(),
            speed_multiplier: default_speed_multiplier(),
            reveal_tiles: default_reveal_tiles(),
            reveal_speed: default_reveal_speed(),
            bounce_jitter_deg: default_bounce_jitter(),
            defeat_duration: default_defeat_duration(),
            victory_duration: default_victory_duration(),
            level_time: default_level_time(),
            start_lives: default_start_lives(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral { levels_dir: default_levels_dir(), seed: None }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::from_toml(toml_cfg, &search_dirs)
    }

    /// All-defaults config, used by tests and as the parse-failure fallback.
    pub fn defaults() -> Self {
        Self::from_toml(TomlConfig::default(), &[])
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let levels_dir_str = &toml_cfg.general.levels_dir;
        let levels_dir = if PathBuf::from(levels_dir_str).is_absolute() {
            PathBuf::from(levels_dir_str)
        } else {
            search_dirs
                .iter()
                .map(|d| d.join(levels_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(levels_dir_str))
        };

        GameConfig {
            grid: GridConfig {
                width: toml_cfg.grid.width.max(1),
                height: toml_cfg.grid.height.max(1),
                tile_size: toml_cfg.grid.tile_size.max(1.0),
            },
            timing: TimingConfig {
                player_speed: toml_cfg.timing.player_speed,
                ball_speed: toml_cfg.timing.ball_speed,
                push_duration: toml_cfg.timing.push_duration,
                toggle_solid_secs: toml_cfg.timing.toggle_solid_secs,
                toggle_passable_secs: toml_cfg.timing.toggle_passable_secs,
                toggle_transition: toml_cfg.timing.toggle_transition,
                break_cooldown: toml_cfg.timing.break_cooldown,
                teleport_duration: toml_cfg.timing.teleport_duration,
                ball_teleport_cooldown: toml_cfg.timing.ball_teleport_cooldown,
                portal_activation_delay: toml_cfg.timing.portal_activation_delay,
                portal_cooldown: toml_cfg.timing.portal_cooldown,
                powerup_lifetime: toml_cfg.timing.powerup_lifetime,
                powerup_duration: toml_cfg.timing.powerup_duration,
                freeze_duration: toml_cfg.timing.freeze_duration,
                speed_multiplier: toml_cfg.timing.speed_multiplier,
                reveal_tiles: toml_cfg.timing.reveal_tiles,
                reveal_speed: toml_cfg.timing.reveal_speed,
                bounce_jitter_deg: toml_cfg.timing.bounce_jitter_deg,
                defeat_duration: toml_cfg.timing.defeat_duration,
                victory_duration: toml_cfg.timing.victory_duration,
                level_time: toml_cfg.timing.level_time,
                start_lives: toml_cfg.timing.start_lives,
            },
            levels_dir,
            seed: toml_cfg.general.seed,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_standard_board() {
        let cfg = GameConfig::defaults();
        assert_eq!(cfg.grid.width, 9);
        assert_eq!(cfg.grid.height, 8);
        assert_eq!(cfg.grid.pixel_width(), 144.0);
        assert_eq!(cfg.grid.pixel_height(), 128.0);
        assert_eq!(cfg.timing.start_lives, 3);
        assert!((cfg.timing.toggle_cycle() - 14.0).abs() < 1e-6);
    }

    #[test]
    fn partial_toml_fills_missing_keys() {
        let parsed: TomlConfig =
            toml::from_str("[timing]\nball_speed = 80.0\n").expect("parse");
        let cfg = GameConfig::from_toml(parsed, &[]);
        assert_eq!(cfg.timing.ball_speed, 80.0);
        // Untouched keys keep their defaults.
        assert_eq!(cfg.timing.push_duration, 0.2);
        assert_eq!(cfg.grid.width, 9);
    }
}
