/// Entry point and game loop.
///
/// Rendering runs once per frame; simulation runs on a fixed timestep
/// through an accumulator, so game speed is independent of frame rate.
/// A long stall (debugger, terminal freeze) is clamped so the world
/// never fast-forwards through a burst of catch-up ticks.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use config::GameConfig;
use sim::level;
use sim::step::step;
use sim::world::{Phase, WorldState};
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

/// Fixed simulation timestep.
const SIM_DT: f32 = 1.0 / 60.0;

/// Upper bound on one frame's worth of simulated time.
const MAX_FRAME: f32 = 0.25;

/// Level intro banner duration before play begins.
const INTRO_SECS: f32 = 2.0;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let config = GameConfig::load();
    let levels = level::load_levels(&config);
    let mut world = WorldState::new(&config, levels);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, sound.as_ref());

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Gridball!");
    println!("Final Score: {}", world.score);
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut last = Instant::now();
    let mut accumulator: f32 = 0.0;
    let mut intro_timer: f32 = 0.0;

    loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_meta(world, &kb) {
            break;
        }

        let now = Instant::now();
        let frame = (now - last).as_secs_f32().min(MAX_FRAME);
        last = now;

        match world.phase {
            Phase::Playing if !world.paused => {
                accumulator += frame;
                while accumulator >= SIM_DT {
                    let events = step(world, kb.frame_input(), SIM_DT);
                    if let Some(s) = sound {
                        s.handle(&events);
                    }
                    accumulator -= SIM_DT;
                }
            }
            Phase::LevelIntro => {
                accumulator = 0.0;
                intro_timer += frame;
                if intro_timer >= INTRO_SECS {
                    intro_timer = 0.0;
                    world.phase = Phase::Playing;
                }
            }
            _ => {
                accumulator = 0.0;
                intro_timer = 0.0;
            }
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Phase-dependent meta keys (menus, pause, restart).
/// Returns true when the game should exit.
fn handle_meta(world: &mut WorldState, kb: &InputState) -> bool {
    let enter = kb.any_pressed(&[KeyCode::Enter, KeyCode::Char(' ')]);
    let escape = kb.was_pressed(KeyCode::Esc);

    match world.phase {
        Phase::Title => {
            if enter {
                start_new_game(world);
            }
            if kb.any_pressed(&[KeyCode::Char('q'), KeyCode::Char('Q')]) || escape {
                return true;
            }
        }
        Phase::LevelIntro => {
            if enter {
                world.phase = Phase::Playing;
            }
            if escape {
                return_to_title(world);
            }
        }
        Phase::Playing => {
            if kb.any_pressed(&[KeyCode::Char('p'), KeyCode::Char('P')]) {
                world.paused = !world.paused;
            }
            if kb.any_pressed(&[KeyCode::Char('r'), KeyCode::Char('R')]) {
                world.paused = false;
                level::apply_level(world, world.current_level);
            }
            if escape {
                return_to_title(world);
            }
        }
        Phase::LevelComplete => {
            if enter {
                let next = world.current_level + 1;
                level::apply_level(world, next);
            }
            if escape {
                return_to_title(world);
            }
        }
        Phase::GameOver => {
            if enter {
                start_new_game(world);
            }
            if escape {
                return_to_title(world);
            }
        }
        Phase::GameComplete => {
            if enter || escape {
                return_to_title(world);
            }
        }
    }
    false
}

fn start_new_game(world: &mut WorldState) {
    world.reset_session();
    level::apply_level(world, 0);
}

fn return_to_title(world: &mut WorldState) {
    world.paused = false;
    world.phase = Phase::Title;
}
