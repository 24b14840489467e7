/// Input state tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Continuous movement while an arrow / WASD key is held
///   - Edge-triggered break action (only fires on initial press)
///   - Simultaneous movement + break in the same tick
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't
/// support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind};

use crate::domain::entity::{Dir, FrameInput};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that transitioned from "not held" → "held" during the most
    /// recent drain_events() call. Used for edge-triggered actions.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation ticks.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.raw_events.push(key);

                match key.kind {
                    KeyEventKind::Release if self.honor_release => {
                        self.last_active.remove(&key.code);
                    }
                    KeyEventKind::Release => {
                        // No enhancement: rely on timeout expiry instead.
                    }
                    _ => {
                        let was_held = self.is_held_inner(key.code);
                        self.last_active.insert(key.code, Instant::now());
                        if !was_held {
                            self.fresh_presses.push(key.code);
                        }
                    }
                }
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    /// Convenience: was any of these keys freshly pressed?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Check if any raw event this frame has Ctrl+C.
    pub fn ctrl_c_pressed(&self) -> bool {
        use crossterm::event::KeyModifiers;
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    /// Held movement direction, arrows and WASD. When several are held
    /// at once the most recently pressed one wins.
    pub fn movement_dir(&self) -> Option<Dir> {
        let candidates: [(&[KeyCode], Dir); 4] = [
            (&[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')], Dir::Up),
            (&[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')], Dir::Down),
            (&[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')], Dir::Left),
            (&[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')], Dir::Right),
        ];
        let mut best: Option<(Instant, Dir)> = None;
        for (codes, dir) in candidates {
            for code in codes {
                if let Some(&t) = self.last_active.get(code) {
                    if t.elapsed() < HOLD_TIMEOUT
                        && best.map_or(true, |(bt, _)| t > bt)
                    {
                        best = Some((t, dir));
                    }
                }
            }
        }
        best.map(|(_, dir)| dir)
    }

    /// The per-tick simulation input: held movement + edge-triggered
    /// break action (Space or Z).
    pub fn frame_input(&self) -> FrameInput {
        FrameInput {
            movement: self.movement_dir(),
            action: self.any_pressed(&[
                KeyCode::Char(' '),
                KeyCode::Char('z'),
                KeyCode::Char('Z'),
            ]),
        }
    }

    // ── Internal ──

    fn is_held_inner(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }
}
