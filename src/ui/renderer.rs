/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into the `front` buffer (array of Cell)
///   2. Compare each cell with the `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.
///
/// The board is small and fixed (9×8 cells), so there is no camera:
/// one game cell maps to 2 terminal columns × 1 row. Pixel-space
/// actors (balls, reveal flights, pushed blocks) are quantized to
/// half-cell columns, which gives 8-pixel horizontal resolution.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use glam::Vec2;

use crate::domain::entity::{
    BallState, PlayerState, PortalState, PowerKind, PowerUpState,
};
use crate::domain::tile::Tile;
use crate::sim::entities::Entity;
use crate::sim::world::{Phase, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: [u8; 16], // up to 16 bytes (supports emoji)
    ch_len: u8,
    fg: Color,
    bg: Color,
    wide: bool, // true = this char occupies 2 terminal columns
    cont: bool, // true = continuation of previous wide char (skip render)
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// inter-row gap pixels on VTE terminals match the cell color and
    /// no horizontal lines show through.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 18, b: 30 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: false,
    };

    const WIDE_CONT: Cell = Cell {
        ch: [0; 16],
        ch_len: 0,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: true,
    };

    /// Sentinel used to invalidate the back buffer: differs from any
    /// real cell, so every position gets repainted.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
        wide: false,
        cont: false,
    };

    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        let len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.ch_len = len;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn from_char_wide(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::from_char(c, fg, bg);
        cell.wide = true;
        cell
    }

    fn as_str(&self) -> &str {
        if self.ch_len == 0 {
            return "";
        }
        // ch always holds the UTF-8 bytes written by encode_utf8.
        unsafe { std::str::from_utf8_unchecked(&self.ch[..self.ch_len as usize]) }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell::from_char(ch, fg, bg));
            cx += 1;
        }
    }
}

// ── Layout ──

/// Each game cell is 2 terminal columns wide.
const CELL_W: usize = 2;

const HUD_ROW: usize = 0;
const TIMER_ROW: usize = 1;
const MAP_ROW: usize = 3;
const MAP_COL: usize = 2;

const TIMER_SEGMENTS: u32 = 8;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &WorldState) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Phase change → full clear for a clean transition.
        let phase_changed = self.last_phase != Some(world.phase);
        if phase_changed {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        self.front.clear();

        match world.phase {
            Phase::Title => self.compose_title(world),
            Phase::LevelIntro => self.compose_level_intro(world),
            Phase::Playing | Phase::LevelComplete => self.compose_game(world),
            Phase::GameOver => self.compose_game_over(world),
            Phase::GameComplete => self.compose_game_complete(world),
        }

        if world.paused {
            self.compose_pause_overlay(world);
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors at start of frame; never ResetColor here,
        // the terminal default may differ from BASE_BG.
        queue!(
            self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                if cell.cont {
                    if cell != prev {
                        need_move = true;
                    }
                    x += 1;
                    continue;
                }

                let cont_changed = cell.wide
                    && x + 1 < self.front.width
                    && self.front.get(x + 1, y) != self.back.get(x + 1, y);

                if cell == prev && !cont_changed {
                    need_move = true;
                    x += 1;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }

                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.as_str()))?;

                if cell.wide {
                    last_x = x + 1;
                    x += 2;
                } else {
                    last_x = x;
                    x += 1;
                }
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Pixel → terminal mapping ──

    /// Terminal position of a pixel-space point: half-cell horizontal
    /// resolution, full-cell vertical.
    fn pixel_to_term(&self, world: &WorldState, pos: Vec2) -> (usize, usize) {
        let ts = world.grid_cfg.tile_size;
        let max_col = world.grid_cfg.width as usize * CELL_W - 1;
        let max_row = world.grid_cfg.height as usize - 1;
        let col = ((pos.x / (ts / 2.0)).floor().max(0.0) as usize).min(max_col);
        let row = ((pos.y / ts).floor().max(0.0) as usize).min(max_row);
        (MAP_COL + col, MAP_ROW + row)
    }

    // ── Game screen ──

    fn compose_game(&mut self, w: &WorldState) {
        self.compose_hud(w);
        self.compose_board(w);
        self.compose_entities(w);
        self.compose_player(w);
        self.compose_bars(w);
    }

    fn compose_hud(&mut self, w: &WorldState) {
        let buf_w = self.front.width;
        let power = match w.player.power {
            Some(p) => match p.kind {
                PowerKind::Speed => "»SPD",
                PowerKind::Invincible => "»INV",
                PowerKind::Time => "»FRZ",
            },
            None => "",
        };
        let hud = format!(
            " Lv.{:<2} {:<18} Score:{:<7} ♥×{}  ●×{}  {} ",
            w.current_level + 1,
            w.level_name,
            w.score,
            w.lives,
            w.entities.live_woodstocks(),
            power,
        );
        for x in 0..buf_w {
            self.front.set(x, HUD_ROW, Cell::from_char(' ', Color::White, HUD_BG));
        }
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        // Segmented countdown: drains one block per eighth of the limit.
        let per_segment = (w.time_limit / TIMER_SEGMENTS as f32).max(f32::EPSILON);
        let filled = (w.time_remaining / per_segment).ceil().max(0.0) as u32;
        let mut bar = String::from(" TIME ");
        for i in 0..TIMER_SEGMENTS {
            bar.push(if i < filled { '▰' } else { '▱' });
        }
        let low = w.time_remaining <= 10.0;
        let color = if low { Color::Rgb { r: 255, g: 80, b: 80 } } else { Color::Rgb { r: 120, g: 220, b: 120 } };
        self.front.put_str(0, TIMER_ROW, &bar, color, Color::Reset);
    }

    fn compose_board(&mut self, w: &WorldState) {
        for gy in 0..w.grid_cfg.height {
            for gx in 0..w.grid_cfg.width {
                let col = MAP_COL + gx as usize * CELL_W;
                let row = MAP_ROW + gy as usize;
                self.compose_tile(w, gx, gy, col, row);
            }
        }

        // Pushed blocks in flight, drawn over the tile layer.
        let ts = w.grid_cfg.tile_size;
        for m in &w.grid.moving {
            let (col, row) = self.pixel_to_term(w, m.pixel_pos(ts));
            let cell = Cell::from_char('▓', Color::Rgb { r: 220, g: 150, b: 70 }, Color::Reset);
            self.front.set(col, row, cell);
            self.front.set(col + 1, row, cell);
        }
    }

    fn compose_tile(&mut self, w: &WorldState, gx: i32, gy: i32, col: usize, row: usize) {
        let orange = Color::Rgb { r: 220, g: 150, b: 70 };
        let orange_bg = Color::Rgb { r: 90, g: 55, b: 20 };
        let grey = Color::Rgb { r: 130, g: 130, b: 140 };
        let grey_bg = Color::Rgb { r: 60, g: 60, b: 70 };

        let (c0, c1, fg, bg) = match w.grid.tile_at(gx, gy) {
            Tile::Empty => (' ', ' ', Color::Reset, Color::Reset),
            Tile::Wall => ('█', '█', grey, grey_bg),
            Tile::Pushable => ('▓', '▓', orange, orange_bg),
            Tile::PushUp => ('▓', '▲', orange, orange_bg),
            Tile::PushDown => ('▓', '▼', orange, orange_bg),
            Tile::PushLeft => ('◀', '▓', orange, orange_bg),
            Tile::PushRight => ('▓', '▶', orange, orange_bg),
            Tile::Breakable => ('░', '░', Color::Rgb { r: 180, g: 120, b: 60 }, Color::Rgb { r: 70, g: 45, b: 20 }),
            Tile::Broken => ('·', '·', Color::DarkGrey, Color::Reset),
            Tile::TeleportA => ('◇', ' ', Color::Rgb { r: 80, g: 220, b: 255 }, Color::Reset),
            Tile::TeleportB => ('◆', ' ', Color::Rgb { r: 230, g: 120, b: 255 }, Color::Reset),
            Tile::ArrowUp => ('↑', ' ', Color::Rgb { r: 140, g: 140, b: 90 }, Color::Reset),
            Tile::ArrowRight => ('→', ' ', Color::Rgb { r: 140, g: 140, b: 90 }, Color::Reset),
            Tile::ArrowDown => ('↓', ' ', Color::Rgb { r: 140, g: 140, b: 90 }, Color::Reset),
            Tile::ArrowLeft => ('←', ' ', Color::Rgb { r: 140, g: 140, b: 90 }, Color::Reset),
            Tile::Toggle => {
                let solid = w.grid.toggle_solid_at((gx, gy)).unwrap_or(false);
                let fading = w
                    .grid
                    .toggles
                    .iter()
                    .find(|t| t.cell == (gx, gy))
                    .map_or(false, |t| t.transition > 0.0);
                let blink = fading && (w.anim_clock * 8.0) as u32 % 2 == 0;
                if solid && !blink {
                    ('▦', '▦', Color::Rgb { r: 90, g: 190, b: 230 }, Color::Rgb { r: 30, g: 70, b: 90 })
                } else {
                    ('▢', ' ', Color::Rgb { r: 60, g: 110, b: 130 }, Color::Reset)
                }
            }
        };
        self.front.set(col, row, Cell::from_char(c0, fg, bg));
        self.front.set(col + 1, row, Cell::from_char(c1, fg, bg));
    }

    fn compose_entities(&mut self, w: &WorldState) {
        let ts = w.grid_cfg.tile_size;

        for entry in &w.entities.entries {
            if entry.dead {
                continue;
            }
            match &entry.entity {
                Entity::Portal(p) => {
                    let (glyph, color) = match p.state {
                        PortalState::Hidden => continue,
                        PortalState::Activating { .. } => {
                            if (w.anim_clock * 6.0) as u32 % 2 == 0 {
                                ('◌', Color::Rgb { r: 120, g: 120, b: 200 })
                            } else {
                                continue;
                            }
                        }
                        PortalState::Active => ('◎', Color::Rgb { r: 150, g: 150, b: 255 }),
                    };
                    let col = MAP_COL + p.cell.0 as usize * CELL_W;
                    let row = MAP_ROW + p.cell.1 as usize;
                    self.front.set(col, row, Cell::from_char(glyph, color, Color::Reset));
                }
                Entity::Woodstock(ws) => {
                    let col = MAP_COL + ws.cell.0 as usize * CELL_W;
                    let row = MAP_ROW + ws.cell.1 as usize;
                    // Bob: alternate the glyph on a slow clock.
                    let ch = if (ws.bob_clock * 2.0) as u32 % 2 == 0 { '🐤' } else { '🐥' };
                    self.front.set(col, row, Cell::from_char_wide(ch, Color::Reset, Color::Reset));
                    self.front.set(col + 1, row, Cell::WIDE_CONT);
                }
                Entity::PowerUp(p) => {
                    let visible = match p.state {
                        PowerUpState::Hidden => false,
                        PowerUpState::Revealing { .. } => true,
                        PowerUpState::Visible { lifetime } => {
                            // Blink during the last three seconds.
                            lifetime > 3.0 || (p.blink_clock * 6.0) as u32 % 2 == 0
                        }
                    };
                    if !visible {
                        continue;
                    }
                    let (glyph, color) = match p.kind {
                        PowerKind::Speed => ('S', Color::Rgb { r: 120, g: 255, b: 120 }),
                        PowerKind::Invincible => ('I', Color::Rgb { r: 255, g: 220, b: 80 }),
                        PowerKind::Time => ('T', Color::Rgb { r: 120, g: 200, b: 255 }),
                    };
                    let (col, row) = self.pixel_to_term(w, p.pos);
                    self.front.set(col, row, Cell::from_char('[', Color::DarkGrey, Color::Reset));
                    self.front.set(col + 1, row, Cell::from_char(glyph, color, Color::Reset));
                }
                Entity::Ball(b) => {
                    // Mid-warp balls are gone for the first half.
                    if let BallState::Teleporting { repositioned, .. } = b.state {
                        if !repositioned {
                            continue;
                        }
                    }
                    let (col, row) = self.pixel_to_term(w, b.pos);
                    let color = if w.balls_frozen() {
                        Color::Rgb { r: 130, g: 180, b: 255 }
                    } else {
                        Color::Rgb { r: 255, g: 90, b: 90 }
                    };
                    self.front.set(col, row, Cell::from_char('●', color, Color::Reset));
                }
                Entity::Particle(p) => {
                    let (col, row) = self.pixel_to_term(w, p.pos);
                    self.front.set(col, row, Cell::from_char('✦', Color::Rgb { r: 255, g: 200, b: 120 }, Color::Reset));
                }
                Entity::Popup(p) => {
                    let (col, row) = self.pixel_to_term(w, p.pos);
                    let text = format!("+{}", p.value);
                    self.front.put_str(col, row, &text, Color::Rgb { r: 255, g: 240, b: 150 }, Color::Reset);
                }
            }
        }
    }

    fn compose_player(&mut self, w: &WorldState) {
        // Gone for the first half of a warp.
        if let PlayerState::Teleporting { repositioned, .. } = w.player.state {
            if !repositioned {
                return;
            }
        }
        let (col, row) = self.pixel_to_term(w, w.player.pos);
        match w.player.state {
            PlayerState::Defeated { .. } => {
                self.front.set(col, row, Cell::from_char('✖', Color::Rgb { r: 255, g: 80, b: 80 }, Color::Reset));
                self.front.set(col + 1, row, Cell::from_char('✖', Color::Rgb { r: 255, g: 80, b: 80 }, Color::Reset));
            }
            PlayerState::Victorious { .. } => {
                self.front.set(col, row, Cell::from_char_wide('🎉', Color::Reset, Color::Reset));
                self.front.set(col + 1, row, Cell::WIDE_CONT);
            }
            _ => {
                let ch = if w.player.has_power(PowerKind::Invincible) { '😎' } else { '🐧' };
                self.front.set(col, row, Cell::from_char_wide(ch, Color::Reset, Color::Reset));
                self.front.set(col + 1, row, Cell::WIDE_CONT);
            }
        }
    }

    fn compose_bars(&mut self, w: &WorldState) {
        let buf_w = self.front.width;
        let board_h = w.grid_cfg.height as usize;

        let msg_row = MAP_ROW + board_h + 1;
        if msg_row < self.front.height && !w.message.is_empty() {
            let msg = format!(" ◈ {} ", w.message);
            for x in 0..buf_w {
                self.front.set(x, msg_row, Cell::from_char(' ', Color::Black, MSG_BG));
            }
            self.front.put_str(0, msg_row, &msg, Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + board_h + 3;
        if help_row < self.front.height {
            let help = " ←→↑↓/WASD:Move  Z/Space:Break  P:Pause  R:Restart  ESC:Title";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    // ── Static screens ──

    fn compose_title(&mut self, w: &WorldState) {
        let title = [
            r"   ___  ____  ____  ____  ____   __   __    __    ",
            r"  / __)(  _ \(_  _)(  _ \(  _ \ /__\ (  )  (  )   ",
            r" ( (_-. )   / _)(_  )(_) )) _ <//(__)\)(__  )(__  ",
            r"  \___/(_)\_)(____)(____/(____/(__)(__)____)(____) ",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(2, 2 + i, line, Color::Rgb { r: 255, g: 200, b: 50 }, Color::Reset);
        }

        let tagline = "━━━ push · break · bounce ━━━";
        self.front.put_str(12, 7, tagline, Color::Rgb { r: 180, g: 140, b: 50 }, Color::Reset);

        let hi = Color::Rgb { r: 80, g: 255, b: 80 };
        let menu_base = 10;
        self.front.put_str(8, menu_base, "ENTER   Start Game", hi, Color::Reset);
        self.front.put_str(8, menu_base + 1, "  Q     Quit", Color::White, Color::Reset);

        let info = format!("      {} levels loaded  ·  seed {}", w.levels.len(), w.seed);
        self.front.put_str(8, menu_base + 3, &info, Color::DarkGrey, Color::Reset);

        let help = [
            "Controls",
            "  ←→↑↓ / WASD   Move one cell",
            "  Z / Space     Break block ahead",
            "  P Pause   R Restart Level   ESC Title",
        ];
        for (i, line) in help.iter().enumerate() {
            let color = if i == 0 { Color::Rgb { r: 255, g: 200, b: 50 } } else { Color::White };
            self.front.put_str(8, menu_base + 5 + i, line, color, Color::Reset);
        }
    }

    /// Level intro: the board with a banner, before play begins.
    fn compose_level_intro(&mut self, w: &WorldState) {
        self.compose_hud(w);
        self.compose_board(w);
        self.compose_entities(w);
        self.compose_player(w);

        let banner = format!("  {}  ", w.level_name);
        let row = MAP_ROW + w.grid_cfg.height as usize / 2;
        let col = MAP_COL;
        self.front.put_str(col, row, &banner, Color::Black, MSG_BG);
        self.front.put_str(col, row + 1, "  get ready...  ", Color::Black, MSG_BG);
    }

    fn compose_game_over(&mut self, w: &WorldState) {
        let box_art = [
            "╔══════════════════════════╗",
            "║     ✖  GAME  OVER  ✖     ║",
            "╚══════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(6, 4 + i, l, Color::Rgb { r: 255, g: 60, b: 60 }, Color::Reset);
        }
        let score = format!("◈ Final Score: {}", w.score);
        let level = format!("◈ Reached Level: {}", w.current_level + 1);
        self.front.put_str(8, 9, &score, Color::White, Color::Reset);
        self.front.put_str(8, 10, &level, Color::White, Color::Reset);
        self.front.put_str(8, 12, "▸ ENTER: Retry from Level 1", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        self.front.put_str(8, 13, "▸ ESC:   Back to Title", Color::DarkGrey, Color::Reset);
    }

    fn compose_game_complete(&mut self, w: &WorldState) {
        let box_art = [
            "╔════════════════════════════════╗",
            "║  ★  ALL  LEVELS  CLEARED!  ★  ║",
            "╚════════════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(4, 4 + i, l, Color::Rgb { r: 255, g: 220, b: 50 }, Color::Reset);
        }
        let score = format!("◈ Final Score: {}", w.score);
        let levels = format!("◈ All {} levels cleared!", w.levels.len());
        self.front.put_str(6, 9, &score, Color::White, Color::Reset);
        self.front.put_str(6, 10, &levels, Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        self.front.put_str(6, 12, "▸ ENTER / ESC: Back to Title", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
    }

    fn compose_pause_overlay(&mut self, w: &WorldState) {
        let dim = Color::Rgb { r: 40, g: 40, b: 40 };
        let blink = (w.anim_clock * 2.0) as u32 % 2 == 0;

        let box_w = 24;
        let box_h = 7;
        let box_x = MAP_COL + 2;
        let box_y = MAP_ROW + 1;

        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::from_char(' ', Color::Reset, dim));
            }
        }

        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let key_c = Color::Rgb { r: 100, g: 200, b: 255 };
        let label = if blink { "▶  PAUSED  ◀" } else { "   PAUSED   " };
        self.front.put_str(box_x + 5, box_y + 1, label, hdr, dim);
        self.front.put_str(box_x + 3, box_y + 3, "P    Resume", key_c, dim);
        self.front.put_str(box_x + 3, box_y + 4, "R    Restart Level", key_c, dim);
        self.front.put_str(box_x + 3, box_y + 5, "ESC  Back to Title", key_c, dim);
    }
}
