/// Tile kinds and their properties.
/// Properties are queried via methods, not stored as flags,
/// so tile semantics are centralized here.

use super::entity::Dir;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Tile {
    Empty,
    Wall,
    Pushable,  // pushable in any direction
    PushUp,    // pushable in exactly one direction
    PushDown,
    PushLeft,
    PushRight,
    Breakable, // breaks into Broken via the action key
    Broken,
    TeleportA, // paired warp tiles
    TeleportB,
    ArrowUp,   // forces movement while the player idles on it
    ArrowRight,
    ArrowDown,
    ArrowLeft,
    Toggle,    // solidity cycles on the global toggle clock
}

/// Which teleport pair a tile belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TeleportKind {
    A,
    B,
}

impl Tile {
    /// Static solidity: true for tiles that always block movement.
    /// Toggle solidity is phase-dependent and lives in the grid layer.
    pub fn is_solid(self) -> bool {
        matches!(
            self,
            Tile::Wall
                | Tile::Breakable
                | Tile::Pushable
                | Tile::PushUp
                | Tile::PushDown
                | Tile::PushLeft
                | Tile::PushRight
        )
    }

    pub fn is_pushable(self) -> bool {
        matches!(
            self,
            Tile::Pushable | Tile::PushUp | Tile::PushDown | Tile::PushLeft | Tile::PushRight
        )
    }

    /// Generic pushables accept any direction; directional variants
    /// accept exactly one.
    pub fn push_allowed(self, dir: Dir) -> bool {
        match self {
            Tile::Pushable => true,
            Tile::PushUp => dir == Dir::Up,
            Tile::PushDown => dir == Dir::Down,
            Tile::PushLeft => dir == Dir::Left,
            Tile::PushRight => dir == Dir::Right,
            _ => false,
        }
    }

    pub fn is_breakable(self) -> bool {
        matches!(self, Tile::Breakable)
    }

    pub fn teleport_kind(self) -> Option<TeleportKind> {
        match self {
            Tile::TeleportA => Some(TeleportKind::A),
            Tile::TeleportB => Some(TeleportKind::B),
            _ => None,
        }
    }

    /// Forced-movement direction for arrow tiles.
    pub fn arrow_dir(self) -> Option<Dir> {
        match self {
            Tile::ArrowUp => Some(Dir::Up),
            Tile::ArrowRight => Some(Dir::Right),
            Tile::ArrowDown => Some(Dir::Down),
            Tile::ArrowLeft => Some(Dir::Left),
            _ => None,
        }
    }

    /// Decode one character of the level alphabet.
    /// Unknown characters degrade to Empty rather than failing the level.
    pub fn from_char(ch: char) -> Tile {
        match ch {
            '0' => Tile::Empty,
            '1' => Tile::Wall,
            '2' => Tile::Pushable,
            '3' => Tile::Breakable,
            '4' => Tile::TeleportA,
            '5' => Tile::TeleportB,
            '6' => Tile::ArrowUp,
            '7' => Tile::ArrowRight,
            '8' => Tile::ArrowDown,
            '9' => Tile::ArrowLeft,
            'A' => Tile::PushUp,
            'B' => Tile::PushDown,
            'C' => Tile::PushLeft,
            'D' => Tile::PushRight,
            'E' => Tile::Toggle,
            _ => Tile::Empty,
        }
    }
}

impl Default for Tile {
    fn default() -> Self {
        Tile::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushable_direction_rules() {
        assert!(Tile::Pushable.push_allowed(Dir::Up));
        assert!(Tile::Pushable.push_allowed(Dir::Left));
        assert!(Tile::PushRight.push_allowed(Dir::Right));
        assert!(!Tile::PushRight.push_allowed(Dir::Left));
        assert!(!Tile::PushUp.push_allowed(Dir::Down));
        assert!(!Tile::Wall.push_allowed(Dir::Up));
    }

    #[test]
    fn solidity_covers_block_tiles() {
        for t in [
            Tile::Wall,
            Tile::Breakable,
            Tile::Pushable,
            Tile::PushUp,
            Tile::PushDown,
            Tile::PushLeft,
            Tile::PushRight,
        ] {
            assert!(t.is_solid(), "{t:?} should be solid");
        }
        for t in [
            Tile::Empty,
            Tile::Broken,
            Tile::TeleportA,
            Tile::TeleportB,
            Tile::ArrowUp,
            Tile::Toggle,
        ] {
            assert!(!t.is_solid(), "{t:?} should not be statically solid");
        }
    }

    #[test]
    fn alphabet_decoding() {
        assert_eq!(Tile::from_char('1'), Tile::Wall);
        assert_eq!(Tile::from_char('4'), Tile::TeleportA);
        assert_eq!(Tile::from_char('9'), Tile::ArrowLeft);
        assert_eq!(Tile::from_char('D'), Tile::PushRight);
        assert_eq!(Tile::from_char('E'), Tile::Toggle);
        // Unknown characters degrade to Empty
        assert_eq!(Tile::from_char('?'), Tile::Empty);
        assert_eq!(Tile::from_char('z'), Tile::Empty);
    }
}
