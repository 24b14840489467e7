/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and HUD messages.

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum GameEvent {
    PlayerMoved,
    PlayerBlocked,
    BlockPushed { x: i32, y: i32 },
    BlockLanded { x: i32, y: i32 },
    BlockBroken { x: i32, y: i32 },
    ToggleFlipped { x: i32, y: i32, solid: bool },
    TeleportStarted,
    TeleportFinished,
    BallBounced,
    BallTeleported,
    BallDestroyed { x: i32, y: i32 },
    WoodstockPicked { x: i32, y: i32, remaining: u32 },
    PowerUpRevealed,
    PowerUpCollected,
    PowerUpExpired,
    PortalActivated { x: i32, y: i32 },
    PortalUsed,
    PlayerDefeated,
    LevelCleared,
    TimeLow,
    TimeUp,
}
