pub mod entities;
pub mod event;
pub mod grid;
pub mod level;
pub mod step;
pub mod world;
