//! # Rendering Module
//!
//! The macroquad-backed presentation: a retained text grid the combat core
//! writes into through the [`Stage`](crate::Stage) trait, a renderer that
//! flushes it to the screen each frame, and the keyboard adapter.

pub mod display;

pub use display::*;
