//! # Display Management
//!
//! Glyph-grid rendering using macroquad. The combat core never sees any of
//! this; it writes through [`Stage`], and the shared text grid is flushed
//! to the screen once per frame by [`MacroquadRenderer`].

use crate::combat::Tint;
use crate::services::{Glyph, InputSource, Key, Stage};
use macroquad::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Retained presentation buffer: glyph cells, text lines, accumulated fade.
#[derive(Debug, Default)]
pub struct TextGrid {
    pub cells: HashMap<(i32, i32), Glyph>,
    pub texts: HashMap<(i32, i32), String>,
    /// 0.0 = fully lit, 1.0 = fully dark
    pub dim: f32,
}

impl TextGrid {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Cloneable [`Stage`] handle over a shared [`TextGrid`].
#[derive(Clone, Default)]
pub struct SharedTextGrid {
    grid: Rc<RefCell<TextGrid>>,
}

impl SharedTextGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Rc<RefCell<TextGrid>> {
        Rc::clone(&self.grid)
    }
}

impl Stage for SharedTextGrid {
    fn set_glyph(&mut self, x: i32, y: i32, glyph: Glyph) {
        self.grid.borrow_mut().cells.insert((x, y), glyph);
    }

    fn clear_cell(&mut self, x: i32, y: i32) {
        self.grid.borrow_mut().cells.remove(&(x, y));
    }

    fn set_text(&mut self, x: i32, y: i32, text: &str) {
        self.grid
            .borrow_mut()
            .texts
            .insert((x, y), text.to_string());
    }

    fn fade(&mut self, amount: f32) {
        let mut grid = self.grid.borrow_mut();
        grid.dim = (grid.dim + amount).min(1.0);
    }
}

fn tint_color(tint: Tint) -> Color {
    Color::from_rgba(tint.0, tint.1, tint.2, 255)
}

/// Flushes the shared text grid to the screen once per frame.
pub struct MacroquadRenderer {
    grid: Rc<RefCell<TextGrid>>,
    /// Cell size in pixels
    pub cell: f32,
}

impl MacroquadRenderer {
    pub fn new(grid: Rc<RefCell<TextGrid>>) -> Self {
        Self { grid, cell: 24.0 }
    }

    /// Draws every cell and text line, then the fade overlay.
    pub fn draw(&self) {
        let grid = self.grid.borrow();
        let font = self.cell * 0.9;

        for (&(x, y), glyph) in &grid.cells {
            let px = x as f32 * self.cell;
            let py = (y + 1) as f32 * self.cell;
            draw_text(&glyph.ch.to_string(), px, py, font, tint_color(glyph.color));
        }

        for (&(x, y), text) in &grid.texts {
            let px = x as f32 * self.cell;
            let py = (y + 1) as f32 * self.cell;
            draw_text(text, px, py, font * 0.8, LIGHTGRAY);
        }

        if grid.dim > 0.0 {
            draw_rectangle(
                0.0,
                0.0,
                screen_width(),
                screen_height(),
                Color::new(0.0, 0.0, 0.0, grid.dim),
            );
        }
    }
}

/// Keyboard adapter from macroquad key state to the combat [`Key`] set.
#[derive(Debug, Default)]
pub struct MacroquadInput;

fn key_code(key: Key) -> KeyCode {
    match key {
        Key::Up => KeyCode::Up,
        Key::Down => KeyCode::Down,
        Key::Left => KeyCode::Left,
        Key::Right => KeyCode::Right,
        Key::Tab => KeyCode::Tab,
        Key::Enter => KeyCode::Enter,
        Key::Space => KeyCode::Space,
        Key::Escape => KeyCode::Escape,
        Key::Debug => KeyCode::D,
    }
}

impl InputSource for MacroquadInput {
    fn has_been_pressed(&self, key: Key) -> bool {
        is_key_pressed(key_code(key))
    }

    fn is_pressed(&self, key: Key) -> bool {
        is_key_down(key_code(key))
    }
}
