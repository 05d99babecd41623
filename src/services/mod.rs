//! # Services
//!
//! Contracts for everything the combat core consumes but does not own:
//! the walkability grid, field of view, goal-field pathfinding, the glyph
//! stage, and input. The core depends only on these traits; the default
//! implementations here back the binary and the test suites.

use crate::combat::Tint;
use crate::Position;
use pathfinding::prelude::astar;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Keys the combat core cares about, independent of any input backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Tab,
    Enter,
    Space,
    Escape,
    /// Debug-view toggle; stays live even while an action is animating
    Debug,
}

/// Read-only input state.
pub trait InputSource {
    /// Edge-triggered: true only on the frame the key went down.
    fn has_been_pressed(&self, key: Key) -> bool;

    /// Level-triggered: true while the key is held.
    fn is_pressed(&self, key: Key) -> bool;
}

/// Scripted input for tests; construct one per simulated frame.
#[derive(Debug, Default)]
pub struct QueuedInput {
    pressed: HashSet<Key>,
    held: HashSet<Key>,
}

impl QueuedInput {
    /// Input with the given keys freshly pressed this frame.
    pub fn with_presses(keys: impl IntoIterator<Item = Key>) -> Self {
        let pressed: HashSet<Key> = keys.into_iter().collect();
        let held = pressed.clone();
        Self { pressed, held }
    }
}

impl InputSource for QueuedInput {
    fn has_been_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }

    fn is_pressed(&self, key: Key) -> bool {
        self.held.contains(&key)
    }
}

/// Walkability and sightline queries over the combat map.
///
/// Map generation itself lives elsewhere; combat only ever asks these two
/// questions.
pub trait GridMap {
    fn is_walkable(&self, x: i32, y: i32) -> bool;

    /// Whether sight passes through the cell. Defaults to walkability.
    fn is_transparent(&self, x: i32, y: i32) -> bool {
        self.is_walkable(x, y)
    }
}

/// A rectangular cell grid with a solid border.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SquareGrid {
    width: i32,
    height: i32,
    walkable: Vec<bool>,
}

impl SquareGrid {
    /// An open arena: walkable everywhere except the outer border.
    pub fn arena(width: i32, height: i32) -> Self {
        let mut grid = Self {
            width,
            height,
            walkable: vec![true; (width * height) as usize],
        };
        for x in 0..width {
            grid.set_walkable(x, 0, false);
            grid.set_walkable(x, height - 1, false);
        }
        for y in 0..height {
            grid.set_walkable(0, y, false);
            grid.set_walkable(width - 1, y, false);
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn set_walkable(&mut self, x: i32, y: i32, walkable: bool) {
        if self.in_bounds(x, y) {
            self.walkable[(y * self.width + x) as usize] = walkable;
        }
    }
}

impl GridMap for SquareGrid {
    fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.in_bounds(x, y) && self.walkable[(y * self.width + x) as usize]
    }
}

/// Field-of-view computation over a grid.
pub trait FieldOfView {
    /// Cells visible from the origin within the radius.
    fn compute_visible(
        &self,
        grid: &dyn GridMap,
        x: i32,
        y: i32,
        radius: i32,
    ) -> HashSet<(i32, i32)>;
}

/// Straight-line visibility: a cell is seen when an unobstructed Bresenham
/// line reaches it. Crude next to shadowcasting, but cheap and symmetric
/// enough for a 24x22 arena.
#[derive(Debug, Default)]
pub struct LineOfSight;

impl LineOfSight {
    fn line_clear(grid: &dyn GridMap, x0: i32, y0: i32, x1: i32, y1: i32) -> bool {
        let (mut x, mut y) = (x0, y0);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            if x == x1 && y == y1 {
                return true;
            }
            // Origin never blocks its own sight
            if (x, y) != (x0, y0) && !grid.is_transparent(x, y) {
                return false;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }
}

impl FieldOfView for LineOfSight {
    fn compute_visible(
        &self,
        grid: &dyn GridMap,
        x: i32,
        y: i32,
        radius: i32,
    ) -> HashSet<(i32, i32)> {
        let mut visible = HashSet::new();
        let r2 = radius * radius;
        for cx in (x - radius)..=(x + radius) {
            for cy in (y - radius)..=(y + radius) {
                let (dx, dy) = (cx - x, cy - y);
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                if Self::line_clear(grid, x, y, cx, cy) {
                    visible.insert((cx, cy));
                }
            }
        }
        visible
    }
}

/// A computed path, consumed one step at a time.
#[derive(Debug, Clone)]
pub struct PathCursor {
    cells: VecDeque<Position>,
}

impl PathCursor {
    pub fn new(cells: impl IntoIterator<Item = Position>) -> Self {
        Self {
            cells: cells.into_iter().collect(),
        }
    }

    /// The next cell along the path, or `None` when exhausted.
    pub fn step_forward(&mut self) -> Option<Position> {
        self.cells.pop_front()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Weighted goal-field pathfinding: goals pull, obstacles repel, the
/// service picks the most attractive goal and routes toward it.
pub trait GoalPathfinder {
    fn clear_goals(&mut self);
    fn clear_obstacles(&mut self);
    fn add_goal(&mut self, x: i32, y: i32, weight: i32);
    fn add_obstacle(&mut self, x: i32, y: i32);

    /// A path from the origin to the chosen goal cell, or `None` when no
    /// goal is reachable. The returned cursor excludes the origin.
    fn find_path(&self, grid: &dyn GridMap, from: Position) -> Option<PathCursor>;
}

/// Default goal field: picks the goal minimizing `distance / weight` and
/// runs A* toward it over cardinal neighbors.
#[derive(Debug, Default)]
pub struct WeightedGoalField {
    goals: Vec<(Position, i32)>,
    obstacles: HashSet<(i32, i32)>,
}

impl WeightedGoalField {
    pub fn new() -> Self {
        Self::default()
    }

    fn best_goal(&self, from: Position) -> Option<Position> {
        self.goals
            .iter()
            .map(|&(goal, weight)| {
                let dist = from.manhattan_distance(goal) as f32;
                (goal, dist / weight.max(1) as f32)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(goal, _)| goal)
    }
}

impl GoalPathfinder for WeightedGoalField {
    fn clear_goals(&mut self) {
        self.goals.clear();
    }

    fn clear_obstacles(&mut self) {
        self.obstacles.clear();
    }

    fn add_goal(&mut self, x: i32, y: i32, weight: i32) {
        self.goals.push((Position::new(x, y), weight));
    }

    fn add_obstacle(&mut self, x: i32, y: i32) {
        self.obstacles.insert((x, y));
    }

    fn find_path(&self, grid: &dyn GridMap, from: Position) -> Option<PathCursor> {
        let goal = self.best_goal(from)?;
        let (cells, _cost) = astar(
            &(from.x, from.y),
            |&(x, y)| {
                let obstacles = &self.obstacles;
                Position::new(x, y)
                    .cardinal_adjacent_positions()
                    .into_iter()
                    .filter(|p| {
                        // The goal cell is always enterable; stepping onto
                        // it is how an attack triggers.
                        (p.x, p.y) == (goal.x, goal.y)
                            || (grid.is_walkable(p.x, p.y) && !obstacles.contains(&(p.x, p.y)))
                    })
                    .map(|p| ((p.x, p.y), 1u32))
                    .collect::<Vec<_>>()
            },
            |&(x, y)| Position::new(x, y).manhattan_distance(goal),
            |&(x, y)| (x, y) == (goal.x, goal.y),
        )?;
        Some(PathCursor::new(
            cells
                .into_iter()
                .skip(1)
                .map(|(x, y)| Position::new(x, y)),
        ))
    }
}

/// Display color carried by a glyph; re-exported fighter tint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    pub ch: char,
    pub color: Tint,
}

impl Glyph {
    pub fn new(ch: char, color: Tint) -> Self {
        Self { ch, color }
    }

    /// A plain white glyph.
    pub fn bw(ch: char) -> Self {
        Self {
            ch,
            color: Tint(255, 255, 255),
        }
    }
}

/// Write-only presentation surface. Combat pushes glyphs and text at it
/// and never reads anything back.
pub trait Stage {
    fn set_glyph(&mut self, x: i32, y: i32, glyph: Glyph);
    fn clear_cell(&mut self, x: i32, y: i32);
    fn set_text(&mut self, x: i32, y: i32, text: &str);

    /// Darkens the whole surface by the given factor; used by the
    /// fade-out-and-leave exit.
    fn fade(&mut self, amount: f32);
}

/// Stage that records every write, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingStage {
    pub cells: HashMap<(i32, i32), Glyph>,
    pub texts: Vec<(i32, i32, String)>,
    pub fades: Vec<f32>,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn glyph_at(&self, x: i32, y: i32) -> Option<&Glyph> {
        self.cells.get(&(x, y))
    }

    /// All recorded text lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.texts.iter().map(|(_, _, s)| s.as_str())
    }
}

impl Stage for RecordingStage {
    fn set_glyph(&mut self, x: i32, y: i32, glyph: Glyph) {
        self.cells.insert((x, y), glyph);
    }

    fn clear_cell(&mut self, x: i32, y: i32) {
        self.cells.remove(&(x, y));
    }

    fn set_text(&mut self, x: i32, y: i32, text: &str) {
        self.texts.push((x, y, text.to_string()));
    }

    fn fade(&mut self, amount: f32) {
        self.fades.push(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_border_is_solid() {
        let grid = SquareGrid::arena(10, 8);
        assert!(!grid.is_walkable(0, 0));
        assert!(!grid.is_walkable(9, 7));
        assert!(!grid.is_walkable(5, 0));
        assert!(grid.is_walkable(5, 4));
        assert!(!grid.is_walkable(-1, 4));
    }

    #[test]
    fn test_line_of_sight_stops_at_walls() {
        let mut grid = SquareGrid::arena(12, 12);
        grid.set_walkable(6, 5, false);
        let fov = LineOfSight;
        let visible = fov.compute_visible(&grid, 3, 5, 6);
        assert!(visible.contains(&(5, 5)));
        assert!(visible.contains(&(6, 5))); // the wall itself is seen
        assert!(!visible.contains(&(8, 5))); // but not past it
    }

    #[test]
    fn test_goal_field_prefers_heavier_goals() {
        let field = {
            let mut f = WeightedGoalField::new();
            f.add_goal(8, 5, 1);
            f.add_goal(9, 5, 9);
            f
        };
        let grid = SquareGrid::arena(16, 12);
        let mut path = field
            .find_path(&grid, Position::new(2, 5))
            .expect("open arena must have a path");
        let mut last = Position::new(2, 5);
        while let Some(next) = path.step_forward() {
            last = next;
        }
        assert_eq!(last, Position::new(9, 5));
    }

    #[test]
    fn test_goal_field_routes_around_obstacles() {
        let mut field = WeightedGoalField::new();
        field.add_goal(6, 2, 5);
        for y in 1..=3 {
            field.add_obstacle(4, y);
        }
        let grid = SquareGrid::arena(10, 8);
        let mut path = field
            .find_path(&grid, Position::new(2, 2))
            .expect("detour exists");
        let mut visited = Vec::new();
        while let Some(next) = path.step_forward() {
            visited.push((next.x, next.y));
        }
        assert!(!visited.contains(&(4, 1)));
        assert!(!visited.contains(&(4, 2)));
        assert!(!visited.contains(&(4, 3)));
        assert_eq!(visited.last(), Some(&(6, 2)));
    }

    #[test]
    fn test_goal_field_without_goals_finds_nothing() {
        let field = WeightedGoalField::new();
        let grid = SquareGrid::arena(8, 8);
        assert!(field.find_path(&grid, Position::new(2, 2)).is_none());
    }

    #[test]
    fn test_recording_stage_round_trip() {
        let mut stage = RecordingStage::new();
        stage.set_glyph(3, 4, Glyph::bw('@'));
        stage.set_text(0, 0, "hit for 2");
        stage.fade(0.1);
        assert_eq!(stage.glyph_at(3, 4).map(|g| g.ch), Some('@'));
        stage.clear_cell(3, 4);
        assert!(stage.glyph_at(3, 4).is_none());
        assert_eq!(stage.lines().collect::<Vec<_>>(), vec!["hit for 2"]);
        assert_eq!(stage.fades, vec![0.1]);
    }
}
