//! # Status Pools
//!
//! The action point bar carried by every combatant. A pool has a fixed
//! capacity; capacity is eaten from two sides at once: typed status segments
//! (wounds, stun, sin and friends) consume it for as long as the condition
//! lasts, and transient spending (movement, critical rolls) reserves it
//! until the next preparing phase releases it.
//!
//! The bar renderer reads `remaining`/`total` and walks [`StatusPool::segments`]
//! in insertion order, left to right, after the always-present base
//! indicator.

use crate::{SinfallError, SinfallResult};
use serde::{Deserialize, Serialize};

/// The typed conditions a status segment can represent.
///
/// At most one segment of each kind lives in a pool; stacking a kind grows
/// its segment instead of adding a second one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Lasting injury; width equals the number of maximizing attack dice
    /// from each resolution that caused it
    Wound,
    /// Dazed; a stunned defender's blocks come up in rolled order
    Stun,
    /// Accrued by an attacker on defeating an enemy
    Sin,
    Fire,
    Poison,
    Tired,
    Frozen,
    Insanity,
}

impl StatusKind {
    /// Natural lifetime of a segment of this kind, in seconds.
    ///
    /// `None` means the condition persists until combat logic removes it.
    pub fn expires_after(self) -> Option<f32> {
        match self {
            StatusKind::Wound | StatusKind::Stun | StatusKind::Sin => None,
            StatusKind::Fire => Some(20.0),
            StatusKind::Poison => Some(30.0),
            StatusKind::Tired => Some(45.0),
            StatusKind::Frozen => Some(15.0),
            StatusKind::Insanity => Some(60.0),
        }
    }

    /// One-character marker used by the bar renderer.
    pub fn sigil(self) -> char {
        match self {
            StatusKind::Wound => '!',
            StatusKind::Stun => '*',
            StatusKind::Sin => '&',
            StatusKind::Fire => '^',
            StatusKind::Poison => '~',
            StatusKind::Tired => 'z',
            StatusKind::Frozen => '#',
            StatusKind::Insanity => '?',
        }
    }
}

/// A named, resizable block of consumed capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSegment {
    pub kind: StatusKind,
    pub width: i32,
    /// Seconds this segment has existed, advanced by [`StatusPool::tick`]
    pub age: f32,
}

/// A fixed-capacity action point bar with typed status segments.
///
/// Invariant: `0 <= spent` and `consumed + spent <= capacity` at all times;
/// every live segment has `width > 0`.
///
/// # Examples
///
/// ```
/// use sinfall::{StatusKind, StatusPool};
///
/// let mut pool = StatusPool::new(10).unwrap();
/// pool.add_status(StatusKind::Wound, 4);
/// assert_eq!(pool.remaining(), 6);
/// assert!(pool.spend(5));
/// assert_eq!(pool.remaining(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPool {
    capacity: i32,
    consumed: i32,
    spent: i32,
    segments: Vec<StatusSegment>,
}

impl StatusPool {
    /// Creates a pool with the given total capacity.
    ///
    /// Rejects non-positive capacities instead of carrying a bar that can
    /// never satisfy its own invariant.
    pub fn new(capacity: i32) -> SinfallResult<Self> {
        if capacity <= 0 {
            return Err(SinfallError::InvalidConfiguration(format!(
                "pool capacity must be positive, got {}",
                capacity
            )));
        }
        Ok(Self {
            capacity,
            consumed: 0,
            spent: 0,
            segments: Vec::new(),
        })
    }

    /// Total capacity of the bar.
    pub fn total(&self) -> i32 {
        self.capacity
    }

    /// Capacity neither consumed by statuses nor reserved by spending.
    pub fn remaining(&self) -> i32 {
        self.capacity - self.consumed - self.spent
    }

    /// Capacity currently reserved by transient spending.
    pub fn spent(&self) -> i32 {
        self.spent
    }

    /// Capacity currently consumed by status segments.
    pub fn consumed(&self) -> i32 {
        self.consumed
    }

    /// Reserves up to `n` units of available capacity.
    ///
    /// Fails only when nothing is available; otherwise the request is
    /// clamped to what remains and some amount is always reserved.
    pub fn spend(&mut self, n: i32) -> bool {
        if self.remaining() == 0 {
            return false;
        }
        let n = n.clamp(0, self.remaining());
        self.spent += n;
        true
    }

    /// Releases up to `n` previously reserved units. Never fails.
    pub fn free(&mut self, n: i32) {
        self.spent -= n.clamp(0, self.spent);
    }

    /// Releases the entire transient reservation.
    pub fn free_all(&mut self) {
        self.spent = 0;
    }

    /// Stacks `width` units of `kind` onto the bar.
    ///
    /// No-op when nothing is available; otherwise the width is clamped to
    /// the available capacity. An existing segment of the same kind grows,
    /// keeping its place in the bar.
    pub fn add_status(&mut self, kind: StatusKind, width: i32) {
        if self.remaining() == 0 {
            return;
        }
        let width = width.clamp(0, self.remaining());
        if width == 0 {
            return;
        }
        self.consumed += width;

        if let Some(segment) = self.segments.iter_mut().find(|s| s.kind == kind) {
            segment.width += width;
            return;
        }
        self.segments.push(StatusSegment {
            kind,
            width,
            age: 0.0,
        });
    }

    /// Shrinks the segment of `kind` by up to `width`, releasing capacity.
    ///
    /// No-op when no such segment exists; the segment is dropped when its
    /// width reaches zero.
    pub fn reduce_status(&mut self, kind: StatusKind, width: i32) {
        let Some(idx) = self.segments.iter().position(|s| s.kind == kind) else {
            return;
        };
        let width = width.clamp(0, self.segments[idx].width);
        self.segments[idx].width -= width;
        self.consumed -= width;
        if self.segments[idx].width == 0 {
            self.segments.remove(idx);
        }
    }

    /// Whether a segment of `kind` is live.
    pub fn contains(&self, kind: StatusKind) -> bool {
        self.segments.iter().any(|s| s.kind == kind)
    }

    /// Width of the segment of `kind`, or 0 when absent.
    pub fn width_of(&self, kind: StatusKind) -> i32 {
        self.segments
            .iter()
            .find(|s| s.kind == kind)
            .map_or(0, |s| s.width)
    }

    /// Segments in insertion order, for the bar renderer.
    pub fn segments(&self) -> impl Iterator<Item = &StatusSegment> {
        self.segments.iter()
    }

    /// Advances segment ages and expires kinds with a natural lifetime.
    pub fn tick(&mut self, dt: f32) {
        let mut expired = Vec::new();
        for segment in &mut self.segments {
            segment.age += dt;
            if let Some(lifetime) = segment.kind.expires_after() {
                if segment.age >= lifetime {
                    expired.push((segment.kind, segment.width));
                }
            }
        }
        for (kind, width) in expired {
            log::debug!("status {:?} ran its course ({} units)", kind, width);
            self.reduce_status(kind, width);
        }
    }
}
