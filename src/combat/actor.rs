//! # Combatants
//!
//! Attributes, gear and the unified fighter record shared by party members
//! and enemies. Rather than an inheritance tree, every combatant is the
//! same [`Fighter`] struct: a shared [`CombatantCore`] plus a
//! [`CombatantKind`] tag; the attack-resolution hooks dispatch on the tag
//! and default to doing nothing.

use crate::combat::dice::{stat_bag, DiceRoller};
use crate::combat::pool::{StatusKind, StatusPool};
use crate::combat::resolve::{AttackDie, DefenseDie};
use crate::Position;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for combatants within an encounter.
pub type FighterId = Uuid;

/// Creates a new unique fighter ID.
pub fn new_fighter_id() -> FighterId {
    Uuid::new_v4()
}

/// The four attributes every combatant carries.
///
/// # Examples
///
/// ```
/// use sinfall::Stats;
///
/// let stats = Stats { will: 4, clarity: 7, poise: 2, vigor: 9 };
/// assert_eq!(Stats::modifier(stats.clarity), 1);
/// assert_eq!(Stats::modifier(stats.poise), -1);
/// assert_eq!(stats.score(), 22);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub will: i32,
    pub clarity: i32,
    pub poise: i32,
    pub vigor: i32,
}

impl Stats {
    /// Rolls a fresh attribute set from the bag.
    pub fn roll(dice: &mut dyn DiceRoller) -> Self {
        let [will, clarity, poise, vigor] = stat_bag(dice);
        Self {
            will,
            clarity,
            poise,
            vigor,
        }
    }

    /// The derived modifier step function shared by every attribute.
    pub fn modifier(value: i32) -> i32 {
        match value {
            v if v < 3 => -1,
            v if v < 5 => 0,
            v if v < 8 => 1,
            v if v < 10 => 2,
            _ => 3,
        }
    }

    pub fn will_mod(&self) -> i32 {
        Self::modifier(self.will)
    }

    pub fn clarity_mod(&self) -> i32 {
        Self::modifier(self.clarity)
    }

    pub fn poise_mod(&self) -> i32 {
        Self::modifier(self.poise)
    }

    pub fn vigor_mod(&self) -> i32 {
        Self::modifier(self.vigor)
    }

    /// Sum of all four attributes.
    pub fn score(&self) -> i32 {
        self.will + self.clarity + self.poise + self.vigor
    }
}

/// Heft of a piece of gear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightClass {
    Tiny,
    Small,
    Medium,
    Heavy,
    Large,
}

/// A held weapon. `attack` is the number of d6 it rolls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub attack: i32,
    pub weight: WeightClass,
    pub quality: i32,
}

impl Weapon {
    pub fn new(name: impl Into<String>, attack: i32, weight: WeightClass, quality: i32) -> Self {
        Self {
            name: name.into(),
            attack,
            weight,
            quality,
        }
    }
}

/// Worn armor. `guard` is the number of d6 it rolls; contested ties chip
/// it away permanently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    pub guard: i32,
    pub weight: WeightClass,
    pub quality: i32,
}

impl Armor {
    pub fn new(name: impl Into<String>, guard: i32, weight: WeightClass, quality: i32) -> Self {
        Self {
            name: name.into(),
            guard,
            weight,
            quality,
        }
    }
}

/// Display color for a fighter's glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tint(pub u8, pub u8, pub u8);

/// The four party tints, by member slot.
pub const PARTY_TINTS: [Tint; 4] = [
    Tint(255, 224, 64),  // yellow
    Tint(173, 255, 47),  // green-yellow
    Tint(100, 149, 237), // cornflower
    Tint(205, 92, 92),   // indian red
];

/// What a fighter is, beyond its shared core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatantKind {
    /// A player-controlled party member, by roster slot
    PartyMember { slot: usize },
    /// An AI-controlled enemy carrying an intrinsic sin value
    Enemy { sin: i32, glyph: char },
}

/// Per-encounter positional and turn state for a fighter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    pub x: i32,
    pub y: i32,
    pub initiative: i32,
    pub tint: Tint,
    /// Movement steps left this turn; reset by the preparing phase
    pub move_left: i32,
}

/// Attributes and gear shared by every combatant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantCore {
    pub name: String,
    pub stats: Stats,
    pub pool: StatusPool,
    pub left_weapon: Option<Weapon>,
    pub right_weapon: Option<Weapon>,
    pub armor: Option<Armor>,
}

/// A combat participant: shared core, kind tag, per-encounter state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fighter {
    pub id: FighterId,
    pub core: CombatantCore,
    pub kind: CombatantKind,
    pub state: CombatState,
    pub alive: bool,
}

impl Fighter {
    /// Builds a party member with bag-rolled stats and starter gear.
    ///
    /// Pool capacity derives from Vigor, so the death roll's headroom
    /// (`total - vigor`) is the same for everyone.
    pub fn party_member(slot: usize, name: impl Into<String>, dice: &mut dyn DiceRoller) -> Self {
        let stats = Stats::roll(dice);
        let initiative = dice.d10() + stats.poise_mod();
        let pool = StatusPool::new(stats.vigor + 4).unwrap_or_else(|_| {
            // vigor is always >= 2 out of the bag
            unreachable!("bag-rolled vigor yields positive capacity")
        });
        Self {
            id: new_fighter_id(),
            core: CombatantCore {
                name: name.into(),
                stats,
                pool,
                left_weapon: None,
                right_weapon: Some(Weapon::new("Worn blade", 2, WeightClass::Medium, 2)),
                armor: Some(Armor::new("Travel garb", 1, WeightClass::Small, 1)),
            },
            kind: CombatantKind::PartyMember { slot },
            state: CombatState {
                x: 0,
                y: 0,
                initiative,
                tint: PARTY_TINTS[slot % PARTY_TINTS.len()],
                move_left: 0,
            },
            alive: true,
        }
    }

    /// Builds the stock goblin: rags, a bone dagger, and little else.
    pub fn goblin(dice: &mut dyn DiceRoller) -> Self {
        let stats = Stats::roll(dice);
        let initiative = dice.d10() + stats.poise_mod();
        let pool = StatusPool::new(stats.vigor + 4)
            .unwrap_or_else(|_| unreachable!("bag-rolled vigor yields positive capacity"));
        Self {
            id: new_fighter_id(),
            core: CombatantCore {
                name: "Goblin".to_string(),
                stats,
                pool,
                left_weapon: None,
                right_weapon: Some(Weapon::new(
                    "Bone dagger",
                    dice.roll(1, 4),
                    WeightClass::Tiny,
                    1,
                )),
                armor: Some(Armor::new("Rags", dice.roll(1, 4), WeightClass::Tiny, 1)),
            },
            kind: CombatantKind::Enemy { sin: 2, glyph: 'g' },
            state: CombatState {
                x: 0,
                y: 0,
                initiative,
                tint: Tint(144, 238, 144),
                move_left: 0,
            },
            alive: true,
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.core.stats
    }

    pub fn pool(&self) -> &StatusPool {
        &self.core.pool
    }

    pub fn pool_mut(&mut self) -> &mut StatusPool {
        &mut self.core.pool
    }

    pub fn position(&self) -> Position {
        Position::new(self.state.x, self.state.y)
    }

    pub fn set_position(&mut self, pos: Position) {
        self.state.x = pos.x;
        self.state.y = pos.y;
    }

    pub fn is_enemy(&self) -> bool {
        matches!(self.kind, CombatantKind::Enemy { .. })
    }

    pub fn is_party_member(&self) -> bool {
        matches!(self.kind, CombatantKind::PartyMember { .. })
    }

    /// The intrinsic sin an attacker accrues for felling this fighter.
    pub fn sin_value(&self) -> i32 {
        match self.kind {
            CombatantKind::Enemy { sin, .. } => sin,
            CombatantKind::PartyMember { .. } => 0,
        }
    }

    /// A stunned defender's blocks come up in rolled order.
    pub fn is_stunned(&self) -> bool {
        self.core.pool.contains(StatusKind::Stun)
    }

    // Attack-resolution hooks. Every kind gets a default no-op; a kind that
    // wants to bend the dice overrides its arm of the match.

    /// Attacker-side hook: the attack dice have been built, nothing is
    /// resolved yet.
    pub fn on_attack_roll(
        &self,
        _defender: &Fighter,
        _attack: &mut Vec<AttackDie>,
        _defense: &mut Vec<DefenseDie>,
    ) {
        match self.kind {
            CombatantKind::PartyMember { .. } => {}
            CombatantKind::Enemy { .. } => {}
        }
    }

    /// Defender-side hook: the roll is complete, resolution is about to
    /// begin.
    pub fn on_rolled_attack(
        &self,
        _attacker: &Fighter,
        _attack: &mut Vec<AttackDie>,
        _defense: &mut Vec<DefenseDie>,
    ) {
        match self.kind {
            CombatantKind::PartyMember { .. } => {}
            CombatantKind::Enemy { .. } => {}
        }
    }

    /// Defender-side hook: a die was cleanly outrolled by a defense die.
    pub fn on_successful_block(&mut self, _attack: i32) {
        match self.kind {
            CombatantKind::PartyMember { .. } => {}
            CombatantKind::Enemy { .. } => {}
        }
    }

    /// Defender-side hook: a die was shut out by a critical block.
    pub fn on_attack_blocked(&mut self, _attack: i32) {
        match self.kind {
            CombatantKind::PartyMember { .. } => {}
            CombatantKind::Enemy { .. } => {}
        }
    }

    /// Defender-side hook: wounds landed this resolution.
    pub fn on_wounded(&mut self, _wounds: i32) {
        match self.kind {
            CombatantKind::PartyMember { .. } => {}
            CombatantKind::Enemy { .. } => {}
        }
    }

    /// Attacker-side hook: wounds were dealt this resolution.
    pub fn on_caused_wounds(&mut self, _wounds: i32, _crit: bool) {
        match self.kind {
            CombatantKind::PartyMember { .. } => {}
            CombatantKind::Enemy { .. } => {}
        }
    }
}
