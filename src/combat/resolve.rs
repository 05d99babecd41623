//! # Attack Resolution
//!
//! The dice-pairing algorithm. [`plan_attack`] rolls every die up front and
//! computes the complete numeric outcome as a list of animated resolution
//! steps; [`AttackTask`] then replays those steps through the scheduler,
//! applying pool effects between pauses. Skipping the pauses never changes
//! a number — animation is presentation, not logic.
//!
//! Ordering rules, preserved exactly:
//! attack dice sort descending; defense dice sort descending unless the
//! defender is stunned (then they stay in rolled order and one stun unit is
//! consumed per resolution); dice pair strictly by position; per pair the
//! defender's critical block is checked before the attacker's critical hit;
//! the wound count is the *maximum* margin, stacked once per die that
//! achieved it.

use crate::combat::actor::{Fighter, FighterId};
use crate::combat::dice::DiceRoller;
use crate::combat::encounter::EncounterState;
use crate::combat::pool::StatusKind;
use crate::config;
use crate::scheduler::{Step, Task, TickContext};
use std::collections::VecDeque;

/// Which hand rolled an attack die.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    Left,
    Right,
}

/// One attack die, tagged with its source hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackDie {
    pub value: i32,
    pub hand: Hand,
}

/// One defense die rolled off the defender's armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefenseDie {
    pub value: i32,
}

/// Which participant a pool effect lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Attacker,
    Defender,
}

/// A mutation one resolution step applies when it is replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatEffect {
    /// Best-effort transient spend from the side's pool
    Spend { side: Side, units: i32 },
    AddStatus {
        side: Side,
        kind: StatusKind,
        width: i32,
    },
    ReduceStatus {
        side: Side,
        kind: StatusKind,
        width: i32,
    },
    /// Permanent `guard` loss on the side's armor, floored at zero
    DegradeArmor { side: Side },
}

/// What one resolution step shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttackEvent {
    AttackRolled(Vec<AttackDie>),
    DefenseRolled(Vec<DefenseDie>),
    /// The defender's stun leaves its blocks in rolled order
    StunSquandersBlocks,
    /// Full block, visually distinct from a clean one
    CriticalBlock { pair: usize, attack: i32 },
    /// Armor bypassed for this pair
    CriticalHit { pair: usize, attack: i32 },
    CleanBlock { pair: usize, attack: i32, defense: i32 },
    /// Tied dice; `degraded` when the armor lost a point of guard
    Contested { pair: usize, value: i32, degraded: bool },
    Hit { pair: usize, margin: i32 },
    Unopposed { pair: usize, value: i32 },
    /// Wounds landing on the defender
    Wounds { value: i32, width: i32 },
}

/// One discrete animated unit of a resolution.
#[derive(Debug, Clone)]
pub struct ResolutionStep {
    pub event: AttackEvent,
    pub effects: Vec<CombatEffect>,
    pub pause: f32,
}

/// The numeric result of a resolution, fixed at plan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    /// The maximum margin any die achieved; 0 when nothing landed
    pub wounds: i32,
    /// Wound segment width stacked on the defender: count of maximizing dice
    pub wound_width: i32,
    /// Pair indices of the maximizing dice
    pub maximizers: Vec<usize>,
    pub crit_hits: i32,
    pub crit_blocks: i32,
    pub stun_consumed: bool,
}

/// A fully planned resolution: steps to replay plus the fixed outcome.
#[derive(Debug, Clone)]
pub struct AttackPlan {
    pub steps: Vec<ResolutionStep>,
    pub outcome: AttackOutcome,
}

fn step(event: AttackEvent, effects: Vec<CombatEffect>) -> ResolutionStep {
    ResolutionStep {
        event,
        effects,
        pause: config::STEP_PAUSE,
    }
}

/// Plans a complete attack resolution.
///
/// Pure given the dice source: fixed face sequences produce identical
/// steps, wound values and maximizer sets. Pool and armor mutations are
/// *described* in the returned steps, not applied here.
///
/// Dice are consumed in a fixed order: left-hand weapon dice, right-hand
/// weapon dice, armor guard dice, then per pair a d100 for the critical
/// block, a d100 for the critical hit (only while the attack still
/// stands), and a d10 for a contested tie.
pub fn plan_attack(attacker: &Fighter, defender: &Fighter, dice: &mut dyn DiceRoller) -> AttackPlan {
    let mut attack: Vec<AttackDie> = Vec::new();
    for (hand, weapon) in [
        (Hand::Left, &attacker.core.left_weapon),
        (Hand::Right, &attacker.core.right_weapon),
    ] {
        if let Some(weapon) = weapon {
            for _ in 0..weapon.attack {
                attack.push(AttackDie {
                    value: dice.d6(),
                    hand,
                });
            }
        }
    }

    let mut defense: Vec<DefenseDie> = Vec::new();
    if let Some(armor) = &defender.core.armor {
        for _ in 0..armor.guard {
            defense.push(DefenseDie { value: dice.d6() });
        }
    }

    attacker.on_attack_roll(defender, &mut attack, &mut defense);
    defender.on_rolled_attack(attacker, &mut attack, &mut defense);

    attack.sort_by(|a, b| b.value.cmp(&a.value));

    let stunned = defender.is_stunned();
    if !stunned {
        defense.sort_by(|a, b| b.value.cmp(&a.value));
    }

    let mut steps = Vec::new();
    steps.push(step(AttackEvent::AttackRolled(attack.clone()), Vec::new()));
    if !defense.is_empty() {
        steps.push(step(AttackEvent::DefenseRolled(defense.clone()), Vec::new()));
    }
    if stunned {
        // Exactly one stun unit per resolution, however many pairs follow
        steps.push(step(
            AttackEvent::StunSquandersBlocks,
            vec![CombatEffect::ReduceStatus {
                side: Side::Defender,
                kind: StatusKind::Stun,
                width: 1,
            }],
        ));
    }

    let mut queue: VecDeque<i32> = defense.iter().map(|d| d.value).collect();
    let mut candidates: Vec<(usize, i32)> = Vec::new();
    let mut crit_hits = 0;
    let mut crit_blocks = 0;

    for (pair, die) in attack.iter().enumerate() {
        match queue.pop_front() {
            Some(block) => {
                if dice.d100() <= 10 + defender.stats().poise {
                    crit_blocks += 1;
                    steps.push(step(
                        AttackEvent::CriticalBlock {
                            pair,
                            attack: die.value,
                        },
                        vec![CombatEffect::Spend {
                            side: Side::Defender,
                            units: 1,
                        }],
                    ));
                    continue;
                }

                let attack_value = die.value;
                let mut defense_value = block;
                if attack_value > 0 && dice.d100() <= 10 + attacker.stats().clarity {
                    crit_hits += 1;
                    defense_value = 0;
                    steps.push(step(
                        AttackEvent::CriticalHit {
                            pair,
                            attack: attack_value,
                        },
                        vec![CombatEffect::Spend {
                            side: Side::Attacker,
                            units: 1,
                        }],
                    ));
                }

                if defense_value > attack_value {
                    steps.push(step(
                        AttackEvent::CleanBlock {
                            pair,
                            attack: attack_value,
                            defense: defense_value,
                        },
                        Vec::new(),
                    ));
                } else if defense_value == attack_value && attack_value > 0 {
                    let toughness = defender
                        .core
                        .armor
                        .as_ref()
                        .map_or(0, |a| a.quality + defender.stats().poise_mod());
                    let degraded = dice.d10() > toughness;
                    let effects = if degraded {
                        vec![CombatEffect::DegradeArmor {
                            side: Side::Defender,
                        }]
                    } else {
                        Vec::new()
                    };
                    steps.push(step(
                        AttackEvent::Contested {
                            pair,
                            value: attack_value,
                            degraded,
                        },
                        effects,
                    ));
                } else if attack_value > defense_value {
                    candidates.push((pair, attack_value - defense_value));
                    steps.push(step(
                        AttackEvent::Hit {
                            pair,
                            margin: attack_value - defense_value,
                        },
                        Vec::new(),
                    ));
                } else {
                    // Both sides at zero; nothing to show for it
                    steps.push(step(
                        AttackEvent::CleanBlock {
                            pair,
                            attack: attack_value,
                            defense: defense_value,
                        },
                        Vec::new(),
                    ));
                }
            }
            None => {
                candidates.push((pair, die.value));
                steps.push(step(
                    AttackEvent::Unopposed {
                        pair,
                        value: die.value,
                    },
                    Vec::new(),
                ));
            }
        }
    }

    // Not the sum: the single best margin wins, stacked once per die that
    // reached it.
    let wounds = candidates.iter().map(|&(_, m)| m).max().unwrap_or(0);
    let (maximizers, wound_width) = if wounds > 0 {
        let maximizers: Vec<usize> = candidates
            .iter()
            .filter(|&&(_, m)| m == wounds)
            .map(|&(pair, _)| pair)
            .collect();
        let width = maximizers.len() as i32;
        steps.push(step(
            AttackEvent::Wounds {
                value: wounds,
                width,
            },
            vec![CombatEffect::AddStatus {
                side: Side::Defender,
                kind: StatusKind::Wound,
                width,
            }],
        ));
        (maximizers, width)
    } else {
        (Vec::new(), 0)
    };

    AttackPlan {
        steps,
        outcome: AttackOutcome {
            wounds,
            wound_width,
            maximizers,
            crit_hits,
            crit_blocks,
            stun_consumed: stunned,
        },
    }
}

/// Result of the post-wound death draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathRoll {
    pub roll: i32,
    pub died: bool,
}

/// Draws the death check: `uniform(0, total - vigor) < wounds`.
///
/// A defender whose vigor covers its whole pool has no headroom to die in;
/// `max <= 0` deterministically survives and draws nothing.
pub fn death_roll(total: i32, vigor: i32, wounds: i32, dice: &mut dyn DiceRoller) -> DeathRoll {
    let max = total - vigor;
    if max <= 0 {
        return DeathRoll {
            roll: 0,
            died: false,
        };
    }
    let roll = dice.below(max);
    DeathRoll {
        roll,
        died: roll < wounds,
    }
}

enum AttackStage {
    Planning,
    Replaying,
    Settling,
}

/// Scheduled replay of a planned attack.
///
/// The plan is built on the task's first step (when the world is in hand)
/// and then applied one resolution step per scheduler advance, pausing
/// between them. Clearing the scheduler mid-replay abandons the remaining
/// steps; effects already applied stay applied.
pub struct AttackTask {
    attacker: FighterId,
    defender: FighterId,
    plan: Option<AttackPlan>,
    cursor: usize,
    stage: AttackStage,
}

impl AttackTask {
    pub fn new(attacker: FighterId, defender: FighterId) -> Self {
        Self {
            attacker,
            defender,
            plan: None,
            cursor: 0,
            stage: AttackStage::Planning,
        }
    }
}

impl Task<EncounterState> for AttackTask {
    fn step(&mut self, world: &mut EncounterState, _ctx: &TickContext) -> Step<EncounterState> {
        match self.stage {
            AttackStage::Planning => {
                let Some(plan) = world.plan_attack(self.attacker, self.defender) else {
                    log::warn!("attack dropped: a participant left the encounter");
                    return Step::Done;
                };
                self.plan = Some(plan);
                self.stage = AttackStage::Replaying;
                Step::Continue
            }
            AttackStage::Replaying => {
                let Some(plan) = &self.plan else {
                    return Step::Done;
                };
                if self.cursor >= plan.steps.len() {
                    self.stage = AttackStage::Settling;
                    return Step::Continue;
                }
                let resolution = plan.steps[self.cursor].clone();
                self.cursor += 1;
                let pause = resolution.pause;
                world.apply_resolution_step(self.attacker, self.defender, &resolution);
                if self.cursor >= plan.steps.len() {
                    self.stage = AttackStage::Settling;
                }
                Step::WaitSeconds(pause)
            }
            AttackStage::Settling => {
                if let Some(plan) = self.plan.take() {
                    world.settle_attack(self.attacker, self.defender, &plan.outcome);
                }
                Step::Done
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::actor::{Armor, CombatState, CombatantCore, CombatantKind, Fighter, Stats,
        Tint, Weapon, WeightClass, new_fighter_id};
    use crate::combat::dice::ScriptedDice;
    use crate::combat::pool::StatusPool;

    const NO_CRIT: i32 = 100;

    fn fighter(
        kind: CombatantKind,
        stats: Stats,
        weapon_attack: Option<i32>,
        armor_guard: Option<i32>,
    ) -> Fighter {
        Fighter {
            id: new_fighter_id(),
            core: CombatantCore {
                name: "test".into(),
                stats,
                pool: StatusPool::new(10).unwrap(),
                left_weapon: None,
                right_weapon: weapon_attack
                    .map(|a| Weapon::new("blade", a, WeightClass::Medium, 2)),
                armor: armor_guard.map(|g| Armor::new("mail", g, WeightClass::Medium, 2)),
            },
            kind,
            state: CombatState {
                x: 0,
                y: 0,
                initiative: 0,
                tint: Tint(255, 255, 255),
                move_left: 0,
            },
            alive: true,
        }
    }

    fn flat_stats() -> Stats {
        // All modifiers 0, crit thresholds 10 + 4 = 14
        Stats {
            will: 4,
            clarity: 4,
            poise: 4,
            vigor: 4,
        }
    }

    fn party(weapon: Option<i32>, armor: Option<i32>) -> Fighter {
        fighter(CombatantKind::PartyMember { slot: 0 }, flat_stats(), weapon, armor)
    }

    fn enemy(weapon: Option<i32>, armor: Option<i32>) -> Fighter {
        fighter(
            CombatantKind::Enemy { sin: 2, glyph: 'g' },
            flat_stats(),
            weapon,
            armor,
        )
    }

    #[test]
    fn test_one_standout_die_beats_the_paired_one() {
        // Attack [5, 2] vs defense [4]: (5 vs 4) margins 1, the 2 is
        // unopposed for 2. Max margin 2, one die flagged.
        let attacker = party(Some(2), None);
        let defender = enemy(None, Some(1));
        let mut dice = ScriptedDice::new([5, 2, 4, NO_CRIT, NO_CRIT]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert_eq!(plan.outcome.wounds, 2);
        assert_eq!(plan.outcome.wound_width, 1);
        assert_eq!(plan.outcome.maximizers, vec![1]);
        assert_eq!(dice.left(), 0);
    }

    #[test]
    fn test_wound_selection_counts_every_maximizer() {
        // Unopposed margins [3, 3, 1]: wounds 3, exactly two dice flagged.
        let attacker = party(Some(3), None);
        let defender = enemy(None, None);
        let mut dice = ScriptedDice::new([3, 3, 1]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert_eq!(plan.outcome.wounds, 3);
        assert_eq!(plan.outcome.wound_width, 2);
        assert_eq!(plan.outcome.maximizers.len(), 2);
    }

    #[test]
    fn test_plan_is_deterministic_for_fixed_dice() {
        let attacker = party(Some(2), None);
        let defender = enemy(None, Some(2));
        let script = [5, 3, 2, 6, NO_CRIT, NO_CRIT, NO_CRIT, NO_CRIT];
        let a = plan_attack(&attacker, &defender, &mut ScriptedDice::new(script));
        let b = plan_attack(&attacker, &defender, &mut ScriptedDice::new(script));
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.steps.len(), b.steps.len());
    }

    #[test]
    fn test_stunned_defense_stays_in_rolled_order() {
        // Guard rolls [1, 6]. Sorted it would block the 4 with the 6;
        // stunned, the 1 comes up first and the 4 punches through.
        let attacker = party(Some(2), None);
        let mut defender = enemy(None, Some(2));
        defender.pool_mut().add_status(StatusKind::Stun, 2);

        let mut dice = ScriptedDice::new([4, 2, 1, 6, NO_CRIT, NO_CRIT, NO_CRIT, NO_CRIT]);
        let plan = plan_attack(&attacker, &defender, &mut dice);

        assert!(plan.outcome.stun_consumed);
        assert_eq!(plan.outcome.wounds, 3); // 4 vs 1
        let stun_cuts: Vec<_> = plan
            .steps
            .iter()
            .flat_map(|s| &s.effects)
            .filter(|e| {
                matches!(
                    e,
                    CombatEffect::ReduceStatus {
                        kind: StatusKind::Stun,
                        ..
                    }
                )
            })
            .collect();
        assert_eq!(stun_cuts.len(), 1, "one stun unit per resolution");
    }

    #[test]
    fn test_sorted_defense_blocks_the_best_die() {
        let attacker = party(Some(2), None);
        let defender = enemy(None, Some(2));
        // Same faces as the stunned case, defender clear-headed: defense
        // sorts to [6, 1]; 4 vs 6 blocks, 2 vs 1 lands for 1.
        let mut dice = ScriptedDice::new([4, 2, 1, 6, NO_CRIT, NO_CRIT, NO_CRIT, NO_CRIT]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert!(!plan.outcome.stun_consumed);
        assert_eq!(plan.outcome.wounds, 1);
    }

    #[test]
    fn test_critical_block_shuts_out_the_pair() {
        let attacker = party(Some(1), None);
        let defender = enemy(None, Some(1));
        // d100 = 1 <= 10 + poise: critical block. The 6 contributes nothing.
        let mut dice = ScriptedDice::new([6, 2, 1]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert_eq!(plan.outcome.wounds, 0);
        assert_eq!(plan.outcome.crit_blocks, 1);
        let spends: Vec<_> = plan
            .steps
            .iter()
            .flat_map(|s| &s.effects)
            .filter(|e| {
                matches!(
                    e,
                    CombatEffect::Spend {
                        side: Side::Defender,
                        units: 1
                    }
                )
            })
            .collect();
        assert_eq!(spends.len(), 1);
    }

    #[test]
    fn test_critical_hit_bypasses_armor() {
        let attacker = party(Some(1), None);
        let defender = enemy(None, Some(1));
        // Block fails (100), crit lands (1): 3 vs 6 becomes 3 vs 0.
        let mut dice = ScriptedDice::new([3, 6, NO_CRIT, 1]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert_eq!(plan.outcome.crit_hits, 1);
        assert_eq!(plan.outcome.wounds, 3);
        assert!(plan
            .steps
            .iter()
            .flat_map(|s| &s.effects)
            .any(|e| matches!(
                e,
                CombatEffect::Spend {
                    side: Side::Attacker,
                    units: 1
                }
            )));
    }

    #[test]
    fn test_contested_tie_can_degrade_armor() {
        let attacker = party(Some(1), None);
        let defender = enemy(None, Some(1));
        // 4 vs 4, no crits; d10 = 10 beats quality 2 + poise mod 0.
        let mut dice = ScriptedDice::new([4, 4, NO_CRIT, NO_CRIT, 10]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert_eq!(plan.outcome.wounds, 0);
        assert!(plan
            .steps
            .iter()
            .flat_map(|s| &s.effects)
            .any(|e| matches!(e, CombatEffect::DegradeArmor { .. })));
    }

    #[test]
    fn test_contested_tie_can_hold() {
        let attacker = party(Some(1), None);
        let defender = enemy(None, Some(1));
        // d10 = 1 under quality 2: the armor holds, nothing degrades.
        let mut dice = ScriptedDice::new([4, 4, NO_CRIT, NO_CRIT, 1]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert!(!plan
            .steps
            .iter()
            .flat_map(|s| &s.effects)
            .any(|e| matches!(e, CombatEffect::DegradeArmor { .. })));
    }

    #[test]
    fn test_clean_block_contributes_nothing() {
        let attacker = party(Some(1), None);
        let defender = enemy(None, Some(1));
        let mut dice = ScriptedDice::new([2, 5, NO_CRIT, NO_CRIT]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert_eq!(plan.outcome.wounds, 0);
        assert!(plan
            .steps
            .iter()
            .any(|s| matches!(s.event, AttackEvent::CleanBlock { .. })));
    }

    #[test]
    fn test_no_weapons_means_no_dice_and_no_wounds() {
        let attacker = party(None, None);
        let defender = enemy(None, Some(1));
        let mut dice = ScriptedDice::new([4]);
        let plan = plan_attack(&attacker, &defender, &mut dice);
        assert_eq!(plan.outcome.wounds, 0);
        assert!(plan.outcome.maximizers.is_empty());
    }

    #[test]
    fn test_death_roll_guards_empty_range() {
        let mut dice = ScriptedDice::new([]);
        let result = death_roll(4, 6, 3, &mut dice);
        assert!(!result.died);
        assert_eq!(result.roll, 0);
        let result = death_roll(5, 5, 3, &mut dice);
        assert!(!result.died);
    }

    #[test]
    fn test_death_roll_compares_against_wounds() {
        let mut dice = ScriptedDice::new([2]);
        let result = death_roll(10, 4, 3, &mut dice);
        assert!(result.died);
        assert_eq!(result.roll, 2);

        let mut dice = ScriptedDice::new([5]);
        let result = death_roll(10, 4, 3, &mut dice);
        assert!(!result.died);
    }
}
