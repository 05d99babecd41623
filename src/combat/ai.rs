//! # Enemy AI
//!
//! Greedy pursuit: every living party member is a goal weighted by Vigor,
//! every other enemy is an obstacle, and each enemy walks its path until it
//! runs out of will, action points, or room — or bumps into a party member
//! and swings instead.
//!
//! The whole enemy phase is one scheduled batch task; each movement step is
//! an animation beat, and a bump-attack suspends the batch on a nested
//! attack task.

use crate::combat::actor::FighterId;
use crate::combat::encounter::EncounterState;
use crate::combat::resolve::AttackTask;
use crate::config;
use crate::scheduler::{Step, Task, TickContext};
use crate::services::PathCursor;
use std::collections::VecDeque;

struct EnemyPlan {
    id: FighterId,
    path: PathCursor,
    steps_left: i32,
}

/// One enemy phase: every living enemy acts once, in the order given at
/// submission (the encounter hands them over sorted by initiative).
pub struct EnemyTurnTask {
    queue: VecDeque<FighterId>,
    current: Option<EnemyPlan>,
}

impl EnemyTurnTask {
    pub fn new(order: impl IntoIterator<Item = FighterId>) -> Self {
        Self {
            queue: order.into_iter().collect(),
            current: None,
        }
    }
}

impl Task<EncounterState> for EnemyTurnTask {
    fn step(&mut self, world: &mut EncounterState, _ctx: &TickContext) -> Step<EncounterState> {
        let Some(plan) = &mut self.current else {
            // Pick the next enemy and plan its pursuit.
            let Some(id) = self.queue.pop_front() else {
                return Step::Done;
            };
            let Some(enemy) = world.fighter(id) else {
                return Step::Continue;
            };
            if !enemy.alive {
                return Step::Continue;
            }
            let will = enemy.stats().will;
            let name = enemy.core.name.clone();
            match world.request_path_for(id) {
                Some(path) => {
                    self.current = Some(EnemyPlan {
                        id,
                        path,
                        steps_left: will,
                    });
                }
                None => {
                    // Recoverable: this enemy just forfeits its turn.
                    log::warn!("{} found no path and forfeits its turn", name);
                }
            }
            return Step::Continue;
        };

        if plan.steps_left == 0 {
            self.current = None;
            return Step::Continue;
        }
        let out_of_points = world
            .fighter(plan.id)
            .map_or(true, |f| f.pool().remaining() == 0);
        if out_of_points {
            // Truncates movement, does not fail the turn
            self.current = None;
            return Step::Continue;
        }

        let Some(next) = plan.path.step_forward() else {
            self.current = None;
            return Step::Continue;
        };

        if let Some(target) = world.party_member_at(next) {
            let attacker = plan.id;
            self.current = None;
            return Step::WaitFor(Box::new(AttackTask::new(attacker, target)));
        }

        if world.fighter_at(next).is_some() {
            // Another enemy wandered onto the planned route; give way.
            self.current = None;
            return Step::Continue;
        }

        let id = plan.id;
        plan.steps_left -= 1;
        world.move_fighter(id, next);
        Step::WaitSeconds(config::MOVE_PAUSE)
    }
}
