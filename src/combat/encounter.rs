//! # Encounter
//!
//! Owns everything for the duration of one combat: the fighters and their
//! rosters, the scheduler, the phase machine, and the service handles. The
//! frame loop calls [`Encounter::update`] once per frame; everything else
//! happens in here.

use crate::combat::actor::{CombatantKind, Fighter, FighterId};
use crate::combat::ai::EnemyTurnTask;
use crate::combat::dice::DiceRoller;
use crate::combat::phase::{Phase, PhaseMachine, SubPhase};
use crate::combat::pool::StatusKind;
use crate::combat::resolve::{
    death_roll, plan_attack, AttackEvent, AttackOutcome, AttackPlan, AttackTask, CombatEffect,
    ResolutionStep, Side,
};
use crate::combat::{Direction, Position};
use crate::scheduler::{Scheduler, Step, Task, TickContext};
use crate::services::{FieldOfView, Glyph, GoalPathfinder, GridMap, InputSource, Key, PathCursor,
    Stage};
use crate::{config, SinfallError, SinfallResult};
use std::collections::{HashMap, HashSet};

/// Everything scheduled tasks are allowed to touch: fighters, dice, the
/// service handles, and the presentation surface.
pub struct EncounterState {
    pub fighters: HashMap<FighterId, Fighter>,
    /// Party roster in slot order
    pub party: Vec<FighterId>,
    /// Living enemy roster
    pub enemies: Vec<FighterId>,
    pub dice: Box<dyn DiceRoller>,
    pub grid: Box<dyn GridMap>,
    pub fov: Box<dyn FieldOfView>,
    pub pathfinder: Box<dyn GoalPathfinder>,
    pub stage: Box<dyn Stage>,
    /// Cells any party member can currently see
    pub visible: HashSet<(i32, i32)>,
    /// Index into `party` of the member taking orders
    pub selected: usize,
    pub debug_view: bool,
    bounds: (i32, i32),
    messages: Vec<String>,
}

impl EncounterState {
    pub fn fighter(&self, id: FighterId) -> Option<&Fighter> {
        self.fighters.get(&id)
    }

    pub fn fighter_mut(&mut self, id: FighterId) -> Option<&mut Fighter> {
        self.fighters.get_mut(&id)
    }

    /// The living fighter standing on the cell, if any.
    pub fn fighter_at(&self, pos: Position) -> Option<FighterId> {
        self.party
            .iter()
            .chain(self.enemies.iter())
            .copied()
            .find(|id| {
                self.fighters
                    .get(id)
                    .is_some_and(|f| f.alive && f.position() == pos)
            })
    }

    pub fn party_member_at(&self, pos: Position) -> Option<FighterId> {
        self.fighter_at(pos)
            .filter(|id| self.fighters.get(id).is_some_and(|f| f.is_party_member()))
    }

    pub fn enemy_at(&self, pos: Position) -> Option<FighterId> {
        self.fighter_at(pos)
            .filter(|id| self.fighters.get(id).is_some_and(|f| f.is_enemy()))
    }

    /// Pushes a line to the message strip.
    pub fn say(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{}", text);
        self.stage
            .set_text(0, self.bounds.1 + config::PARTY_SIZE as i32 + 3, &text);
        self.messages.push(text);
    }

    /// All messages said so far, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Rolls and fixes a complete attack; `None` when a participant is gone.
    pub fn plan_attack(&mut self, attacker: FighterId, defender: FighterId) -> Option<AttackPlan> {
        let attacker = self.fighters.get(&attacker)?;
        let defender = self.fighters.get(&defender)?;
        if !attacker.alive || !defender.alive {
            return None;
        }
        Some(plan_attack(attacker, defender, self.dice.as_mut()))
    }

    /// Applies one animated resolution step: pool effects first, then the
    /// reveal.
    pub fn apply_resolution_step(
        &mut self,
        attacker: FighterId,
        defender: FighterId,
        step: &ResolutionStep,
    ) {
        for effect in &step.effects {
            let target = |side: &Side| match side {
                Side::Attacker => attacker,
                Side::Defender => defender,
            };
            match effect {
                CombatEffect::Spend { side, units } => {
                    if let Some(fighter) = self.fighter_mut(target(side)) {
                        fighter.pool_mut().spend(*units);
                    }
                }
                CombatEffect::AddStatus { side, kind, width } => {
                    if let Some(fighter) = self.fighter_mut(target(side)) {
                        fighter.pool_mut().add_status(*kind, *width);
                    }
                }
                CombatEffect::ReduceStatus { side, kind, width } => {
                    if let Some(fighter) = self.fighter_mut(target(side)) {
                        fighter.pool_mut().reduce_status(*kind, *width);
                    }
                }
                CombatEffect::DegradeArmor { side } => {
                    if let Some(fighter) = self.fighter_mut(target(side)) {
                        if let Some(armor) = fighter.core.armor.as_mut() {
                            armor.guard = (armor.guard - 1).max(0);
                        }
                    }
                }
            }
        }
        self.present_event(attacker, defender, &step.event);
    }

    fn present_event(&mut self, attacker: FighterId, defender: FighterId, event: &AttackEvent) {
        let name = |state: &Self, id: FighterId| {
            state
                .fighter(id)
                .map_or_else(|| "someone".to_string(), |f| f.core.name.clone())
        };
        match event {
            AttackEvent::AttackRolled(dice) => {
                let faces: Vec<String> = dice.iter().map(|d| d.value.to_string()).collect();
                let line = format!("{} attacks: [{}]", name(self, attacker), faces.join(" "));
                self.say(line);
            }
            AttackEvent::DefenseRolled(dice) => {
                let faces: Vec<String> = dice.iter().map(|d| d.value.to_string()).collect();
                let line = format!("{} guards: [{}]", name(self, defender), faces.join(" "));
                self.say(line);
            }
            AttackEvent::StunSquandersBlocks => {
                let line = format!("{} is stunned and guards blindly", name(self, defender));
                self.say(line);
            }
            AttackEvent::CriticalBlock { attack, .. } => {
                let line = format!("{} turns the {} aside completely!", name(self, defender), attack);
                self.say(line);
                if let Some(fighter) = self.fighter_mut(defender) {
                    fighter.on_attack_blocked(*attack);
                }
            }
            AttackEvent::CriticalHit { attack, .. } => {
                let line = format!("{} slips a {} straight through!", name(self, attacker), attack);
                self.say(line);
            }
            AttackEvent::CleanBlock { attack, .. } => {
                let line = format!("{} blocks", name(self, defender));
                self.say(line);
                if let Some(fighter) = self.fighter_mut(defender) {
                    fighter.on_successful_block(*attack);
                }
            }
            AttackEvent::Contested { degraded, .. } => {
                let line = if *degraded {
                    format!("{}'s armor buckles", name(self, defender))
                } else {
                    format!("{}'s armor holds", name(self, defender))
                };
                self.say(line);
            }
            AttackEvent::Hit { margin, .. } => {
                self.say(format!("a hit slips through by {}", margin));
            }
            AttackEvent::Unopposed { value, .. } => {
                self.say(format!("an unopposed {} lands", value));
            }
            AttackEvent::Wounds { value, width } => {
                let line = format!(
                    "{} takes {} ({} deep)",
                    name(self, defender),
                    if *width == 1 { "a wound" } else { "wounds" },
                    value
                );
                self.say(line);
            }
        }
    }

    /// Fires the wound hooks and runs the death check once the replay is
    /// finished. Only AI-controlled defenders can die.
    pub fn settle_attack(
        &mut self,
        attacker: FighterId,
        defender: FighterId,
        outcome: &AttackOutcome,
    ) {
        if outcome.wounds > 0 {
            let crit = outcome.crit_hits > 0;
            if let Some(fighter) = self.fighter_mut(defender) {
                fighter.on_wounded(outcome.wounds);
            }
            if let Some(fighter) = self.fighter_mut(attacker) {
                fighter.on_caused_wounds(outcome.wounds, crit);
            }
        }

        let (total, vigor, wounds, sin, pos, fallen) = {
            let Some(def) = self.fighter(defender) else {
                return;
            };
            if !def.is_enemy() || !def.alive {
                return;
            }
            (
                def.pool().total(),
                def.stats().vigor,
                def.pool().width_of(StatusKind::Wound),
                def.sin_value(),
                def.position(),
                def.core.name.clone(),
            )
        };
        let result = death_roll(total, vigor, wounds, self.dice.as_mut());
        if !result.died {
            return;
        }
        if let Some(fighter) = self.fighter_mut(defender) {
            fighter.pool_mut().reduce_status(StatusKind::Wound, result.roll);
            fighter.pool_mut().add_status(StatusKind::Stun, 1);
            fighter.alive = false;
        }
        if let Some(fighter) = self.fighter_mut(attacker) {
            fighter.pool_mut().add_status(StatusKind::Sin, sin);
        }
        self.enemies.retain(|&id| id != defender);
        self.stage.clear_cell(pos.x, pos.y);
        self.say(format!("{} falls", fallen));
    }

    /// Builds the goal field for one enemy and asks for a path.
    pub fn request_path_for(&mut self, id: FighterId) -> Option<PathCursor> {
        let from = self.fighter(id)?.position();
        self.pathfinder.clear_goals();
        self.pathfinder.clear_obstacles();
        for member in &self.party {
            if let Some(fighter) = self.fighters.get(member) {
                if fighter.alive {
                    let pos = fighter.position();
                    self.pathfinder.add_goal(pos.x, pos.y, fighter.stats().vigor);
                }
            }
        }
        for other in &self.enemies {
            if *other == id {
                continue;
            }
            if let Some(fighter) = self.fighters.get(other) {
                if fighter.alive {
                    let pos = fighter.position();
                    self.pathfinder.add_obstacle(pos.x, pos.y);
                }
            }
        }
        self.pathfinder.find_path(self.grid.as_ref(), from)
    }

    /// Moves a fighter one cell, spending one action point.
    pub fn move_fighter(&mut self, id: FighterId, to: Position) {
        let Some(fighter) = self.fighters.get_mut(&id) else {
            return;
        };
        let from = fighter.position();
        fighter.pool_mut().spend(1);
        fighter.set_position(to);
        self.stage.clear_cell(from.x, from.y);
    }

    /// Recomputes the union of every living party member's field of view.
    pub fn recompute_visibility(&mut self) {
        self.visible.clear();
        for id in &self.party {
            if let Some(fighter) = self.fighters.get(id) {
                if !fighter.alive {
                    continue;
                }
                let radius = config::FOV_RADIUS + fighter.stats().clarity_mod();
                let pos = fighter.position();
                self.visible.extend(self.fov.compute_visible(
                    self.grid.as_ref(),
                    pos.x,
                    pos.y,
                    radius,
                ));
            }
        }
    }

    /// Full redraw: map, fighters, selection, bars.
    pub fn draw(&mut self) {
        let (w, h) = self.bounds;
        for x in 0..w {
            for y in 0..h {
                if self.debug_view || self.visible.contains(&(x, y)) {
                    let ch = if self.grid.is_walkable(x, y) { '.' } else { '#' };
                    self.stage.set_glyph(x, y, Glyph::bw(ch));
                } else {
                    self.stage.clear_cell(x, y);
                }
            }
        }

        let drawable: Vec<(Position, Glyph)> = self
            .party
            .iter()
            .chain(self.enemies.iter())
            .filter_map(|id| self.fighters.get(id))
            .filter(|f| f.alive)
            .map(|f| {
                let ch = match f.kind {
                    CombatantKind::PartyMember { .. } => '@',
                    CombatantKind::Enemy { glyph, .. } => glyph,
                };
                (f.position(), Glyph::new(ch, f.state.tint))
            })
            .collect();
        for (pos, glyph) in drawable {
            self.stage.set_glyph(pos.x, pos.y, glyph);
        }

        let bars: Vec<(i32, String)> = self
            .party
            .iter()
            .enumerate()
            .filter_map(|(i, id)| self.fighters.get(id).map(|f| (i, f)))
            .map(|(i, f)| {
                let marker = if i == self.selected { '>' } else { ' ' };
                (
                    h + 1 + i as i32,
                    format!("{}{} {}", marker, f.core.name, bar_text(f)),
                )
            })
            .collect();
        for (row, text) in bars {
            self.stage.set_text(0, row, &text);
        }
    }
}

/// Renders a pool as text: available first, a gap for transient spend,
/// then every status segment in insertion order.
fn bar_text(fighter: &Fighter) -> String {
    let pool = fighter.pool();
    let mut bar = String::from("[");
    for _ in 0..pool.remaining() {
        bar.push('=');
    }
    for _ in 0..pool.spent() {
        bar.push(' ');
    }
    for segment in pool.segments() {
        for _ in 0..segment.width {
            bar.push(segment.kind.sigil());
        }
    }
    bar.push(']');
    bar.push_str(&format!(" {}/{}", pool.remaining(), pool.total()));
    bar
}

/// Fades the stage out over a fixed duration once the fight is won.
pub struct FadeOutTask {
    duration: f32,
    elapsed: f32,
}

impl FadeOutTask {
    pub fn new(duration: f32) -> Self {
        Self {
            duration,
            elapsed: 0.0,
        }
    }
}

impl Task<EncounterState> for FadeOutTask {
    fn step(&mut self, world: &mut EncounterState, ctx: &TickContext) -> Step<EncounterState> {
        self.elapsed += ctx.dt;
        world.stage.fade(ctx.dt / self.duration);
        if self.elapsed >= self.duration {
            Step::Done
        } else {
            Step::Continue
        }
    }
}

/// One full combat: state, scheduler, phase machine.
pub struct Encounter {
    pub state: EncounterState,
    pub scheduler: Scheduler<EncounterState>,
    pub phases: PhaseMachine,
    /// Set once the closing fade has been submitted; no further phase
    /// transitions happen after that
    pub over: bool,
}

impl Encounter {
    /// Builds an encounter on the given services, placing the party near
    /// the top-left of the walkable area and the enemies near the
    /// bottom-right.
    ///
    /// Fails when the map lacks enough distinct walkable cells; callers
    /// retry with a different grid.
    pub fn new(
        grid: Box<dyn GridMap>,
        fov: Box<dyn FieldOfView>,
        pathfinder: Box<dyn GoalPathfinder>,
        stage: Box<dyn Stage>,
        mut dice: Box<dyn DiceRoller>,
        enemy_count: usize,
    ) -> SinfallResult<Self> {
        let bounds = (config::ARENA_WIDTH, config::ARENA_HEIGHT);
        let open: Vec<Position> = (0..bounds.1)
            .flat_map(|y| (0..bounds.0).map(move |x| Position::new(x, y)))
            .filter(|p| grid.is_walkable(p.x, p.y))
            .collect();
        if open.len() < config::PARTY_SIZE + enemy_count {
            return Err(SinfallError::InvalidConfiguration(format!(
                "map has {} walkable cells, need {}",
                open.len(),
                config::PARTY_SIZE + enemy_count
            )));
        }

        let mut fighters = HashMap::new();
        let mut party = Vec::new();
        let mut enemies = Vec::new();
        let names = ["Asha", "Brand", "Corva", "Dunn"];
        for (slot, name) in names.iter().enumerate().take(config::PARTY_SIZE) {
            let mut member = Fighter::party_member(slot, *name, dice.as_mut());
            member.set_position(open[slot]);
            party.push(member.id);
            fighters.insert(member.id, member);
        }
        for i in 0..enemy_count {
            let mut enemy = Fighter::goblin(dice.as_mut());
            enemy.set_position(open[open.len() - 1 - i]);
            enemies.push(enemy.id);
            fighters.insert(enemy.id, enemy);
        }

        let state = EncounterState {
            fighters,
            party,
            enemies,
            dice,
            grid,
            fov,
            pathfinder,
            stage,
            visible: HashSet::new(),
            selected: 0,
            debug_view: false,
            bounds,
            messages: Vec::new(),
        };

        Ok(Self {
            state,
            scheduler: Scheduler::new(),
            phases: PhaseMachine::new(),
            over: false,
        })
    }

    /// Tears the current fight down and starts a fresh one on a new grid.
    ///
    /// In-flight tasks are dropped without rollback; all fighters are
    /// discarded and rebuilt.
    pub fn regenerate(&mut self, grid: Box<dyn GridMap>, enemy_count: usize) -> SinfallResult<()> {
        self.scheduler.clear();
        self.phases.reset();
        self.over = false;

        let bounds = self.state.bounds;
        let open: Vec<Position> = (0..bounds.1)
            .flat_map(|y| (0..bounds.0).map(move |x| Position::new(x, y)))
            .filter(|p| grid.is_walkable(p.x, p.y))
            .collect();
        if open.len() < config::PARTY_SIZE + enemy_count {
            return Err(SinfallError::InvalidConfiguration(format!(
                "map has {} walkable cells, need {}",
                open.len(),
                config::PARTY_SIZE + enemy_count
            )));
        }

        self.state.grid = grid;
        self.state.fighters.clear();
        self.state.party.clear();
        self.state.enemies.clear();
        self.state.visible.clear();
        self.state.selected = 0;

        let names = ["Asha", "Brand", "Corva", "Dunn"];
        for (slot, name) in names.iter().enumerate().take(config::PARTY_SIZE) {
            let mut member = Fighter::party_member(slot, *name, self.state.dice.as_mut());
            member.set_position(open[slot]);
            self.state.party.push(member.id);
            self.state.fighters.insert(member.id, member);
        }
        for i in 0..enemy_count {
            let mut enemy = Fighter::goblin(self.state.dice.as_mut());
            enemy.set_position(open[open.len() - 1 - i]);
            self.state.enemies.push(enemy.id);
            self.state.fighters.insert(enemy.id, enemy);
        }
        Ok(())
    }

    /// Advances the encounter one frame.
    pub fn update(&mut self, dt: f32, input: &dyn InputSource) {
        // UI toggles stay live no matter what is animating
        if input.has_been_pressed(Key::Debug) {
            self.state.debug_view = !self.state.debug_view;
        }

        for fighter in self.state.fighters.values_mut() {
            fighter.pool_mut().tick(dt);
        }

        let ctx = TickContext { dt, input };
        self.scheduler.tick(&mut self.state, &ctx);

        if !self.over {
            self.run_phases(input);
        }
        self.state.draw();
    }

    fn run_phases(&mut self, input: &dyn InputSource) {
        match (self.phases.phase, self.phases.sub) {
            (Phase::Player, SubPhase::Preparing) => {
                self.prepare_player_phase();
                self.phases.to_executing();
            }
            (Phase::Player, SubPhase::Executing) => {
                // Input only lands while nothing is animating
                if self.scheduler.is_active() {
                    return;
                }
                if self.state.enemies.is_empty() {
                    self.state.say("the field is yours");
                    self.scheduler.submit(FadeOutTask::new(config::FADE_SECONDS));
                    self.over = true;
                    return;
                }
                self.handle_player_input(input);
            }
            (_, SubPhase::Done) => {
                self.phases.advance();
            }
            (Phase::Enemy, SubPhase::Preparing) => {
                self.prepare_enemy_phase();
                self.phases.to_executing();
            }
            (Phase::Enemy, SubPhase::Executing) => {
                if !self.scheduler.is_active() {
                    self.phases = PhaseMachine::new();
                }
            }
        }
    }

    fn prepare_player_phase(&mut self) {
        // One shared budget: the best Will in the party plus a flat bonus
        let budget = self
            .state
            .party
            .iter()
            .filter_map(|id| self.state.fighters.get(id))
            .map(|f| f.stats().will)
            .max()
            .unwrap_or(0)
            + config::MOVE_BUDGET_BONUS;
        for id in self.state.party.clone() {
            if let Some(fighter) = self.state.fighter_mut(id) {
                fighter.state.move_left = budget;
                fighter.pool_mut().free_all();
            }
        }
        self.state.recompute_visibility();
        self.state.say("your move");
    }

    fn prepare_enemy_phase(&mut self) {
        for id in self.state.enemies.clone() {
            if let Some(fighter) = self.state.fighter_mut(id) {
                fighter.pool_mut().free_all();
            }
        }
        let mut order: Vec<FighterId> = self
            .state
            .enemies
            .iter()
            .copied()
            .filter(|id| self.state.fighters.get(id).is_some_and(|f| f.alive))
            .collect();
        order.sort_by_key(|id| {
            std::cmp::Reverse(
                self.state
                    .fighters
                    .get(id)
                    .map_or(0, |f| f.state.initiative),
            )
        });
        self.scheduler.submit(EnemyTurnTask::new(order));
    }

    fn handle_player_input(&mut self, input: &dyn InputSource) {
        if self.state.party.is_empty() {
            return;
        }

        if input.has_been_pressed(Key::Tab) {
            self.state.selected = (self.state.selected + 1) % self.state.party.len();
            return;
        }

        if input.has_been_pressed(Key::Enter) {
            // A beat of hesitation, then the enemies take the field
            self.scheduler.submit_delay(0.25);
            self.phases.to_done();
            return;
        }

        let direction = if input.has_been_pressed(Key::Up) {
            Some(Direction::North)
        } else if input.has_been_pressed(Key::Down) {
            Some(Direction::South)
        } else if input.has_been_pressed(Key::Left) {
            Some(Direction::West)
        } else if input.has_been_pressed(Key::Right) {
            Some(Direction::East)
        } else {
            None
        };
        let Some(direction) = direction else {
            return;
        };

        let mover = self.state.party[self.state.selected];
        let Some(fighter) = self.state.fighter(mover) else {
            return;
        };
        let target = fighter.position() + direction.to_delta();
        let move_left = fighter.state.move_left;

        if let Some(enemy) = self.state.enemy_at(target) {
            // Bump-attack: the swing eats the rest of this member's stride
            if let Some(fighter) = self.state.fighter_mut(mover) {
                fighter.state.move_left = 0;
            }
            self.scheduler.submit(AttackTask::new(mover, enemy));
            return;
        }

        if move_left <= 0
            || !self.state.grid.is_walkable(target.x, target.y)
            || self.state.fighter_at(target).is_some()
        {
            return;
        }
        let mut moved_from = None;
        if let Some(fighter) = self.state.fighter_mut(mover) {
            if fighter.pool_mut().spend(1) {
                fighter.state.move_left -= 1;
                moved_from = Some(fighter.position());
                fighter.set_position(target);
            }
        }
        if let Some(from) = moved_from {
            self.state.stage.clear_cell(from.x, from.y);
            self.state.recompute_visibility();
        }
    }
}
