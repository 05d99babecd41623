//! Encounter-level flow: phase round trips, movement budgets, input
//! gating, victory, and regeneration tolerance.

use sinfall::{
    config, Encounter, GameDice, Glyph, Key, LineOfSight, Phase, Position, QueuedInput,
    RecordingStage, SquareGrid, Stage, SubPhase, WeightedGoalField,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Recording stage that stays inspectable after the encounter takes
/// ownership of a handle.
#[derive(Clone, Default)]
struct SharedStage(Rc<RefCell<RecordingStage>>);

impl Stage for SharedStage {
    fn set_glyph(&mut self, x: i32, y: i32, glyph: Glyph) {
        self.0.borrow_mut().set_glyph(x, y, glyph);
    }

    fn clear_cell(&mut self, x: i32, y: i32) {
        self.0.borrow_mut().clear_cell(x, y);
    }

    fn set_text(&mut self, x: i32, y: i32, text: &str) {
        self.0.borrow_mut().set_text(x, y, text);
    }

    fn fade(&mut self, amount: f32) {
        self.0.borrow_mut().fade(amount);
    }
}

fn new_encounter(seed: u64, enemies: usize) -> (Encounter, Rc<RefCell<RecordingStage>>) {
    let stage = SharedStage::default();
    let handle = Rc::clone(&stage.0);
    let enc = Encounter::new(
        Box::new(SquareGrid::arena(config::ARENA_WIDTH, config::ARENA_HEIGHT)),
        Box::new(LineOfSight),
        Box::new(WeightedGoalField::new()),
        Box::new(stage),
        Box::new(GameDice::seeded(seed)),
        enemies,
    )
    .expect("open arena has room");
    (enc, handle)
}

fn frame(enc: &mut Encounter, keys: &[Key]) {
    let input = QueuedInput::with_presses(keys.iter().copied());
    enc.update(1.0, &input);
}

#[test]
fn preparing_assigns_the_shared_movement_budget() {
    let (mut enc, _) = new_encounter(11, 1);
    frame(&mut enc, &[]);
    assert!(enc.phases.is(Phase::Player, SubPhase::Executing));

    let best_will = enc
        .state
        .party
        .iter()
        .filter_map(|id| enc.state.fighter(*id))
        .map(|f| f.stats().will)
        .max()
        .unwrap();
    for id in &enc.state.party {
        let member = enc.state.fighter(*id).unwrap();
        assert_eq!(member.state.move_left, best_will + config::MOVE_BUDGET_BONUS);
    }
}

#[test]
fn a_step_costs_one_point_and_one_stride() {
    let (mut enc, _) = new_encounter(11, 1);
    frame(&mut enc, &[]);

    let mover = enc.state.party[0];
    let before = enc.state.fighter(mover).unwrap().clone();
    frame(&mut enc, &[Key::Down]);

    let after = enc.state.fighter(mover).unwrap();
    assert_eq!(after.position(), Position::new(before.position().x, before.position().y + 1));
    assert_eq!(after.state.move_left, before.state.move_left - 1);
    assert_eq!(after.pool().spent(), 1);
}

#[test]
fn movement_input_is_ignored_while_an_action_animates() {
    let (mut enc, _) = new_encounter(11, 1);
    frame(&mut enc, &[]);

    enc.scheduler.submit_delay(30.0);
    let mover = enc.state.party[0];
    let before = enc.state.fighter(mover).unwrap().position();
    frame(&mut enc, &[Key::Down]);
    assert_eq!(enc.state.fighter(mover).unwrap().position(), before);

    // UI toggles stay live even mid-animation
    assert!(!enc.state.debug_view);
    frame(&mut enc, &[Key::Debug]);
    assert!(enc.state.debug_view);
}

#[test]
fn bump_attack_spends_the_rest_of_the_stride() {
    let (mut enc, _) = new_encounter(23, 1);
    frame(&mut enc, &[]);

    let mover = enc.state.party[0];
    let below = enc.state.fighter(mover).unwrap().position() + Position::new(0, 1);
    let goblin = enc.state.enemies[0];
    if let Some(fighter) = enc.state.fighter_mut(goblin) {
        fighter.set_position(below);
    }

    frame(&mut enc, &[Key::Down]);
    assert!(enc.scheduler.is_active(), "the swing is animating");
    assert_eq!(enc.state.fighter(mover).unwrap().state.move_left, 0);
}

#[test]
fn end_turn_round_trips_through_the_enemy_phase() {
    let (mut enc, _) = new_encounter(37, 2);
    frame(&mut enc, &[]);
    frame(&mut enc, &[Key::Enter]);
    assert!(enc.phases.is(Phase::Player, SubPhase::Done));

    let mut saw_enemy_phase = false;
    for _ in 0..500 {
        frame(&mut enc, &[]);
        if enc.phases.phase == Phase::Enemy {
            saw_enemy_phase = true;
        }
        if saw_enemy_phase && enc.phases.is(Phase::Player, SubPhase::Executing) {
            return;
        }
    }
    panic!("the round never came back to the player");
}

#[test]
fn victory_fades_out_and_freezes_the_phases() {
    let (mut enc, stage) = new_encounter(11, 0);
    frame(&mut enc, &[]);
    frame(&mut enc, &[]);
    assert!(enc.over);
    assert!(enc
        .state
        .messages()
        .iter()
        .any(|m| m.contains("the field is yours")));

    for _ in 0..10 {
        frame(&mut enc, &[]);
    }
    assert!(enc.phases.is(Phase::Player, SubPhase::Executing));
    assert!(!stage.borrow().fades.is_empty());
    assert!(!enc.scheduler.is_active(), "the fade has run its course");
}

#[test]
fn regeneration_rebuilds_the_whole_fight() {
    let (mut enc, _) = new_encounter(59, 2);
    frame(&mut enc, &[]);
    frame(&mut enc, &[Key::Down]);
    let old_party = enc.state.party.clone();

    enc.regenerate(
        Box::new(SquareGrid::arena(config::ARENA_WIDTH, config::ARENA_HEIGHT)),
        3,
    )
    .expect("fresh arena has room");

    assert!(!enc.scheduler.is_active());
    assert!(enc.phases.is(Phase::Player, SubPhase::Preparing));
    assert!(!enc.over);
    assert_eq!(enc.state.party.len(), config::PARTY_SIZE);
    assert_eq!(enc.state.enemies.len(), 3);
    for id in old_party {
        assert!(enc.state.fighter(id).is_none(), "old roster was discarded");
    }
}

#[test]
fn cramped_maps_are_rejected_recoverably() {
    let result = Encounter::new(
        Box::new(SquareGrid::arena(3, 3)),
        Box::new(LineOfSight),
        Box::new(WeightedGoalField::new()),
        Box::new(RecordingStage::new()),
        Box::new(GameDice::seeded(1)),
        1,
    );
    assert!(result.is_err());

    // A failed regeneration leaves the running fight intact
    let (mut enc, _) = new_encounter(61, 1);
    frame(&mut enc, &[]);
    assert!(enc
        .regenerate(Box::new(SquareGrid::arena(3, 3)), 1)
        .is_err());
    assert_eq!(enc.state.party.len(), config::PARTY_SIZE);
    assert_eq!(enc.state.enemies.len(), 1);
}
