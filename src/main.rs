//! # Sinfall Main Entry Point
//!
//! Builds the service backends, assembles an encounter, and runs the
//! macroquad frame loop.

use clap::Parser;
use macroquad::prelude::*;
use serde::Deserialize;
use sinfall::{
    config, Armor, DiceRoller, Encounter, GameDice, InputSource, Key, LineOfSight,
    MacroquadInput, MacroquadRenderer, SharedTextGrid, SinfallResult, SquareGrid, Weapon,
    WeightedGoalField,
};

/// Command line arguments for Sinfall.
#[derive(Parser, Debug)]
#[command(name = "sinfall")]
#[command(about = "A party-based tactical combat roguelike")]
#[command(version)]
struct Args {
    /// Random seed for dice and arena layout
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of enemies in the encounter
    #[arg(short, long, default_value_t = 3)]
    enemies: usize,

    /// Party loadout file (JSON) overriding generated gear
    #[arg(long)]
    party: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Gear overrides for one party member, applied in slot order.
#[derive(Debug, Deserialize)]
struct MemberLoadout {
    name: Option<String>,
    left_weapon: Option<Weapon>,
    right_weapon: Option<Weapon>,
    armor: Option<Armor>,
}

/// A fresh arena with a handful of randomly placed pillars.
fn build_grid(dice: &mut dyn DiceRoller, pillars: i32) -> SquareGrid {
    let mut grid = SquareGrid::arena(config::ARENA_WIDTH, config::ARENA_HEIGHT);
    for _ in 0..pillars {
        let x = dice.roll(2, config::ARENA_WIDTH - 3);
        let y = dice.roll(2, config::ARENA_HEIGHT - 3);
        grid.set_walkable(x, y, false);
    }
    grid
}

/// Builds an encounter, relaxing the pillar count when placement fails.
fn build_encounter(
    seed: u64,
    enemies: usize,
    stage: SharedTextGrid,
) -> SinfallResult<Encounter> {
    let mut layout_dice = GameDice::seeded(seed ^ 0x51caffe);
    let mut pillars = 14;
    loop {
        let grid = build_grid(&mut layout_dice, pillars);
        match Encounter::new(
            Box::new(grid),
            Box::new(LineOfSight),
            Box::new(WeightedGoalField::new()),
            Box::new(stage.clone()),
            Box::new(GameDice::seeded(seed)),
            enemies,
        ) {
            Ok(encounter) => return Ok(encounter),
            Err(err) if pillars > 0 => {
                log::warn!("arena rejected ({}); relaxing layout", err);
                pillars -= 4;
            }
            Err(err) => return Err(err),
        }
    }
}

fn apply_loadout(encounter: &mut Encounter, path: &str) -> SinfallResult<()> {
    let raw = std::fs::read_to_string(path)?;
    let loadouts: Vec<MemberLoadout> = serde_json::from_str(&raw)?;
    let party = encounter.state.party.clone();
    for (id, loadout) in party.into_iter().zip(loadouts) {
        if let Some(fighter) = encounter.state.fighter_mut(id) {
            if let Some(name) = loadout.name {
                fighter.core.name = name;
            }
            if let Some(weapon) = loadout.left_weapon {
                fighter.core.left_weapon = Some(weapon);
            }
            if let Some(weapon) = loadout.right_weapon {
                fighter.core.right_weapon = Some(weapon);
            }
            if let Some(armor) = loadout.armor {
                fighter.core.armor = Some(armor);
            }
        }
    }
    Ok(())
}

#[macroquad::main("Sinfall")]
async fn main() -> SinfallResult<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.log_level.as_str()),
    )
    .init();

    log::info!("Starting Sinfall v{}", sinfall::VERSION);

    let seed = args.seed.unwrap_or_else(|| {
        let seed = macroquad::miniquad::date::now() as u64;
        log::info!("no seed given, using {}", seed);
        seed
    });

    let stage = SharedTextGrid::new();
    let renderer = MacroquadRenderer::new(stage.handle());
    let input = MacroquadInput;

    let mut encounter = build_encounter(seed, args.enemies, stage.clone())?;
    if let Some(path) = &args.party {
        apply_loadout(&mut encounter, path)?;
        log::info!("applied party loadout from {}", path);
    }

    request_new_screen_size(1024.0, 768.0);

    let mut regen_dice = GameDice::seeded(seed ^ 0xd1ce);
    loop {
        if input.has_been_pressed(Key::Escape) {
            log::info!("player quit");
            break;
        }

        // Space tears the fight down and raises a new one
        if input.has_been_pressed(Key::Space) {
            let mut pillars = 14;
            loop {
                let grid = build_grid(&mut regen_dice, pillars);
                match encounter.regenerate(Box::new(grid), args.enemies) {
                    Ok(()) => {
                        let handle = stage.handle();
                        let mut buffer = handle.borrow_mut();
                        buffer.cells.clear();
                        buffer.texts.clear();
                        buffer.dim = 0.0;
                        break;
                    }
                    Err(err) if pillars > 0 => {
                        log::warn!("arena rejected ({}); relaxing layout", err);
                        pillars -= 4;
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        clear_background(BLACK);
        encounter.update(get_frame_time(), &input);
        renderer.draw();
        next_frame().await;
    }

    Ok(())
}
