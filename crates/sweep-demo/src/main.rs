//! Deferred-removal walkthrough.
//!
//! This binary:
//! 1. Erases a deferred component and shows it is still readable until flushed
//! 2. Destroys every entity of a view while entity destruction is deferred
//! 3. Runs a tick loop where expired entities are destroyed mid-iteration and a
//!    looping timer flushes the world every few ticks
//!
//! Configuration (environment):
//! - `SWEEP_TICKS` - number of ticks to run (default 20)
//! - `SWEEP_ENTITIES` - entities spawned for the tick loop (default 64)
//! - `SWEEP_FLUSH_EVERY` - ticks between flushes (default 4)

use std::str::FromStr;

use eyre::WrapErr;
use sweep_ecs::{Component, Entity, World, WorldConfig};
use sweep_timer::TimerPool;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Component)]
#[component(deferred)]
struct Number(i32);

#[derive(Debug, Clone, Copy, Component)]
struct Letter(char);

/// Tick at which the entity is destroyed.
#[derive(Debug, Clone, Copy, Component)]
#[component(deferred)]
struct Lifetime {
    expires_at: u32,
}

/// Tag of the looping flush timer.
struct FlushTick;

struct Config {
    ticks: u32,
    entities: u32,
    flush_every: u32,
}

impl Config {
    fn from_env() -> Self {
        Self {
            ticks: env_or("SWEEP_TICKS", 20),
            entities: env_or("SWEEP_ENTITIES", 64),
            flush_every: env_or("SWEEP_FLUSH_EVERY", 4).max(1),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sweep_demo=info".parse()?)
                .add_directive("sweep_ecs=info".parse()?),
        )
        .init();

    let config = Config::from_env();

    deferred_component()?;
    deferred_entities()?;
    tick_loop(&config)?;

    Ok(())
}

fn deferred_component() -> eyre::Result<()> {
    let mut world = World::new();
    world.register::<Number>();

    let entity = world.spawn_with((Number(42),))?;
    world.erase::<Number>(entity)?;
    info!(
        still_present = world.get::<Number>(entity).is_some(),
        "erased Number before flush"
    );

    world.flush::<Number>()?;
    info!(
        still_present = world.get::<Number>(entity).is_some(),
        "erased Number after flush"
    );

    Ok(())
}

fn deferred_entities() -> eyre::Result<()> {
    let mut world = World::with_config(WorldConfig {
        deferred_entities: true,
        ..WorldConfig::default()
    });
    world.register::<Letter>();

    for letter in 'a'..='z' {
        world.spawn_with((Letter(letter),))?;
    }

    let letters: Vec<Entity> = world.iter::<Letter>().map(|(entity, _)| entity).collect();
    world.destroy_all(letters);
    info!(alive = world.alive(), "destroyed every lettered entity");

    world.flush_entities()?;
    info!(alive = world.alive(), "flushed entity destruction");

    Ok(())
}

fn tick_loop(config: &Config) -> eyre::Result<()> {
    let mut world = World::with_config(WorldConfig {
        deferred_entities: true,
        ..WorldConfig::default()
    });
    world.register::<Lifetime>();

    for i in 0..config.entities {
        world
            .spawn_with((Lifetime {
                expires_at: i % config.ticks.max(1),
            },))
            .wrap_err("spawning tick loop entities")?;
    }

    let mut timers = TimerPool::<u32, World>::new();
    timers.looping::<FlushTick>(config.flush_every).connect(|world| {
        match world.flush_all() {
            Ok(removed) => info!(removed, alive = world.alive(), "flushed world"),
            Err(err) => warn!(%err, "flush found stale entities"),
        }
    });

    for tick in 0..config.ticks {
        let expired: Vec<Entity> = world
            .iter::<Lifetime>()
            .filter(|&(entity, lifetime)| world.is_alive(entity) && lifetime.expires_at <= tick)
            .map(|(entity, _)| entity)
            .collect();

        let destroyed = world.destroy_all(expired);
        if destroyed > 0 {
            info!(
                tick,
                destroyed,
                pending = world.pending_removals(),
                "destroyed expired entities"
            );
        }

        timers.update(1, &mut world);
    }

    world.flush_all()?;
    info!(alive = world.alive(), "tick loop finished");

    Ok(())
}
