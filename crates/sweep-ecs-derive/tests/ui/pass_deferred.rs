//! Test that the derive sets the pool kind, including on generic types.

use std::marker::PhantomData;

use sweep_ecs::{Component, World};

#[derive(Component)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component)]
#[component(deferred)]
struct Projectile {
    ttl: u32,
}

#[derive(Component)]
#[component(deferred)]
enum Effect {
    Burning,
    Frozen { ticks: u32 },
}

#[derive(Component)]
struct Tagged<T: 'static> {
    _tag: PhantomData<T>,
}

const _: () = assert!(!<Position as Component>::DEFERRED);
const _: () = assert!(<Projectile as Component>::DEFERRED);
const _: () = assert!(<Effect as Component>::DEFERRED);
const _: () = assert!(!<Tagged<u8> as Component>::DEFERRED);

fn main() {
    let mut world = World::new();
    world.register::<Position>();
    world.register::<Projectile>();
    world.register::<Effect>();

    assert!(!world.pool::<Position>().unwrap().is_deferred());
    assert!(world.pool::<Projectile>().unwrap().is_deferred());

    let entity = world
        .spawn_with((
            Position { x: 0.0, y: 1.0 },
            Projectile { ttl: 3 },
            Effect::Frozen { ticks: 2 },
        ))
        .unwrap();
    let _ = (Effect::Burning, Tagged::<u8> { _tag: PhantomData });
    assert_eq!(world.get::<Projectile>(entity).map(|p| p.ttl), Some(3));
    assert_eq!(world.get::<Position>(entity).map(|p| p.x + p.y), Some(1.0));
    assert!(matches!(world.get::<Effect>(entity), Some(Effect::Frozen { ticks: 2 })));
}
