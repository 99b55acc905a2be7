//! Test that `deferred` is the only component option.

use sweep_ecs::Component;

#[derive(Component)]
#[component(lazy)]
struct Marker;

fn main() {
    let _ = Marker;
}
