//! Test that `#[component]` needs an option list.

use sweep_ecs::Component;

#[derive(Component)]
#[component]
struct Marker;

fn main() {
    let _ = Marker;
}
