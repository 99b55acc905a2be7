//! Test that unions cannot be components.

use sweep_ecs::Component;

#[derive(Component)]
union Bits {
    int: u32,
}

fn main() {
    let bits = Bits { int: 0 };
    let _ = unsafe { bits.int };
}
