use approx::assert_relative_eq;
use rigid2d::common::{hash, HASH_INIT};
use rigid2d::world::ContactData;
use rigid2d::{
    make_box, BodyDef, BodyId, Circle, PhysicsError, PhysicsWorld, ShapeDef, Vec2, WorldDef,
};

const DT: f32 = 1.0 / 60.0;

fn world_with_ground() -> (PhysicsWorld, BodyId) {
    let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
    let ground = world.create_body(&BodyDef::default()).expect("ground");
    world
        .create_shape(ground, &ShapeDef::default(), make_box(20.0, 0.5))
        .expect("ground box");
    (world, ground)
}

fn dynamic_at(world: &mut PhysicsWorld, x: f32, y: f32) -> BodyId {
    world
        .create_body(&BodyDef {
            position: Vec2::new(x, y),
            ..BodyDef::dynamic()
        })
        .expect("body")
}

#[test]
fn test_falling_circle_settles_and_sleeps() {
    let (mut world, _) = world_with_ground();
    let ball = dynamic_at(&mut world, 0.0, 5.0);
    world
        .create_shape(ball, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
        .expect("circle");

    for _ in 0..300 {
        world.step(DT, 4);
    }

    let position = world.body_position(ball).expect("position");
    assert_relative_eq!(position.x, 0.0, epsilon = 1e-3);
    assert_relative_eq!(position.y, 1.0, epsilon = 0.01);
    assert!(!world.body_is_awake(ball).expect("awake"));
    assert_eq!(world.awake_body_count(), 0);
}

#[test]
fn test_stale_handles_are_rejected() {
    let (mut world, _) = world_with_ground();
    let first = dynamic_at(&mut world, 0.0, 2.0);
    let shape = world
        .create_shape(first, &ShapeDef::default(), make_box(0.5, 0.5))
        .expect("box");
    world.destroy_body(first).expect("destroy");

    let second = dynamic_at(&mut world, 0.0, 2.0);
    assert_ne!(first, second);
    assert!(!world.body_is_valid(first));
    assert!(world.body_is_valid(second));
    assert!(!world.shape_is_valid(shape));
    assert_eq!(world.body_position(first), Err(PhysicsError::InvalidBody));
    assert_eq!(world.destroy_body(first), Err(PhysicsError::InvalidBody));
}

#[test]
fn test_body_mass_is_sum_of_shape_masses() {
    let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
    let body = dynamic_at(&mut world, 0.0, 0.0);
    let left = world
        .create_shape(body, &ShapeDef::default(), Circle::new(Vec2::new(-1.0, 0.0), 0.5))
        .expect("left");
    let right = world
        .create_shape(
            body,
            &ShapeDef {
                density: 3.0,
                ..Default::default()
            },
            make_box(0.5, 0.5),
        )
        .expect("right");

    let a = world.shape_mass_data(left).expect("left mass");
    let b = world.shape_mass_data(right).expect("right mass");
    assert_relative_eq!(a.mass, std::f32::consts::PI * 0.25, epsilon = 1e-5);
    assert_relative_eq!(b.mass, 3.0, epsilon = 1e-5);

    let total = world.body_mass(body).expect("mass");
    assert_relative_eq!(total, a.mass + b.mass, epsilon = 1e-5);

    let center = world.body_local_center_of_mass(body).expect("center");
    let expected = (a.mass * a.center.x + b.mass * b.center.x) / total;
    assert_relative_eq!(center.x, expected, epsilon = 1e-5);
    assert_relative_eq!(center.y, 0.0, epsilon = 1e-6);

    // Inertia about the combined center is at least the sum of the parts.
    let inertia = world.body_rotational_inertia(body).expect("inertia");
    assert!(inertia >= a.rotational_inertia + b.rotational_inertia);

    world.destroy_shape(right, true).expect("destroy");
    assert_relative_eq!(world.body_mass(body).expect("mass"), a.mass, epsilon = 1e-6);
    let center = world.body_local_center_of_mass(body).expect("center");
    assert_relative_eq!(center.x, -1.0, epsilon = 1e-6);

    world.apply_mass_from_shapes(body).expect("reapply");
    assert_relative_eq!(world.body_mass(body).expect("mass"), a.mass, epsilon = 1e-6);
}

#[test]
fn test_resting_contact_keeps_point_ids() {
    let (mut world, _) = world_with_ground();
    let crate_body = dynamic_at(&mut world, 0.0, 1.5);
    world
        .create_shape(crate_body, &ShapeDef::default(), make_box(0.5, 0.5))
        .expect("crate");
    world.enable_body_sleep(crate_body, false).expect("sleep");

    for _ in 0..60 {
        world.step(DT, 4);
    }

    let mut data = [ContactData::default(); 4];
    let count = world.body_contact_data(crate_body, &mut data).expect("contacts");
    assert_eq!(count, 1);
    let before = data[0].manifold;
    assert_eq!(before.point_count, 2);

    world.step(DT, 4);
    let count = world.body_contact_data(crate_body, &mut data).expect("contacts");
    assert_eq!(count, 1);
    let after = data[0].manifold;
    assert_eq!(after.point_count, 2);

    for i in 0..2 {
        assert_eq!(before.points[i].id, after.points[i].id);
        assert!(after.points[i].persisted);
        assert!(after.points[i].normal_impulse > 0.0);
    }
}

#[test]
fn test_warm_started_impulse_converges_to_weight() {
    let (mut world, _) = world_with_ground();
    let crate_body = dynamic_at(&mut world, 0.0, 1.0);
    world
        .create_shape(crate_body, &ShapeDef::default(), make_box(0.5, 0.5))
        .expect("crate");
    world.enable_body_sleep(crate_body, false).expect("sleep");

    let sub_steps = 4;
    let mut totals = Vec::new();
    let mut data = [ContactData::default(); 4];
    for _ in 0..120 {
        world.step(DT, sub_steps);
        let count = world.body_contact_data(crate_body, &mut data).expect("contacts");
        let total: f32 = data[..count]
            .iter()
            .flat_map(|c| c.manifold.points[..c.manifold.point_count].iter())
            .map(|p| p.normal_impulse)
            .sum();
        totals.push(total);
    }

    // The stored impulse is per sub-step, so at rest it carries m * g * h.
    let mass = world.body_mass(crate_body).expect("mass");
    let expected = mass * 10.0 * DT / sub_steps as f32;
    let last = totals[totals.len() - 1];
    assert_relative_eq!(last, expected, max_relative = 0.02);

    let changes: Vec<f32> = totals.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let early = changes[..10].iter().copied().fold(0.0, f32::max);
    let late = changes[changes.len() - 10..].iter().copied().fold(0.0, f32::max);
    assert!(late < 0.1 * early, "early {early} late {late}");
    assert!(late < 1e-4, "late {late}");
}

fn run_pyramid(steps: usize) -> u32 {
    let (mut world, _) = world_with_ground();
    let mut bodies = Vec::new();
    let base = 6;
    for row in 0..base {
        for i in 0..base - row {
            let x = (i as f32 - 0.5 * (base - row - 1) as f32) * 1.05;
            let body = dynamic_at(&mut world, x, 1.0 + row as f32 * 1.05);
            world
                .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
                .expect("box");
            bodies.push(body);
        }
    }

    for _ in 0..steps {
        world.step(DT, 4);
    }

    bodies.iter().fold(HASH_INIT, |h, &body| {
        let xf = world.body_transform(body).expect("transform");
        let mut bytes = Vec::with_capacity(16);
        for value in [xf.p.x, xf.p.y, xf.q.c, xf.q.s] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        hash(h, &bytes)
    })
}

#[test]
fn test_simulation_is_deterministic() {
    let first = run_pyramid(90);
    let second = run_pyramid(90);
    assert_eq!(first, second);
}

#[test]
fn test_contact_begin_and_end_events() {
    let (mut world, _) = world_with_ground();
    let ball = dynamic_at(&mut world, 0.0, 2.0);
    world
        .create_shape(ball, &ShapeDef::default(), Circle::new(Vec2::ZERO, 0.5))
        .expect("circle");

    let mut began = 0;
    for _ in 0..90 {
        world.step(DT, 4);
        began += world.contact_events().begin_events.len();
    }
    assert_eq!(began, 1);

    world.set_body_linear_velocity(ball, Vec2::new(0.0, 20.0)).expect("launch");
    let mut ended = 0;
    for _ in 0..10 {
        world.step(DT, 4);
        ended += world.contact_events().end_events.len();
    }
    assert_eq!(ended, 1);
}
