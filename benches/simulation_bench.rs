use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigid2d::{
    make_box, BodyDef, Circle, JointDefBase, PhysicsWorld, QueryFilter, RevoluteJointDef, ShapeDef, Vec2, WorldDef,
    AABB,
};

// --- Helper for building a pyramid of circles on a ground box ---
fn build_circle_pyramid(world: &mut PhysicsWorld, base_count: usize) {
    let ground = world.create_body(&BodyDef::default()).expect("ground");
    world
        .create_shape(ground, &ShapeDef::default(), make_box(100.0, 0.5))
        .expect("ground shape");

    let radius = 0.5;
    let circle = Circle::new(Vec2::ZERO, radius);
    for row in 0..base_count {
        let count = base_count - row;
        let y = 1.0 + radius + row as f32 * 2.0 * radius * 0.9;
        let x0 = -(count as f32 - 1.0) * radius;
        for i in 0..count {
            let def = BodyDef {
                position: Vec2::new(x0 + 2.0 * radius * i as f32, y),
                ..BodyDef::dynamic()
            };
            let body = world.create_body(&def).expect("body");
            world
                .create_shape(body, &ShapeDef::default(), circle)
                .expect("circle");
        }
    }
}

// --- Helper for building a hanging chain of revolute links ---
fn build_joint_chain(world: &mut PhysicsWorld, link_count: usize) {
    let link_length = 0.5;
    let anchor = world.create_body(&BodyDef::default()).expect("anchor");
    let shape = Circle::new(Vec2::ZERO, 0.2);

    let mut previous = anchor;
    for i in 0..link_count {
        let def = BodyDef {
            position: Vec2::new(link_length * (i + 1) as f32, 20.0),
            ..BodyDef::dynamic()
        };
        let body = world.create_body(&def).expect("link");
        world.create_shape(body, &ShapeDef::default(), shape).expect("shape");

        let joint = RevoluteJointDef {
            base: JointDefBase {
                body_a: previous,
                body_b: body,
                local_anchor_a: if i == 0 {
                    Vec2::new(0.0, 20.0)
                } else {
                    Vec2::new(0.5 * link_length, 0.0)
                },
                local_anchor_b: Vec2::new(-0.5 * link_length, 0.0),
                ..Default::default()
            },
            ..Default::default()
        };
        world.create_revolute_joint(&joint).expect("joint");
        previous = body;
    }
}

fn run_steps(world: &mut PhysicsWorld, steps: usize) {
    let dt = 1.0 / 60.0;
    for _ in 0..steps {
        world.step(black_box(dt), 4);
    }
}

// Benchmark for a pyramid of circles settling under gravity
fn bench_circle_pyramid(c: &mut Criterion) {
    let mut group = c.benchmark_group("circle_pyramid");

    for base_count in [5, 20, 40].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(base_count), base_count, |b, &n| {
            b.iter(|| {
                let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
                build_circle_pyramid(&mut world, black_box(n));
                run_steps(&mut world, 30);
            });
        });
    }
    group.finish();
}

// Benchmark for a chain of bodies linked by revolute joints
fn bench_joint_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("joint_chain");

    for link_count in [10, 100, 500].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(link_count), link_count, |b, &n| {
            b.iter(|| {
                let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
                build_joint_chain(&mut world, black_box(n));
                run_steps(&mut world, 30);
            });
        });
    }
    group.finish();
}

// Benchmark for broad-phase queries over scattered static boxes
fn bench_tree_queries(c: &mut Criterion) {
    let mut world = PhysicsWorld::new(&WorldDef::default()).expect("world");
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..2000 {
        let def = BodyDef {
            position: Vec2::new(rng.gen_range(-200.0..200.0), rng.gen_range(-200.0..200.0)),
            ..Default::default()
        };
        let body = world.create_body(&def).expect("body");
        world
            .create_shape(body, &ShapeDef::default(), make_box(0.5, 0.5))
            .expect("box");
    }
    world.rebuild_static_tree();

    let mut group = c.benchmark_group("tree_queries");
    group.bench_function("overlap_aabb", |b| {
        b.iter(|| {
            let mut count = 0;
            let aabb = AABB::new(Vec2::new(-20.0, -20.0), Vec2::new(20.0, 20.0));
            world.overlap_aabb(black_box(aabb), QueryFilter::default(), |_| {
                count += 1;
                true
            });
            count
        });
    });
    group.bench_function("cast_ray_closest", |b| {
        b.iter(|| {
            world.cast_ray_closest(
                black_box(Vec2::new(-200.0, -200.0)),
                black_box(Vec2::new(400.0, 400.0)),
                QueryFilter::default(),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_circle_pyramid, bench_joint_chain, bench_tree_queries);
criterion_main!(benches);
