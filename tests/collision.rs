use std::f32::consts::PI;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigid2d::collision::{make_proxy, shape_distance, DistanceInput, SimplexCache};
use rigid2d::shapes::{make_offset_box, make_rounded_box};
use rigid2d::{
    make_box, Capsule, ChainSegment, Circle, DynamicTree, Rot, Segment, ShapeGeometry, Transform, Vec2, AABB,
};

fn random_aabb(rng: &mut StdRng) -> AABB {
    let center = Vec2::new(rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0));
    let extents = Vec2::new(rng.gen_range(0.1..3.0), rng.gen_range(0.1..3.0));
    AABB::from_center(center, extents)
}

#[test]
fn test_tree_queries_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut tree = DynamicTree::new();
    let mut live: Vec<usize> = Vec::new();

    for i in 0..400u64 {
        let aabb = random_aabb(&mut rng);
        live.push(tree.create_proxy(aabb, 1, i));
    }

    // Move a third, destroy a quarter.
    for _ in 0..130 {
        let proxy = live[rng.gen_range(0..live.len())];
        tree.move_proxy(proxy, random_aabb(&mut rng));
    }
    for _ in 0..100 {
        let slot = rng.gen_range(0..live.len());
        tree.destroy_proxy(live.swap_remove(slot));
    }
    assert!(tree.validate());

    // Every proxy finds itself.
    for &proxy in &live {
        let mut found = false;
        tree.query(tree.fat_aabb(proxy), u64::MAX, |id, _| {
            found |= id == proxy;
            true
        });
        assert!(found, "proxy {proxy} not reported for its own bounds");
    }

    for _ in 0..50 {
        let query = random_aabb(&mut rng).fattened(5.0);
        let mut reported = Vec::new();
        tree.query(query, u64::MAX, |id, _| {
            reported.push(id);
            true
        });
        reported.sort_unstable();

        let mut expected: Vec<usize> = live
            .iter()
            .copied()
            .filter(|&proxy| tree.fat_aabb(proxy).overlaps(&query))
            .collect();
        expected.sort_unstable();
        assert_eq!(reported, expected);
    }
}

#[test]
fn test_tree_rebuild_keeps_proxies() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut tree = DynamicTree::new();
    let proxies: Vec<usize> = (0..200u64)
        .map(|i| tree.create_proxy(random_aabb(&mut rng), 1, i))
        .collect();

    tree.rebuild(true);
    assert!(tree.validate());
    for (i, &proxy) in proxies.iter().enumerate() {
        assert_eq!(tree.user_data(proxy), i as u64);
    }
}

#[test]
fn test_circle_distance() {
    let input = DistanceInput {
        proxy_a: make_proxy(&[Vec2::ZERO], 1.0),
        proxy_b: make_proxy(&[Vec2::ZERO], 1.0),
        transform_a: Transform::IDENTITY,
        transform_b: Transform::new(Vec2::new(3.0, 0.0), Rot::IDENTITY),
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = shape_distance(&input, &mut cache, None);

    assert_relative_eq!(output.distance, 1.0, epsilon = 1e-5);
    assert_relative_eq!(output.point_a.x, 1.0, epsilon = 1e-5);
    assert_relative_eq!(output.point_b.x, 2.0, epsilon = 1e-5);
    assert_relative_eq!(output.normal.x, 1.0, epsilon = 1e-5);
}

fn random_point(rng: &mut StdRng, extent: f32) -> Vec2 {
    Vec2::new(rng.gen_range(-extent..extent), rng.gen_range(-extent..extent))
}

fn random_geometry(rng: &mut StdRng, kind: usize) -> ShapeGeometry {
    match kind {
        0 => Circle::new(random_point(rng, 1.0), rng.gen_range(0.1..2.0)).into(),
        1 => {
            let c1 = random_point(rng, 1.0);
            let c2 = c1 + Vec2::new(rng.gen_range(0.1..2.0), rng.gen_range(-1.0..1.0));
            Capsule::new(c1, c2, rng.gen_range(0.05..1.0)).into()
        }
        2 => {
            let p1 = random_point(rng, 2.0);
            Segment::new(p1, p1 + Vec2::new(rng.gen_range(0.1..3.0), rng.gen_range(-2.0..2.0))).into()
        }
        3 => make_box(rng.gen_range(0.1..2.0), rng.gen_range(0.1..2.0)).into(),
        4 => make_rounded_box(rng.gen_range(0.1..2.0), rng.gen_range(0.1..2.0), rng.gen_range(0.05..0.5)).into(),
        5 => make_offset_box(
            rng.gen_range(0.1..2.0),
            rng.gen_range(0.1..2.0),
            random_point(rng, 2.0),
            Rot::from_angle(rng.gen_range(-PI..PI)),
        )
        .into(),
        _ => {
            let p1 = random_point(rng, 2.0);
            let p2 = p1 + Vec2::new(rng.gen_range(0.1..3.0), rng.gen_range(-2.0..2.0));
            ChainSegment::new(p1 - Vec2::X, p1, p2, p2 + Vec2::X).into()
        }
    }
}

#[test]
fn test_aabb_contains_every_geometry() {
    let mut rng = StdRng::seed_from_u64(11);

    for kind in 0..7 {
        for _ in 0..50 {
            let geometry = random_geometry(&mut rng, kind);
            let xf = Transform::new(random_point(&mut rng, 10.0), Rot::from_angle(rng.gen_range(-PI..PI)));
            let aabb = geometry.compute_aabb(xf);
            assert!(aabb.is_valid());

            // Sample the rounded outline: every core point pushed out by the radius.
            let proxy = geometry.make_proxy();
            let bounds = aabb.fattened(1e-4);
            for &core in &proxy.points[..proxy.count] {
                for k in 0..16 {
                    let angle = 2.0 * PI * k as f32 / 16.0;
                    let local = core + proxy.radius * Vec2::new(angle.cos(), angle.sin());
                    let p = xf.apply(local);
                    assert!(bounds.contains_point(p), "kind {kind}: {p:?} outside {aabb:?}");
                }
            }
        }
    }
}
