//! Time of impact by conservative advancement along separating axes.

use crate::collision::distance::{shape_distance, DistanceInput, ShapeProxy, SimplexCache, Sweep};
use crate::common::constants::{linear_slop, MAX_POLYGON_VERTICES};
use crate::math::{Transform, Vec2};

/// Input parameters for [`time_of_impact`].
#[derive(Debug, Clone, Copy)]
pub struct ToiInput {
    pub proxy_a: ShapeProxy,
    pub proxy_b: ShapeProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Defines the sweep interval `[0, max_fraction]`.
    pub max_fraction: f32,
}

/// Describes the TOI output.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ToiState {
    #[default]
    Unknown,
    Failed,
    Overlapped,
    Hit,
    Separated,
}

/// Output of [`time_of_impact`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ToiOutput {
    pub state: ToiState,
    /// Contact point at the time of impact. Only meaningful for hits.
    pub point: Vec2,
    /// Contact normal pointing from A to B. Only meaningful for hits.
    pub normal: Vec2,
    /// The sweep time of the collision.
    pub fraction: f32,
    /// Outer iterations used, for diagnostics.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

struct SeparationFunction<'a> {
    proxy_a: &'a ShapeProxy,
    proxy_b: &'a ShapeProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    local_point: Vec2,
    axis: Vec2,
    kind: SeparationType,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a ShapeProxy,
        sweep_a: &Sweep,
        proxy_b: &'a ShapeProxy,
        sweep_b: &Sweep,
        t1: f32,
    ) -> Self {
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);

        let mut f = SeparationFunction {
            proxy_a,
            proxy_b,
            sweep_a: *sweep_a,
            sweep_b: *sweep_b,
            local_point: Vec2::ZERO,
            axis: Vec2::ZERO,
            kind: SeparationType::Points,
        };

        let ia = |i: usize| cache.index_a[i] as usize;
        let ib = |i: usize| cache.index_b[i] as usize;

        if cache.count == 1 {
            let point_a = xf_a.apply(proxy_a.points[ia(0)]);
            let point_b = xf_b.apply(proxy_b.points[ib(0)]);
            f.axis = (point_b - point_a).normalize();
            return f;
        }

        if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A
            f.kind = SeparationType::FaceB;
            let local_point_b1 = proxy_b.points[ib(0)];
            let local_point_b2 = proxy_b.points[ib(1)];

            f.axis = (local_point_b2 - local_point_b1).cross_scalar(1.0).normalize();
            let normal = xf_b.q.rotate(f.axis);

            f.local_point = Vec2::lerp(local_point_b1, local_point_b2, 0.5);
            let point_b = xf_b.apply(f.local_point);
            let point_a = xf_a.apply(proxy_a.points[ia(0)]);

            if (point_a - point_b).dot(normal) < 0.0 {
                f.axis = -f.axis;
            }
            return f;
        }

        // Two points on A and one or two points on B
        f.kind = SeparationType::FaceA;
        let local_point_a1 = proxy_a.points[ia(0)];
        let local_point_a2 = proxy_a.points[ia(1)];

        f.axis = (local_point_a2 - local_point_a1).cross_scalar(1.0).normalize();
        let normal = xf_a.q.rotate(f.axis);

        f.local_point = Vec2::lerp(local_point_a1, local_point_a2, 0.5);
        let point_a = xf_a.apply(f.local_point);
        let point_b = xf_b.apply(proxy_b.points[ib(0)]);

        if (point_b - point_a).dot(normal) < 0.0 {
            f.axis = -f.axis;
        }
        f
    }

    fn transforms(&self, t: f32) -> (Transform, Transform) {
        (self.sweep_a.transform_at(t), self.sweep_b.transform_at(t))
    }

    /// Deepest points at time `t` along the axis, with their separation.
    fn find_min_separation(&self, t: f32) -> (usize, usize, f32) {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationType::Points => {
                let axis_a = xf_a.q.inv_rotate(self.axis);
                let axis_b = xf_b.q.inv_rotate(-self.axis);

                let index_a = self.proxy_a.find_support(axis_a);
                let index_b = self.proxy_b.find_support(axis_b);

                let point_a = xf_a.apply(self.proxy_a.points[index_a]);
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);

                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);

                let axis_b = xf_b.q.inv_rotate(-normal);
                let index_b = self.proxy_b.find_support(axis_b);
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);

                (usize::MAX, index_b, (point_b - point_a).dot(normal))
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);

                let axis_a = xf_a.q.inv_rotate(-normal);
                let index_a = self.proxy_a.find_support(axis_a);
                let point_a = xf_a.apply(self.proxy_a.points[index_a]);

                (index_a, usize::MAX, (point_a - point_b).dot(normal))
            }
        }
    }

    /// Separation of the given witness points at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let (xf_a, xf_b) = self.transforms(t);

        match self.kind {
            SeparationType::Points => {
                let point_a = xf_a.apply(self.proxy_a.points[index_a]);
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);
                (point_b - point_a).dot(self.axis)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.points[index_b]);
                (point_b - point_a).dot(normal)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.points[index_a]);
                (point_a - point_b).dot(normal)
            }
        }
    }
}

const TOI_MAX_ITERATIONS: usize = 20;
const TOI_MAX_ROOT_ITERATIONS: usize = 50;

/// Computes the upper bound on time before two shapes penetrate. Time is
/// represented as a fraction in `[0, max_fraction]`. Uses a swept separating
/// axis and may miss some intermediate, non-tunneling collisions.
///
/// The shapes are advanced until they are within a linear slop of touching so
/// the contact solver still has a small gap to work with.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    let mut output = ToiOutput {
        state: ToiState::Unknown,
        fraction: input.max_fraction,
        ..Default::default()
    };

    let sweep_a = input.sweep_a;
    let sweep_b = input.sweep_b;
    debug_assert!(sweep_a.q1.is_normalized() && sweep_a.q2.is_normalized());
    debug_assert!(sweep_b.q1.is_normalized() && sweep_b.q2.is_normalized());

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    let t_max = input.max_fraction;

    let slop = linear_slop();
    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = slop.max(total_radius - slop);
    let tolerance = 0.25 * slop;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut distance_iterations = 0;

    // Prepare input for distance query
    let mut cache = SimplexCache::default();
    let mut distance_input = DistanceInput {
        proxy_a: input.proxy_a,
        proxy_b: input.proxy_b,
        transform_a: Transform::IDENTITY,
        transform_b: Transform::IDENTITY,
        use_radii: false,
    };

    // The outer loop progressively attempts to compute new separating axes.
    // This loop terminates when an axis is repeated (no progress is made).
    loop {
        distance_input.transform_a = sweep_a.transform_at(t1);
        distance_input.transform_b = sweep_b.transform_at(t1);

        // Get the distance between shapes. We can also use the results to
        // get a separating axis.
        let distance_output = shape_distance(&distance_input, &mut cache, None);

        distance_iterations += 1;
        output.iterations = distance_iterations;

        // If the shapes are overlapped, we give up on continuous collision.
        if distance_output.distance <= 0.0 {
            output.state = ToiState::Overlapped;
            output.fraction = 0.0;
            break;
        }

        if distance_output.distance < target + tolerance {
            output.state = ToiState::Hit;
            output.fraction = t1;
            output.normal = distance_output.normal;
            output.point = Vec2::mul_add(distance_output.point_a, proxy_a.radius, distance_output.normal);
            break;
        }

        // Initialize the separating axis
        let fcn = SeparationFunction::new(&cache, proxy_a, &sweep_a, proxy_b, &sweep_b, t1);

        // Compute the TOI on the separating axis. We do this by successively
        // resolving the deepest point. This loop is bounded by the number of
        // vertices.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iterations = 0;
        loop {
            // Find the deepest point at t2. Store the witness point indices.
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Is the final configuration separated?
            if s2 > target + tolerance {
                output.state = ToiState::Separated;
                output.fraction = t_max;
                done = true;
                break;
            }

            // Has the separation reached tolerance?
            if s2 > target - tolerance {
                // Advance the sweeps
                t1 = t2;
                break;
            }

            // Compute the initial separation of the witness points.
            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Check for initial overlap. This might happen if the root finder
            // runs out of iterations.
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.fraction = t1;
                done = true;
                break;
            }

            // Check for touching
            if s1 <= target + tolerance {
                // t1 should hold the TOI (could be 0.0)
                output.state = ToiState::Hit;
                output.fraction = t1;
                done = true;
                break;
            }

            // Compute 1D root of: f(x) - target = 0
            let mut a1 = t1;
            let mut a2 = t2;
            for root_iteration in 0..TOI_MAX_ROOT_ITERATIONS {
                // Use a mix of the secant rule and bisection
                let t = if root_iteration & 1 == 1 {
                    // Secant rule to improve convergence
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    // Bisection to guarantee progress
                    0.5 * (a1 + a2)
                };

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // Ensure we continue to bracket the root
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }
            }

            push_back_iterations += 1;
            if push_back_iterations == MAX_POLYGON_VERTICES {
                break;
            }
        }

        if done {
            break;
        }

        if distance_iterations == TOI_MAX_ITERATIONS {
            // Root finder got stuck. Semi-victory.
            output.state = ToiState::Failed;
            output.fraction = t1;
            break;
        }
    }

    if matches!(output.state, ToiState::Hit | ToiState::Failed) && output.normal == Vec2::ZERO {
        // Report the contact geometry at the final fraction
        distance_input.transform_a = sweep_a.transform_at(output.fraction);
        distance_input.transform_b = sweep_b.transform_at(output.fraction);
        let distance_output = shape_distance(&distance_input, &mut cache, None);
        output.normal = distance_output.normal;
        output.point = Vec2::mul_add(distance_output.point_a, proxy_a.radius, distance_output.normal);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::distance::make_proxy;
    use crate::math::Rot;
    use approx::assert_relative_eq;

    fn box_proxy(half: f32) -> ShapeProxy {
        make_proxy(
            &[
                Vec2::new(-half, -half),
                Vec2::new(half, -half),
                Vec2::new(half, half),
                Vec2::new(-half, half),
            ],
            0.0,
        )
    }

    fn still(position: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c1: position,
            c2: position,
            q1: Rot::IDENTITY,
            q2: Rot::IDENTITY,
        }
    }

    #[test]
    fn test_fast_box_hits_wall() {
        let input = ToiInput {
            proxy_a: box_proxy(0.5),
            proxy_b: box_proxy(0.1),
            sweep_a: still(Vec2::ZERO),
            sweep_b: Sweep {
                local_center: Vec2::ZERO,
                c1: Vec2::new(-10.0, 0.0),
                c2: Vec2::new(10.0, 0.0),
                q1: Rot::IDENTITY,
                q2: Rot::IDENTITY,
            },
            max_fraction: 1.0,
        };

        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Hit);
        // B's right face reaches A's left face at x = -0.6
        let expected = (10.0 - 0.6) / 20.0;
        assert!((output.fraction - expected).abs() < 0.01, "fraction {}", output.fraction);
        assert_relative_eq!(output.normal.x, -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_separated_and_overlapped() {
        let mut input = ToiInput {
            proxy_a: box_proxy(0.5),
            proxy_b: box_proxy(0.5),
            sweep_a: still(Vec2::ZERO),
            sweep_b: Sweep {
                local_center: Vec2::ZERO,
                c1: Vec2::new(0.0, 5.0),
                c2: Vec2::new(4.0, 5.0),
                q1: Rot::IDENTITY,
                q2: Rot::IDENTITY,
            },
            max_fraction: 1.0,
        };
        assert_eq!(time_of_impact(&input).state, ToiState::Separated);

        input.sweep_b = still(Vec2::new(0.2, 0.0));
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Overlapped);
        assert_eq!(output.fraction, 0.0);
    }

    #[test]
    fn test_rotating_bar_hits_circle() {
        let bar = make_proxy(&[Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0)], 0.05);
        let circle = make_proxy(&[Vec2::ZERO], 0.25);
        let input = ToiInput {
            proxy_a: bar,
            proxy_b: circle,
            sweep_a: Sweep {
                local_center: Vec2::ZERO,
                c1: Vec2::ZERO,
                c2: Vec2::ZERO,
                q1: Rot::IDENTITY,
                q2: Rot::from_angle(2.0),
            },
            sweep_b: still(Vec2::new(0.0, 1.5)),
            max_fraction: 1.0,
        };
        let output = time_of_impact(&input);
        assert_eq!(output.state, ToiState::Hit);
        assert!(output.fraction > 0.0 && output.fraction < 1.0);
    }
}
