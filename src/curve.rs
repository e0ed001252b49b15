//! Keyframe tracks used to evaluate animated node properties.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};

/// How values between two keys are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
    /// Hermite spline; every key stores `[in_tangent, value, out_tangent]`.
    CubicSpline,
}

/// Values that can be interpolated by a [`Track`].
pub trait Keyable: Copy {
    fn interpolate(&self, other: &Self, t: f64) -> Self;
    fn scaled(&self, factor: f64) -> Self;
    fn hermite(p0: &Self, m0: &Self, p1: &Self, m1: &Self, t: f64) -> Self;
}

impl Keyable for Vector3<f64> {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        self.lerp(other, t)
    }

    fn scaled(&self, factor: f64) -> Self {
        self * factor
    }

    fn hermite(p0: &Self, m0: &Self, p1: &Self, m1: &Self, t: f64) -> Self {
        let (h00, h10, h01, h11) = hermite_basis(t);
        p0 * h00 + m0 * h10 + p1 * h01 + m1 * h11
    }
}

/// Rotations are keyed as raw quaternions so spline tangents survive; sampled
/// values are normalized by the caller.
impl Keyable for Quaternion<f64> {
    fn interpolate(&self, other: &Self, t: f64) -> Self {
        let from = UnitQuaternion::new_normalize(*self);
        let to = UnitQuaternion::new_normalize(*other);
        from.try_slerp(&to, t, 1e-12)
            .unwrap_or_else(|| from.nlerp(&to, t))
            .into_inner()
    }

    fn scaled(&self, factor: f64) -> Self {
        *self * factor
    }

    fn hermite(p0: &Self, m0: &Self, p1: &Self, m1: &Self, t: f64) -> Self {
        let (h00, h10, h01, h11) = hermite_basis(t);
        *p0 * h00 + *m0 * h10 + *p1 * h01 + *m1 * h11
    }
}

fn hermite_basis(t: f64) -> (f64, f64, f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;
    (
        2.0 * t3 - 3.0 * t2 + 1.0,
        t3 - 2.0 * t2 + t,
        -2.0 * t3 + 3.0 * t2,
        t3 - t2,
    )
}

/// A keyed curve for one property of one node.
#[derive(Debug, Clone)]
pub struct Track<T> {
    times: Vec<f64>,
    values: Vec<T>,
    interpolation: Interpolation,
}

impl<T: Keyable> Track<T> {
    /// Builds a track. Returns `None` when there are no keys, the times are
    /// decreasing somewhere, or the value count does not fit the interpolation.
    pub fn new(times: Vec<f64>, values: Vec<T>, interpolation: Interpolation) -> Option<Self> {
        let per_key = match interpolation {
            Interpolation::CubicSpline => 3,
            _ => 1,
        };
        if times.is_empty() || values.len() != times.len() * per_key {
            return None;
        }
        if times.windows(2).any(|pair| pair[1] < pair[0]) {
            return None;
        }
        Some(Self {
            times,
            values,
            interpolation,
        })
    }

    /// A single-key track holding `value` at every time.
    pub fn constant(value: T) -> Self {
        Self {
            times: vec![0.0],
            values: vec![value],
            interpolation: Interpolation::Step,
        }
    }

    pub fn key_count(&self) -> usize {
        self.times.len()
    }

    /// Evaluates the track, clamping to the first/last key outside its range.
    pub fn sample(&self, time: f64) -> T {
        let last = self.times.len() - 1;
        if time <= self.times[0] {
            return self.key_value(0);
        }
        if time >= self.times[last] {
            return self.key_value(last);
        }

        let next = self.times.partition_point(|key| *key <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let t = if span > 0.0 {
            (time - self.times[prev]) / span
        } else {
            0.0
        };

        match self.interpolation {
            Interpolation::Step => self.key_value(prev),
            Interpolation::Linear => self.values[prev].interpolate(&self.values[next], t),
            Interpolation::CubicSpline => T::hermite(
                &self.values[prev * 3 + 1],
                &self.values[prev * 3 + 2].scaled(span),
                &self.values[next * 3 + 1],
                &self.values[next * 3].scaled(span),
                t,
            ),
        }
    }

    fn key_value(&self, key: usize) -> T {
        match self.interpolation {
            Interpolation::CubicSpline => self.values[key * 3 + 1],
            _ => self.values[key],
        }
    }
}
