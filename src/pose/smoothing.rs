use super::landmark::{LandmarkIndex, Pose};

/// Low-pass filter component
#[derive(Debug, Clone)]
struct LowPassFilter {
    prev: Option<f32>,
}

impl LowPassFilter {
    fn new() -> Self {
        Self { prev: None }
    }

    fn filter(&mut self, value: f32, alpha: f32) -> f32 {
        let result = match self.prev {
            Some(prev) => alpha * value + (1.0 - alpha) * prev,
            None => value,
        };
        self.prev = Some(result);
        result
    }
}

/// alpha = 1 / (1 + tau/Te), tau = 1/(2*pi*fc)
fn smoothing_factor(te: f32, cutoff: f32) -> f32 {
    let r = 2.0 * std::f32::consts::PI * cutoff * te;
    r / (r + 1.0)
}

/// One Euro Filter for a single scalar value
#[derive(Debug, Clone)]
struct ScalarFilter {
    min_cutoff: f32,
    beta: f32,
    d_cutoff: f32,
    x_filter: LowPassFilter,
    dx_filter: LowPassFilter,
    prev_value: Option<f32>,
}

impl ScalarFilter {
    fn new(min_cutoff: f32, beta: f32, d_cutoff: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            d_cutoff,
            x_filter: LowPassFilter::new(),
            dx_filter: LowPassFilter::new(),
            prev_value: None,
        }
    }

    fn filter(&mut self, value: f32, dt: f32) -> f32 {
        let dx = match self.prev_value {
            Some(prev) if dt > 0.0 => (value - prev) / dt,
            _ => 0.0,
        };
        self.prev_value = Some(value);

        let edx = self.dx_filter.filter(dx, smoothing_factor(dt, self.d_cutoff));
        let cutoff = self.min_cutoff + self.beta * edx.abs();
        self.x_filter.filter(value, smoothing_factor(dt, cutoff))
    }
}

/// ランドマーク座標 (x, y, z) の One Euro Filter
///
/// static_image_mode が false の時だけ推定器の内部で使う。
/// visibility / presence は平滑化しない。
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
    min_cutoff: f32,
    beta: f32,
    filters: Option<Vec<[ScalarFilter; 3]>>,
}

impl LandmarkSmoother {
    pub fn new(min_cutoff: f32, beta: f32) -> Self {
        Self {
            min_cutoff,
            beta,
            filters: None,
        }
    }

    /// dt: 前フレームからの経過秒
    pub fn apply(&mut self, pose: &Pose, dt: f32) -> Pose {
        let (min_cutoff, beta) = (self.min_cutoff, self.beta);
        let filters = self.filters.get_or_insert_with(|| {
            (0..LandmarkIndex::COUNT)
                .map(|_| std::array::from_fn(|_| ScalarFilter::new(min_cutoff, beta, 1.0)))
                .collect()
        });

        let mut out = pose.clone();
        for (lm, f) in out.landmarks.iter_mut().zip(filters.iter_mut()) {
            lm.x = f[0].filter(lm.x, dt);
            lm.y = f[1].filter(lm.y, dt);
            lm.z = f[2].filter(lm.z, dt);
        }
        out
    }

    /// 人物を見失った時にリセット
    pub fn reset(&mut self) {
        self.filters = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::landmark::Landmark;

    fn uniform_pose(v: f32) -> Pose {
        Pose::new([Landmark::new(v, v, v, 0.9, 0.9); LandmarkIndex::COUNT])
    }

    #[test]
    fn test_smoothing_factor_bounds() {
        for &cutoff in &[0.05, 1.0, 10.0, 100.0] {
            for &te in &[0.001, 0.01, 0.033, 0.1] {
                let alpha = smoothing_factor(te, cutoff);
                assert!(alpha > 0.0 && alpha < 1.0, "alpha={} for te={}, cutoff={}", alpha, te, cutoff);
            }
        }
    }

    #[test]
    fn test_first_frame_passthrough() {
        let mut s = LandmarkSmoother::new(1.0, 0.0);
        let pose = uniform_pose(0.3);
        assert_eq!(s.apply(&pose, 0.033), pose);
    }

    #[test]
    fn test_smooths_jump() {
        let mut s = LandmarkSmoother::new(1.0, 0.0);
        s.apply(&uniform_pose(0.0), 0.033);
        let result = s.apply(&uniform_pose(1.0), 0.033);
        let x = result.landmarks[0].x;
        assert!(x > 0.0 && x < 1.0, "Expected smoothing, got {}", x);
        // visibility はそのまま
        assert_eq!(result.landmarks[0].visibility, 0.9);
    }

    #[test]
    fn test_high_beta_more_responsive() {
        let mut low = LandmarkSmoother::new(1.0, 0.0);
        let mut high = LandmarkSmoother::new(1.0, 10.0);
        low.apply(&uniform_pose(0.0), 0.033);
        high.apply(&uniform_pose(0.0), 0.033);
        let r_low = low.apply(&uniform_pose(1.0), 0.033).landmarks[0].x;
        let r_high = high.apply(&uniform_pose(1.0), 0.033).landmarks[0].x;
        assert!(r_high > r_low, "high beta {} should beat low beta {}", r_high, r_low);
    }

    #[test]
    fn test_reset() {
        let mut s = LandmarkSmoother::new(0.01, 0.0);
        s.apply(&uniform_pose(0.0), 0.033);
        s.reset();
        let pose = uniform_pose(0.8);
        assert_eq!(s.apply(&pose, 0.033), pose);
    }
}
