//! Intelligent Driver Model car-following formulas, grounded in
//! `original_source/cts-core/include/cts-core/traffic/vehicle.h`'s
//! `IdmMobil` constants and `getDesiredDistance`/`getAcceleration` bodies.
//!
//! The original also carries a `TypedVehicle<DrivingModelT>` template so the
//! driving model could vary per vehicle class (trucks, buses...). Since this
//! core excludes multi-class traffic, `Vehicle` uses this single concrete
//! model directly rather than being generic over it.

#[derive(Debug, Clone, Copy)]
pub struct DrivingModel {
    /// Desired time headway to the leader, in seconds.
    pub safe_time_headway: f64,
    /// Maximum acceleration under free-road conditions.
    pub max_acceleration: f64,
    /// Comfortable deceleration.
    pub comfortable_deceleration: f64,
    /// Maximum deceleration (hard braking).
    pub max_deceleration: f64,
    /// Minimum bumper-to-bumper gap at a standstill.
    pub min_distance: f64,
}

impl Default for DrivingModel {
    fn default() -> Self {
        DrivingModel {
            safe_time_headway: 1.4,
            max_acceleration: 1.2,
            comfortable_deceleration: 1.5,
            max_deceleration: 3.0,
            min_distance: 20.0,
        }
    }
}

impl DrivingModel {
    /// `s*(v, dv)` -- the desired dynamic gap to the leader given own
    /// velocity `velocity` and closing speed `delta_velocity` (positive means
    /// approaching the leader).
    pub fn desired_gap(&self, velocity: f64, delta_velocity: f64) -> f64 {
        let accel_term = velocity * delta_velocity
            / (2.0 * (self.max_acceleration * self.comfortable_deceleration).sqrt());
        self.min_distance + (velocity * self.safe_time_headway + accel_term).max(0.0)
    }

    /// Free-road acceleration term, applied when there is no leader (or the
    /// leader is far enough away to ignore): `aMax * (1 - (v/vdes)^2)`.
    pub fn acceleration_free(&self, velocity: f64, target_velocity: f64) -> f64 {
        if target_velocity <= 0.0 {
            return -self.max_deceleration;
        }
        self.max_acceleration * (1.0 - (velocity / target_velocity).powi(2))
    }

    /// The IDM acceleration combining free-road and interaction terms in one
    /// step: `aMax * (1 - (v/vdes)^2 - sqrt(desired_gap(v,dv) / d))`.
    pub fn acceleration(&self, velocity: f64, target_velocity: f64, gap: Option<(f64, f64)>) -> f64 {
        if target_velocity <= 0.0 {
            return -self.max_deceleration;
        }
        let free_term = 1.0 - (velocity / target_velocity).powi(2);
        let interaction_term = match gap {
            Some((gap, delta_velocity)) => {
                let gap = gap.max(1e-3);
                (self.desired_gap(velocity, delta_velocity) / gap).max(0.0).sqrt()
            }
            None => 0.0,
        };
        self.max_acceleration * (free_term - interaction_term)
    }
}
