//! Vehicles (C6): car-following dynamics, intersection decisions, and the
//! do-not-block rule.

mod driving_model;
mod vehicle;

pub use driving_model::DrivingModel;
pub use vehicle::{Vehicle, VehicleId, VehicleState};
