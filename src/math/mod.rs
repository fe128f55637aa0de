//! Numerical helpers shared across the engine.

pub mod geo;

pub use geo::{great_circle_points, haversine_km, EARTH_RADIUS_KM};
