mod destination;

pub use destination::{planar_destination, spherical_destination};
