#[macro_use]
extern crate lazy_static;

pub mod permutation;
pub mod strong;
pub mod quaternions;
pub mod geometry;
pub mod shapes;
pub mod stereo;
pub mod molecule;
