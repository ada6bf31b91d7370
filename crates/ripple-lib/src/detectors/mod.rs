pub mod power;
pub mod reject;
pub mod ripples;
pub mod segment;

pub use ripples::{detect_ripples, RippleDetector};
