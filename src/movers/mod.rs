pub mod as_of;
pub mod calculator;

pub use calculator::compute_moves;
