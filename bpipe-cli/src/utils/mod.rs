pub mod counter;
pub mod exit;
