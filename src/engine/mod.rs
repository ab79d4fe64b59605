//! Cooking and render scheduling.

pub mod cook;
pub mod scheduler;
