pub mod analytics;
pub mod core;
pub mod marks;
pub mod recompute;
pub mod reports;
pub mod setup;
