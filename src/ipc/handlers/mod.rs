pub mod analytics;
pub mod core;
mod params;
pub mod roster;
pub mod view;
