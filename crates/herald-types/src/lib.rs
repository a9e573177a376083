pub mod api;
pub mod delivery;
pub mod models;
