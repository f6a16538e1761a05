pub mod activities;
pub mod api;
pub mod emotions;
pub mod events;
pub mod models;
