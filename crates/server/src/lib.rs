pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod routes;
pub mod store;
