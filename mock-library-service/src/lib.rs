pub mod config;
pub mod dtos;
pub mod handlers;
pub mod startup;
pub mod state;
