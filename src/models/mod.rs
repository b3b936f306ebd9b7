pub mod config;
pub mod orientation;
