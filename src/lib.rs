#![warn(clippy::all, clippy::pedantic, clippy::cargo, clippy::nursery)]
pub mod action;
pub mod car;
pub mod config;
pub mod game;
pub mod log;
pub mod runtime;
pub mod tui;
