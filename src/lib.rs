//! Remote control for a Popcorn Hour style media player: a small HTTP server
//! that runs pre-approved shell commands, a client for the player's local
//! control API, and a media scanner that feeds it shuffled videos.

pub mod cli;
pub mod config;
pub mod device;
pub mod scanner;
pub mod server;
