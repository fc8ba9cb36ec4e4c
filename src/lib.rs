// Quiz engine, question generator and store clients behind the `cquiz`
// terminal app. The binary in main.rs only drives these through commands.

pub mod cache;
pub mod config;
pub mod generator;
pub mod identity;
pub mod question;
pub mod session;
pub mod store;
