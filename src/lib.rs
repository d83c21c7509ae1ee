pub mod auth;
pub mod cli;
pub mod mail;
pub mod providers;
pub mod server;
pub mod session;
