pub mod ai;
pub mod auth;
pub mod auto;
pub mod dex;
pub mod exchange;
pub mod market;
pub mod settings;
