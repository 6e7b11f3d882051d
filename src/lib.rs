pub mod constants;
pub mod engine;
pub mod game;
pub mod maze;
pub mod rng;
pub mod server_protocol;
pub mod types;
