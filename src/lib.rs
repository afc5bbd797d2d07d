pub mod bridge;
pub mod config;
pub mod engine;
pub mod errors;
pub mod ffi;
pub mod input;
pub mod lifecycle;
pub mod loader;
pub mod resource;
pub mod surface;

pub use bridge::*;
