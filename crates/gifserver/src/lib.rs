//! gifserver: an HTTP gateway that fetches animated GIFs, transcodes them
//! with ffmpeg, and serves the results from a disk-backed cache.

pub mod config;
pub mod errors;
pub mod pipeline;
pub mod services;
pub mod signature;
pub mod utils;
pub mod web;
