//! Default values for configuration fields.

use std::path::PathBuf;

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    9090
}

pub fn default_secret() -> String {
    // empty secret disables the signature gate
    String::new()
}

pub fn default_cache_dir() -> PathBuf {
    PathBuf::from("gifcache")
}

pub fn default_max_bytes() -> u64 {
    5 * 1024 * 1024
}

pub fn default_max_width() -> u32 {
    512
}

pub fn default_max_height() -> u32 {
    512
}

pub fn default_max_concurrency() -> usize {
    // 0 means unbounded
    0
}

pub fn default_format() -> String {
    "mp4".to_string()
}

pub fn default_ffmpeg_command() -> String {
    "ffmpeg".to_string()
}

pub fn default_ffprobe_command() -> String {
    "ffprobe".to_string()
}
