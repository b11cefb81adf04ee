//! Test Helper Utilities
//!
//! Shared utilities for testing audy-server

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod test_env;

// Re-export commonly used items
pub use audio_generator::{
    frame_bytes, mp3_bytes, mp3_with_picture, png_bytes, write_mp3, FrameFormat, FRAME_LEN,
    FRAME_SECONDS, MPEG1_L3, MPEG1_L3_CRC, MPEG2_L3,
};
pub use test_env::{
    admin_request, create_test_env, create_test_env_with, fast_settings, user_get, user_request,
    TestEnv, ADMIN_SESSION, USER_SESSION,
};
