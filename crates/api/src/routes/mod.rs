//! Route handlers

pub mod camera;
pub mod status;
pub mod stream;
