#![forbid(unsafe_code)]

pub mod auth;
pub mod ids;
pub mod model;
