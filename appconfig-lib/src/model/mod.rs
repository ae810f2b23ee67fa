//! Typed models

mod setting;

pub use setting::*;
