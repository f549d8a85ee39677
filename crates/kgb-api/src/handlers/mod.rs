//! API handlers
//!
//! Author: hephaex@gmail.com

pub mod graph;
pub mod health;
