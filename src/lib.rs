//! 2D radio signal propagation over floor plans.
//!
//! [`simulation`] holds the propagation core: geometry, obstacles, the discretized space and the
//! raycasting, wavefront and Friis engines. [`common`] loads scenes and configuration and exports
//! the resulting maps as images.

pub mod common;
pub mod simulation;
