//! Everything around the propagation core: scene files, engine configuration and image export.

pub mod config;
pub mod heatmap;
pub mod scene;

pub use config::{EngineKind, SimulationConfig};
pub use heatmap::{BuildingMap, DbmRange, RunReport, TransmitterReport, render_grayscale, render_heatmap};
pub use scene::{Scene, SceneLoadError, load_scene};
