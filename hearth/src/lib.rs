#[cfg(feature = "hearth-base")]
pub use hearth_base as base;

#[cfg(feature = "hearth-loader")]
pub use hearth_loader as loader;
