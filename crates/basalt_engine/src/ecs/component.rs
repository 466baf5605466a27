//! Component trait

/// Marker trait for component types stored in the [`World`](super::World)
pub trait Component: 'static + Send + Sync {}

impl<T: 'static + Send + Sync> Component for T {}
