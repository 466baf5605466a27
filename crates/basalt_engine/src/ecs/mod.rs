//! Entity-Component-System
//!
//! A small registry: entities are generational keys, components live in
//! per-type secondary maps, and typed views iterate the entities that carry a
//! given tuple of component types. The renderer consumes the registry
//! read-only through these views; game code mutates it between frames.

mod component;
mod entity;
mod world;

pub mod components;

pub use component::Component;
pub use entity::Entity;
pub use world::World;
