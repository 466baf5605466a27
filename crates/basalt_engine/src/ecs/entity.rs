//! Entity implementation

slotmap::new_key_type! {
    /// Generational entity identifier
    pub struct Entity;
}
