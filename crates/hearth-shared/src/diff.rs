//! Partial updates with an explicit clear list.
//!
//! Update events carry two things: a partial object whose present fields
//! replace the current values, and a list of field names to reset to their
//! empty state. [`apply_diff`] is the single routine that applies both, in
//! that order, for every patchable entity kind.

use serde::de::DeserializeOwned;

/// An entity that accepts partial updates.
pub trait Patchable {
    /// Partial form of the entity: every field optional.
    type Patch: DeserializeOwned + Default;
    /// Names of the fields a server may explicitly clear.
    type Field: DeserializeOwned + Copy;

    /// Overwrite every field that is present in `patch`.
    fn overlay(&mut self, patch: Self::Patch);

    /// Reset one field to its empty state.
    fn clear(&mut self, field: Self::Field);
}

/// Overlay the patch, then apply the clear list. A field that is both
/// patched and cleared ends up cleared.
pub fn apply_diff<T: Patchable>(target: &mut T, patch: T::Patch, clear: &[T::Field]) {
    target.overlay(patch);
    for field in clear {
        target.clear(*field);
    }
}

/// Copy each listed `Option` field from the patch when it is present.
#[macro_export]
macro_rules! overlay_fields {
    ($target:expr, $patch:expr; $($field:ident),* $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value.into();
            }
        )*
    };
}
