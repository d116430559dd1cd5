//! Load-once data slot shared by lazily populated entities.

use std::future::Future;

use tokio::sync::OnceCell;

use super::error::BggResult;
use super::xml::Element;

/// Holds an entity's XML element, populated at most once.
///
/// Either a fetch or a seed from another response fills the slot; the
/// first writer wins and later seeds are ignored.
#[derive(Debug, Default)]
pub struct LazySlot {
    cell: OnceCell<Element>,
}

impl LazySlot {
    /// Creates an unloaded slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot that is already loaded.
    #[must_use]
    pub fn loaded(data: Element) -> Self {
        Self {
            cell: OnceCell::new_with(Some(data)),
        }
    }

    /// Returns `true` once data is present.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Loaded data, if any.
    #[must_use]
    pub fn get(&self) -> Option<&Element> {
        self.cell.get()
    }

    /// Populates the slot if it is still empty.
    ///
    /// Returns `true` if `data` was stored.
    pub fn seed(&self, data: Element) -> bool {
        self.cell.set(data).is_ok()
    }

    /// Returns the data, running `load` first if the slot is empty.
    ///
    /// A failed load leaves the slot empty.
    ///
    /// # Errors
    ///
    /// Propagates the error from `load`.
    pub async fn get_or_load<F, Fut>(&self, load: F) -> BggResult<&Element>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = BggResult<Element>>,
    {
        self.cell.get_or_try_init(load).await
    }
}
