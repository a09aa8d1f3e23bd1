use std::sync::Arc;

use super::Derived;
use crate::process::RawRow;

/// Caches the derived view of the last row snapshot it was given.
///
/// Snapshots are shared `Arc`s that are never mutated, so pointer identity is
/// enough to know the rows are unchanged.
#[derive(Debug, Default)]
pub struct DerivedMemo {
    last: Option<(Arc<[RawRow]>, Arc<Derived>)>,
}

impl DerivedMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, rows: &Arc<[RawRow]>) -> Arc<Derived> {
        if let Some((cached_rows, derived)) = &self.last {
            if Arc::ptr_eq(cached_rows, rows) {
                return Arc::clone(derived);
            }
        }
        let derived = Arc::new(Derived::from_rows(rows));
        self.last = Some((Arc::clone(rows), Arc::clone(&derived)));
        derived
    }
}
