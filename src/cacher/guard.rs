use std::ops::{Deref, DerefMut};

use super::Cacher;

/// Temporarily overrides a cacher's `auto_save` flag.
///
/// The previous value is restored when the guard is dropped, whether the
/// scope ends normally, returns early through `?`, or unwinds.
pub struct AutoSaveOverride<'a, C: Cacher> {
    cacher: &'a mut C,
    previous: bool,
}

impl<'a, C: Cacher> AutoSaveOverride<'a, C> {
    pub(crate) fn new(cacher: &'a mut C, value: bool) -> Self {
        let previous = cacher.auto_save();
        cacher.core_mut().auto_save = value;
        Self { cacher, previous }
    }

    /// The flag that will be restored on drop.
    pub fn previous(&self) -> bool {
        self.previous
    }
}

impl<C: Cacher> Deref for AutoSaveOverride<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.cacher
    }
}

impl<C: Cacher> DerefMut for AutoSaveOverride<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.cacher
    }
}

impl<C: Cacher> Drop for AutoSaveOverride<'_, C> {
    fn drop(&mut self) {
        self.cacher.core_mut().auto_save = self.previous;
    }
}
