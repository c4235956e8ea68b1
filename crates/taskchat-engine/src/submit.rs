use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The single "submit" control. At most one [`SubmitGuard`] exists at a
/// time; submission is enabled again when it drops.
#[derive(Debug, Clone, Default)]
pub struct SubmitControl {
    locked: Arc<AtomicBool>,
}

impl SubmitControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_lock(&self) -> Option<SubmitGuard> {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SubmitGuard {
                locked: Arc::clone(&self.locked),
            })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SubmitGuard {
    locked: Arc<AtomicBool>,
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::SubmitControl;

    #[test]
    fn second_lock_is_refused_until_release() {
        let control = SubmitControl::new();
        let guard = control.try_lock();
        assert!(guard.is_some());
        assert!(control.is_locked());
        assert!(control.try_lock().is_none());

        drop(guard);
        assert!(!control.is_locked());
        assert!(control.try_lock().is_some());
    }

    #[test]
    fn guard_releases_from_another_thread() {
        let control = SubmitControl::new();
        let guard = control.try_lock();
        let handle = thread::spawn(move || drop(guard));
        assert!(handle.join().is_ok());
        assert!(!control.is_locked());
    }

    #[test]
    fn guard_releases_when_worker_panics() {
        let control = SubmitControl::new();
        let guard = control.try_lock();
        let handle = thread::spawn(move || {
            let _guard = guard;
            panic!("request worker died");
        });
        assert!(handle.join().is_err());
        assert!(!control.is_locked());
    }
}
