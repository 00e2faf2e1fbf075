//! Reentrant, owner-tracked locking for resource objects.
//!
//! Each resource object owns one [`ObjectLock`]. A thread acquires it through
//! a scoped guard and may re-enter it freely; only the guard that actually
//! acquired the lock releases it.
//!
//! [`LockGuard`] additionally decides at release time whether observers must
//! be notified:
//!
//! ```text
//!   policy   │ captured at acquisition     │ evaluated at release
//!  ──────────┼─────────────────────────────┼──────────────────────────────
//!   NEVER    │ nothing                     │ never notify
//!   ALWAYS   │ nothing                     │ always notify
//!   UPDATED  │ deep copy of the attributes │ notify if live map != copy
//! ```
//!
//! Only the outermost guard of a thread captures anything, so a critical
//! section produces at most one notification no matter how many nested
//! guards and mutations it contains.

use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use rcs_core::{AttributeMap, AutoNotifyPolicy};
use tracing::warn;

use crate::resource::ResourceObject;

/// Mutual exclusion lock that remembers which thread holds it.
#[derive(Debug, Default)]
pub(crate) struct ObjectLock {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl ObjectLock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_held_by_current_thread(&self) -> bool {
        *self.owner.lock() == Some(thread::current().id())
    }

    /// Block until the calling thread owns the lock.
    ///
    /// Returns `false` without blocking if the thread already owned it.
    pub(crate) fn acquire(&self) -> bool {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        if *owner == Some(me) {
            return false;
        }
        while owner.is_some() {
            self.released.wait(&mut owner);
        }
        *owner = Some(me);
        true
    }

    pub(crate) fn release(&self) {
        *self.owner.lock() = None;
        self.released.notify_one();
    }
}

// Guards release an owner-tracked lock, so they must be dropped on the
// thread that created them
type NotSend = PhantomData<*const ()>;

/// Acquires the resource lock unless the calling thread already holds it.
///
/// Never notifies observers. The guard is bound to the thread that created
/// it:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use rcs_server::{Builder, InMemoryPlatform, WeakGuard};
///
/// fn assert_send<T: Send>(_: T) {}
///
/// let resource = Builder::new("/a/x", "x.t", "")
///     .build(Arc::new(InMemoryPlatform::new()))
///     .unwrap();
/// assert_send(WeakGuard::new(&resource));
/// ```
pub struct WeakGuard<'a> {
    resource: &'a ResourceObject,
    has_locked: bool,
    _not_send: NotSend,
}

impl<'a> WeakGuard<'a> {
    pub fn new(resource: &'a ResourceObject) -> Self {
        let has_locked = resource.object_lock().acquire();
        Self {
            resource,
            has_locked,
            _not_send: PhantomData,
        }
    }

    /// Whether this guard acquired the lock (as opposed to re-entering it).
    pub fn has_locked(&self) -> bool {
        self.has_locked
    }
}

impl Drop for WeakGuard<'_> {
    fn drop(&mut self) {
        if self.has_locked {
            self.resource.object_lock().release();
        }
    }
}

enum NotifyCheck {
    Never,
    Always,
    Updated(AttributeMap),
}

/// Scoped lock over a resource that may notify observers when released.
///
/// # Example
/// ```ignore
/// {
///     let _lock = LockGuard::new(&resource);
///     resource.set_attribute("Temperature", 22)?;
///     resource.set_attribute("Humidity", 40)?;
/// } // one notification, if anything changed
/// ```
///
/// Like [`WeakGuard`], it cannot leave the thread that created it:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use std::thread;
/// use rcs_server::{Builder, InMemoryPlatform, LockGuard};
///
/// let resource = Builder::new("/a/x", "x.t", "")
///     .build(Arc::new(InMemoryPlatform::new()))
///     .unwrap();
/// let lock = LockGuard::new(&resource);
/// thread::scope(|s| {
///     s.spawn(move || drop(lock));
/// });
/// ```
pub struct LockGuard<'a> {
    resource: &'a ResourceObject,
    has_locked: bool,
    check: NotifyCheck,
    _not_send: NotSend,
}

impl<'a> LockGuard<'a> {
    /// Lock with the resource's configured auto-notify policy.
    pub fn new(resource: &'a ResourceObject) -> Self {
        Self::with_policy(resource, resource.auto_notify_policy())
    }

    /// Lock with an explicit auto-notify policy for this scope.
    pub fn with_policy(resource: &'a ResourceObject, policy: AutoNotifyPolicy) -> Self {
        let has_locked = resource.object_lock().acquire();

        let check = if !has_locked {
            NotifyCheck::Never
        } else {
            match policy {
                AutoNotifyPolicy::Never => NotifyCheck::Never,
                AutoNotifyPolicy::Always => NotifyCheck::Always,
                AutoNotifyPolicy::Updated => NotifyCheck::Updated(resource.snapshot_attributes()),
            }
        };

        Self {
            resource,
            has_locked,
            check,
            _not_send: PhantomData,
        }
    }

    pub fn has_locked(&self) -> bool {
        self.has_locked
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // Skip notification while unwinding; the lock is still released
        if !thread::panicking() {
            let should_notify = match &self.check {
                NotifyCheck::Never => false,
                NotifyCheck::Always => true,
                NotifyCheck::Updated(snapshot) => self.resource.attributes_differ(snapshot),
            };

            if should_notify {
                if let Err(e) = self.resource.notify() {
                    warn!("Failed to notify observers of {}: {}", self.resource.uri(), e);
                }
            }
        }

        if self.has_locked {
            self.resource.object_lock().release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::platform::InMemoryPlatform;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    fn thermostat(platform: &Arc<InMemoryPlatform>) -> Arc<ResourceObject> {
        Builder::new("/a/thermostat", "oic.r.temperature", "")
            .set_attributes([("Temperature", 21)].into_iter().collect())
            .build(platform.clone())
            .unwrap()
    }

    fn notifications(platform: &InMemoryPlatform, resource: &ResourceObject) -> usize {
        platform.notification_count(resource.handle().unwrap())
    }

    #[test]
    fn test_reentrant_acquire() {
        let lock = ObjectLock::new();
        assert!(!lock.is_held_by_current_thread());

        assert!(lock.acquire());
        assert!(lock.is_held_by_current_thread());
        assert!(!lock.acquire());

        lock.release();
        assert!(!lock.is_held_by_current_thread());
    }

    #[test]
    fn test_other_thread_blocks_until_release() {
        let lock = Arc::new(ObjectLock::new());
        let acquired = Arc::new(AtomicBool::new(false));
        assert!(lock.acquire());

        let (tx, rx) = mpsc::channel();
        let worker = {
            let lock = lock.clone();
            let acquired = acquired.clone();
            thread::spawn(move || {
                tx.send(()).unwrap();
                assert!(lock.acquire());
                acquired.store(true, Ordering::SeqCst);
                assert!(lock.is_held_by_current_thread());
                lock.release();
            })
        };

        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        assert!(lock.is_held_by_current_thread());

        lock.release();
        worker.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_always_guard_notifies_without_change() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = thermostat(&platform);

        {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Always);
        }
        assert_eq!(notifications(&platform, &resource), 1);
    }

    #[test]
    fn test_never_guard_suppresses_change() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = thermostat(&platform);

        {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Never);
            resource.set_attribute("Temperature", 30).unwrap();
        }
        assert_eq!(notifications(&platform, &resource), 0);
        assert_eq!(resource.get_attribute_value("Temperature").unwrap(), Some(30.into()));
    }

    #[test]
    fn test_updated_guard_notifies_every_real_change() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = thermostat(&platform);

        {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Updated);
            resource.set_attribute("Temperature", 21).unwrap();
        }
        assert_eq!(notifications(&platform, &resource), 0);

        {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Updated);
            resource.set_attribute("Temperature", 22).unwrap();
        }
        assert_eq!(notifications(&platform, &resource), 1);

        {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Updated);
            resource.remove_attribute("Temperature").unwrap();
        }
        assert_eq!(notifications(&platform, &resource), 2);

        {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Updated);
            resource.with_attributes_mut(|a| a.set("Setpoint", 18.5)).unwrap();
        }
        assert_eq!(notifications(&platform, &resource), 3);
    }

    #[test]
    fn test_weak_guard_never_notifies() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = thermostat(&platform);
        resource.set_auto_notify_policy(AutoNotifyPolicy::Always);

        {
            let guard = WeakGuard::new(&resource);
            assert!(guard.has_locked());
            resource.set_attribute("Temperature", 30).unwrap();
        }
        assert_eq!(notifications(&platform, &resource), 0);
        assert!(!resource.object_lock().is_held_by_current_thread());
    }

    #[test]
    fn test_weak_guard_reenters_lock_guard() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = thermostat(&platform);

        let lock = LockGuard::new(&resource);
        {
            let weak = WeakGuard::new(&resource);
            assert!(!weak.has_locked());
            resource.with_attributes_mut(|a| a.set("Temperature", 25)).unwrap();
        }
        // The inner guard did not release what it did not acquire
        assert!(resource.object_lock().is_held_by_current_thread());
        assert_eq!(notifications(&platform, &resource), 0);

        drop(lock);
        assert!(!resource.object_lock().is_held_by_current_thread());
        assert_eq!(notifications(&platform, &resource), 1);
    }

    #[test]
    fn test_mixed_nesting_only_outermost_decides() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = thermostat(&platform);

        {
            let outer = LockGuard::with_policy(&resource, AutoNotifyPolicy::Updated);
            {
                let middle = WeakGuard::new(&resource);
                {
                    let inner = LockGuard::with_policy(&resource, AutoNotifyPolicy::Always);
                    assert!(outer.has_locked());
                    assert!(!middle.has_locked());
                    assert!(!inner.has_locked());
                    resource.set_attribute("Temperature", 22).unwrap();
                }
                resource.set_attribute("Humidity", 40).unwrap();
            }
            assert!(resource.object_lock().is_held_by_current_thread());
            assert_eq!(notifications(&platform, &resource), 0);
        }

        assert_eq!(notifications(&platform, &resource), 1);
        assert!(!resource.object_lock().is_held_by_current_thread());
    }

    #[test]
    fn test_no_notification_while_panicking() {
        let platform = Arc::new(InMemoryPlatform::new());
        let resource = thermostat(&platform);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _lock = LockGuard::with_policy(&resource, AutoNotifyPolicy::Always);
            resource.set_attribute("Temperature", 30).unwrap();
            panic!("handler failed");
        }));

        assert!(result.is_err());
        assert_eq!(notifications(&platform, &resource), 0);

        // The lock was still released, so another thread can take it
        let writer = {
            let resource = resource.clone();
            thread::spawn(move || resource.set_attribute("Temperature", 31).unwrap())
        };
        writer.join().unwrap();
        assert_eq!(resource.get_attribute_value("Temperature").unwrap(), Some(31.into()));
    }
}
