use core::{
    cell::UnsafeCell,
    marker::PhantomData,
    sync::atomic::{AtomicBool, Ordering},
};

use super::irq::IrqControl;

/// Spinlock that masks interrupts on the local core while held.
///
/// State touched from both a completion interrupt and thread code must
/// live behind this lock; otherwise an interrupt arriving while the thread
/// holds the lock would spin forever.
///
/// Not fair. Not reentrant.
pub struct IrqSpinLock<T, I: IrqControl> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
    _irq: PhantomData<I>,
}

// SAFETY: access to `data` is serialized by `locked`.
unsafe impl<T: Send, I: IrqControl> Send for IrqSpinLock<T, I> {}
unsafe impl<T: Send, I: IrqControl> Sync for IrqSpinLock<T, I> {}

impl<T, I: IrqControl> IrqSpinLock<T, I> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
            _irq: PhantomData,
        }
    }

    /// Mask interrupts, then spin until the lock is acquired.
    pub fn lock(&self) -> IrqSpinLockGuard<'_, T, I> {
        let irq_state = I::disable();

        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            core::hint::spin_loop();
        }

        IrqSpinLockGuard {
            lock: self,
            irq_state,
        }
    }

    /// Acquire the lock only if it is free, restoring the interrupt state
    /// on failure.
    pub fn try_lock(&self) -> Option<IrqSpinLockGuard<'_, T, I>> {
        let irq_state = I::disable();

        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(IrqSpinLockGuard {
                lock: self,
                irq_state,
            })
        } else {
            I::restore(irq_state);
            None
        }
    }

    /// Exclusive access without locking; the borrow checker proves no
    /// guard exists.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default, I: IrqControl> Default for IrqSpinLock<T, I> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Guard returned by [`IrqSpinLock::lock`].
///
/// Releases the lock and then restores the interrupt state on drop.
pub struct IrqSpinLockGuard<'a, T, I: IrqControl> {
    lock: &'a IrqSpinLock<T, I>,
    irq_state: I::State,
}

impl<T, I: IrqControl> core::ops::Deref for IrqSpinLockGuard<'_, T, I> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: the guard proves the lock is held.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T, I: IrqControl> core::ops::DerefMut for IrqSpinLockGuard<'_, T, I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: the guard proves the lock is held.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T, I: IrqControl> Drop for IrqSpinLockGuard<'_, T, I> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        I::restore(self.irq_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicIsize;

    /// Tracks the nesting depth of masked sections.
    static MASK_DEPTH: AtomicIsize = AtomicIsize::new(0);

    #[derive(Debug, Clone, Copy)]
    struct CountingIrq;

    impl IrqControl for CountingIrq {
        type State = ();

        fn disable() {
            MASK_DEPTH.fetch_add(1, Ordering::SeqCst);
        }

        fn restore(_state: ()) {
            MASK_DEPTH.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn lock_masks_until_guard_drops() {
        let lock: IrqSpinLock<u32, CountingIrq> = IrqSpinLock::new(7);
        let before = MASK_DEPTH.load(Ordering::SeqCst);
        {
            let mut guard = lock.lock();
            *guard += 1;
            assert_eq!(MASK_DEPTH.load(Ordering::SeqCst), before + 1);
        }
        assert_eq!(MASK_DEPTH.load(Ordering::SeqCst), before);
        assert_eq!(lock.into_inner(), 8);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock: IrqSpinLock<u32, crate::arch::LocalIrq> = IrqSpinLock::new(0);
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn get_mut_bypasses_the_flag() {
        let mut lock: IrqSpinLock<[u8; 2], crate::arch::LocalIrq> = IrqSpinLock::new([0; 2]);
        lock.get_mut()[1] = 9;
        assert_eq!(*lock.lock(), [0, 9]);
    }
}
