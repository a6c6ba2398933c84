//! Pooled byte buffers backing the packet codec.
//!
//! Every frame that is decoded or encoded borrows its storage from a
//! [`BufferPool`]. Returning storage is handled by [`PooledBuf`]'s `Drop`
//! impl, so a buffer cannot be returned twice: the guard owns the `Vec`
//! and gives it up exactly once.

use std::sync::Arc;

use parking_lot::Mutex;

/// Buffers start at this capacity and grow by doubling.
pub const BUF_FLOOR: usize = 128;

/// Idle buffers kept around per pool before excess storage is freed.
const MAX_IDLE: usize = 512;

/// Buffers larger than this are not returned to the shelf; one oversized
/// frame should not pin megabytes for the rest of the process lifetime.
const MAX_RETAINED_CAPACITY: usize = 1024 * 1024;

#[derive(Clone)]
pub struct BufferPool {
    shelf: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            shelf: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Take an empty buffer out of the pool, allocating if the shelf is dry.
    pub fn take(&self) -> PooledBuf {
        let storage = self
            .shelf
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(BUF_FLOOR));

        PooledBuf {
            storage,
            pool: self.clone(),
        }
    }

    /// Take a buffer with at least `capacity` bytes of headroom.
    pub fn take_with_capacity(&self, capacity: usize) -> PooledBuf {
        let mut buf = self.take();
        buf.reserve_to(capacity);
        buf
    }

    pub fn idle_count(&self) -> usize {
        self.shelf.lock().len()
    }

    fn put_back(&self, mut storage: Vec<u8>) {
        if storage.capacity() > MAX_RETAINED_CAPACITY {
            return;
        }
        storage.clear();

        let mut shelf = self.shelf.lock();
        if shelf.len() < MAX_IDLE {
            shelf.push(storage);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// An owned byte buffer on loan from a [`BufferPool`].
///
/// Grows by doubling from the pool floor so repeated small appends do not
/// reallocate per call. Dereferences to `Vec<u8>` for everything else.
pub struct PooledBuf {
    storage: Vec<u8>,
    pool:    BufferPool,
}

impl PooledBuf {
    /// Ensure capacity for `additional` more bytes, doubling from the
    /// current capacity (or the pool floor) until it fits.
    pub fn reserve_more(&mut self, additional: usize) {
        let needed = self.storage.len() + additional;
        self.reserve_to(needed);
    }

    fn reserve_to(&mut self, needed: usize) {
        let mut target = self.storage.capacity().max(BUF_FLOOR);
        while target < needed {
            target *= 2;
        }
        if target > self.storage.capacity() {
            self.storage.reserve_exact(target - self.storage.len());
        }
    }

    /// Detach the storage from the pool. Used when a frame's bytes must
    /// outlive the codec, e.g. when handed to another task.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.storage)
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        let storage = std::mem::take(&mut self.storage);
        self.pool.put_back(storage);
    }
}

impl std::ops::Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

impl std::ops::DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.storage
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        &self.storage
    }
}

impl std::fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.storage.len())
            .field("capacity", &self.storage.capacity())
            .finish()
    }
}
