use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Serialize, Serializer};

use crate::metric::MetricData;

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<MetricData>>,
    capacity: usize,
    outstanding: AtomicUsize,
}

/// A free list of reusable [`MetricData`] records.
///
/// Records are checked out with [`get`](Self::get) and returned automatically when the
/// [`PooledMetric`] guard is dropped. Returned records are reset but keep the capacity of their
/// strings and tag vectors, so that decoders filling them on the hot path rarely allocate.
///
/// The pool is a cheap handle and can be cloned into every request. At most `capacity` idle
/// records are retained; surplus records are freed.
#[derive(Clone)]
pub struct MetricPool {
    inner: Arc<PoolInner>,
}

impl MetricPool {
    /// Creates an empty pool retaining at most `capacity` idle records.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(capacity.min(1024))),
                capacity,
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Checks out a reset record.
    ///
    /// Reuses an idle record if one is available and allocates a new one otherwise.
    pub fn get(&self) -> PooledMetric {
        let metric = self.inner.free.lock().pop().unwrap_or_default();
        debug_assert!(metric.is_reset(), "pooled record was not reset");
        self.checkout(metric)
    }

    /// Brings a record that was decoded outside of the pool under pool management.
    ///
    /// When the returned guard is dropped, the record is reset and added to the free list like
    /// any other pooled record.
    pub fn adopt(&self, metric: MetricData) -> PooledMetric {
        self.checkout(metric)
    }

    /// Returns the number of records currently checked out.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Relaxed)
    }

    /// Returns the number of idle records held by the pool.
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }

    fn checkout(&self, metric: MetricData) -> PooledMetric {
        self.inner.outstanding.fetch_add(1, Ordering::Relaxed);
        PooledMetric {
            metric,
            pool: self.clone(),
        }
    }

    fn release(&self, mut metric: MetricData) {
        self.inner.outstanding.fetch_sub(1, Ordering::Relaxed);

        metric.reset();
        debug_assert!(metric.is_reset(), "released record was not reset");

        let mut free = self.inner.free.lock();
        if free.len() < self.inner.capacity {
            free.push(metric);
        }
    }
}

impl fmt::Debug for MetricPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricPool")
            .field("capacity", &self.inner.capacity)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// A record checked out from a [`MetricPool`].
///
/// Dereferences to [`MetricData`]. Dropping the guard returns the record to its pool exactly
/// once; the record cannot be accessed afterwards.
pub struct PooledMetric {
    metric: MetricData,
    pool: MetricPool,
}

impl Deref for PooledMetric {
    type Target = MetricData;

    fn deref(&self) -> &Self::Target {
        &self.metric
    }
}

impl DerefMut for PooledMetric {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.metric
    }
}

impl Drop for PooledMetric {
    fn drop(&mut self) {
        let metric = std::mem::take(&mut self.metric);
        self.pool.release(metric);
    }
}

impl fmt::Debug for PooledMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.metric.fmt(f)
    }
}

impl Serialize for PooledMetric {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.metric.serialize(serializer)
    }
}
