use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::PageId;
use crate::concurrency::TransactionId;

/// A cached page. The content lock only protects the bytes; page locks are
/// the caller's responsibility.
pub type PageRef = Arc<RwLock<Page>>;

#[derive(Debug)]
pub struct Page {
    id: PageId,
    data: Box<[u8]>,
    /// the transaction whose uncommitted write last touched this page
    dirty: Option<TransactionId>,
}

impl Page {
    pub fn new(id: PageId, data: Box<[u8]>) -> Self {
        Self {
            id,
            data,
            dirty: None,
        }
    }

    pub fn into_ref(self) -> PageRef {
        Arc::new(RwLock::new(self))
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    pub fn mark_dirty(&mut self, tid: Option<TransactionId>) {
        self.dirty = tid;
    }

    /// Replaces the content with `data` as read from disk and clears the dirty marker.
    pub fn restore(&mut self, data: &[u8]) {
        self.data.copy_from_slice(data);
        self.dirty = None;
    }
}
