use std::fmt::Display;
use std::time::Duration;

pub type TableId = u16;
pub type PageNo = u32;
pub type SlotNo = u16;

/// Bytes per page, including the slot header.
pub const DEFAULT_PAGE_SIZE: usize = 4096;
/// Number of pages the page cache holds unless configured otherwise.
pub const DEFAULT_POOL_SIZE: usize = 50;
/// How long a transaction waits for a page lock before it aborts itself.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(300);

pub const USER_DATA_TABLE_ID_START: TableId = 1;

/// Identifies a page of a table. Page 0 is the first page of the file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: PageNo,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }
}

impl Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.table_id, self.page_no)
    }
}

/// The on-disk address of a tuple.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: SlotNo,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: SlotNo) -> Self {
        Self { page_id, slot }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}
