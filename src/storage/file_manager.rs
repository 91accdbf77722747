use std::fs::{File, OpenOptions};
use std::os::unix::prelude::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::common::PageNo;
use crate::error::{DbError, Result};

/// PageFile reads and writes one table file as a sequence of fixed-size pages.
/// Page `n` occupies the bytes `n * page_size .. (n + 1) * page_size`.
pub struct PageFile {
    path: PathBuf,
    file: File,
    page_size: usize,
    filesize: AtomicU64,
    /// held while the file length may change
    resize: Mutex<()>,
}

impl PageFile {
    /// Opens the file at `path`, creating an empty one if it does not exist.
    ///
    /// Fails if the length of an existing file is not a multiple of `page_size`.
    pub fn open(path: impl Into<PathBuf>, page_size: usize) -> Result<Self> {
        let path = path.into();
        if page_size == 0 {
            return Err(DbError::Storage("Page size must not be zero".to_owned()));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        if size % page_size as u64 != 0 {
            return Err(DbError::Storage(format!(
                "Boundary check for {} failed. {} is not divisible by page size {}",
                path.display(),
                size,
                page_size
            )));
        }
        debug!(path = %path.display(), pages = size / page_size as u64, "opened page file");

        Ok(Self {
            path,
            file,
            page_size,
            filesize: AtomicU64::new(size),
            resize: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> PageNo {
        (self.filesize.load(Ordering::Acquire) / self.page_size as u64) as PageNo
    }

    fn offset(&self, page_no: PageNo) -> u64 {
        page_no as u64 * self.page_size as u64
    }

    /// Reads page `page_no` into a freshly allocated buffer.
    pub fn read_page(&self, page_no: PageNo) -> Result<Box<[u8]>> {
        let num_pages = self.num_pages();
        if page_no >= num_pages {
            return Err(DbError::Storage(format!(
                "Attempted to read page {page_no} of {}, but it has only {num_pages} pages",
                self.path.display()
            )));
        }
        let mut buffer = vec![0u8; self.page_size].into_boxed_slice();
        self.file.read_exact_at(&mut buffer, self.offset(page_no))?;
        Ok(buffer)
    }

    /// Writes `data` as page `page_no`. The page must already exist, or be
    /// the one directly following the last page.
    pub fn write_page(&self, page_no: PageNo, data: &[u8]) -> Result<()> {
        self.check_page_len(data)?;
        let _resize_guard = self.resize.lock();
        let num_pages = self.num_pages();
        if page_no > num_pages {
            return Err(DbError::Storage(format!(
                "Attempted to write page {page_no} of {} before it has been allocated, file has {num_pages} pages",
                self.path.display()
            )));
        }
        self.write_at(self.offset(page_no), data)?;
        if page_no == num_pages {
            self.filesize
                .store(self.offset(page_no + 1), Ordering::Release);
        }
        Ok(())
    }

    /// Appends a page at the end of the file and returns its page number.
    pub fn append_page(&self, data: &[u8]) -> Result<PageNo> {
        self.check_page_len(data)?;
        let _resize_guard = self.resize.lock();
        let page_no = self.num_pages();
        self.write_at(self.offset(page_no), data)?;
        // the new page only becomes visible once its bytes are on disk
        self.filesize
            .store(self.offset(page_no + 1), Ordering::Release);
        Ok(page_no)
    }

    fn check_page_len(&self, data: &[u8]) -> Result<()> {
        if data.len() != self.page_size {
            return Err(DbError::Storage(format!(
                "Page buffer has {} bytes, expected {}",
                data.len(),
                self.page_size
            )));
        }
        Ok(())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.write_all_at(data, offset)?;
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use rand::Rng;
    use tempfile::tempdir;

    use super::PageFile;
    use crate::error::DbError;

    const PAGE_SIZE: usize = 256;

    #[test]
    fn basic_test() -> Result<()> {
        let data_dir = tempdir()?;
        let file = PageFile::open(data_dir.path().join("t.dat"), PAGE_SIZE)?;
        assert_eq!(file.num_pages(), 0);

        let initial_data = [1u8; PAGE_SIZE];
        let page_no = file.append_page(&initial_data)?;
        assert_eq!(page_no, 0);
        assert_eq!(file.num_pages(), 1);
        assert_eq!(&file.read_page(page_no)?[..], &initial_data[..]);

        let updated = [9u8; PAGE_SIZE];
        file.write_page(page_no, &updated)?;
        assert_eq!(&file.read_page(page_no)?[..], &updated[..]);

        Ok(())
    }

    #[test]
    fn out_of_bounds_access_fails() -> Result<()> {
        let data_dir = tempdir()?;
        let file = PageFile::open(data_dir.path().join("t.dat"), PAGE_SIZE)?;
        file.append_page(&[0u8; PAGE_SIZE])?;

        assert!(matches!(file.read_page(1), Err(DbError::Storage(_))));
        assert!(matches!(
            file.write_page(2, &[0u8; PAGE_SIZE]),
            Err(DbError::Storage(_))
        ));
        assert!(matches!(
            file.write_page(0, &[0u8; 10]),
            Err(DbError::Storage(_))
        ));

        // writing directly behind the last page grows the file by one page
        file.write_page(1, &[2u8; PAGE_SIZE])?;
        assert_eq!(file.num_pages(), 2);
        Ok(())
    }

    #[test]
    fn reopen_keeps_pages() -> Result<()> {
        let data_dir = tempdir()?;
        let path = data_dir.path().join("t.dat");
        {
            let file = PageFile::open(&path, PAGE_SIZE)?;
            file.append_page(&[3u8; PAGE_SIZE])?;
            file.append_page(&[4u8; PAGE_SIZE])?;
        }
        let file = PageFile::open(&path, PAGE_SIZE)?;
        assert_eq!(file.num_pages(), 2);
        assert_eq!(&file.read_page(1)?[..], &[4u8; PAGE_SIZE][..]);
        Ok(())
    }

    #[test]
    fn random_pages_round_trip() -> Result<()> {
        let data_dir = tempdir()?;
        let file = PageFile::open(data_dir.path().join("t.dat"), PAGE_SIZE)?;
        let mut rng = rand::thread_rng();

        let pages = (0..8).map(|_| rng.gen()).collect::<Vec<[u8; PAGE_SIZE]>>();
        for page in &pages {
            file.append_page(page)?;
        }
        // overwrite in reverse order, the file must not grow
        for (page_no, page) in pages.iter().enumerate().rev() {
            file.write_page(page_no as u32, page)?;
        }
        assert_eq!(file.num_pages(), 8);
        for (page_no, page) in pages.iter().enumerate() {
            assert_eq!(&file.read_page(page_no as u32)?[..], &page[..]);
        }
        Ok(())
    }

    #[test]
    fn misaligned_file_is_rejected() -> Result<()> {
        let data_dir = tempdir()?;
        let path = data_dir.path().join("t.dat");
        fs::write(&path, [0u8; PAGE_SIZE + 1])?;
        assert!(matches!(
            PageFile::open(&path, PAGE_SIZE),
            Err(DbError::Storage(_))
        ));
        Ok(())
    }
}
