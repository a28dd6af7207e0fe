//! Fixed-capacity frame table, page-map per file kind, LRU-K eviction,
//! pin/unpin, write-back. This is a single-threaded, blocking engine, so the
//! cache is plain owned state behind `&mut self` — no `Arc`/`RwLock`.
//!
//! Because pinning up to [`crate::config::SWAP_MAX_NUM_PINNED_PAGES`] pages
//! at once is part of the incidence-list protocol, `pin_page` does not hand
//! back a borrowed `&Page` (that would make the borrow checker refuse a
//! second concurrent pin). Instead callers pin by `(page_no, kind)` and
//! read/write through [`PageCache::with_page`] / [`PageCache::with_page_mut`],
//! which look the frame up fresh on each call.

use std::collections::HashMap;

use log::{debug, trace};

use crate::config::PAGE_SIZE;
use crate::disk::{Disk, FileSystem, Memory};
use crate::error::{GraphError, Result};
use crate::page::{Page, PageNo};
use crate::physical_database::{FileKind, PhysicalDatabase};
use crate::replacer::{AccessType, ReferenceQueue};

pub type FrameId = usize;

struct FrameSlot {
    page: Page,
    /// `None` while the frame holds no resident page.
    kind: Option<FileKind>,
}

pub struct PageCache<D: Disk = FileSystem> {
    phy: PhysicalDatabase<D>,
    frames: Vec<FrameSlot>,
    free_frames: Vec<FrameId>,
    page_map: HashMap<(FileKind, PageNo), FrameId>,
    queue: ReferenceQueue,
    k: usize,
    num_pins: u64,
    num_unpins: u64,
}

impl PageCache<Memory> {
    pub fn new_in_memory(capacity: usize, k: usize) -> Self {
        Self::new(PhysicalDatabase::create_in_memory(), capacity, k)
    }
}

impl<D: Disk> PageCache<D> {
    pub fn new(phy: PhysicalDatabase<D>, capacity: usize, k: usize) -> Self {
        assert!(capacity > 0, "page cache capacity must be positive");

        let frames = (0..capacity)
            .map(|_| FrameSlot {
                page: Page::empty(),
                kind: None,
            })
            .collect();
        let free_frames = (0..capacity).rev().collect();

        Self {
            phy,
            frames,
            free_frames,
            page_map: HashMap::new(),
            queue: ReferenceQueue::new(),
            k,
            num_pins: 0,
            num_unpins: 0,
        }
    }

    pub fn num_pins(&self) -> u64 {
        self.num_pins
    }

    pub fn num_unpins(&self) -> u64 {
        self.num_unpins
    }

    pub fn phy(&self) -> &PhysicalDatabase<D> {
        &self.phy
    }

    /// Direct access to the underlying files, bypassing pin/unpin. Used by
    /// [`crate::heap_file::HeapFile`] for the header/bitmap files, which are
    /// small and read/written wholesale rather than paged through the cache.
    pub fn phy_mut(&mut self) -> &mut PhysicalDatabase<D> {
        &mut self.phy
    }

    /// Grows the owning file by one page and pins it.
    pub fn new_page(&mut self, kind: FileKind) -> Result<PageNo> {
        self.phy.file_mut(kind).grow(1)?;
        let page_no = self.phy.file(kind).num_pages() - 1;
        self.pin_page(page_no, kind)?;
        Ok(page_no)
    }

    /// Fetch the frame if resident, otherwise obtain a free frame or evict
    /// one, then load from disk.
    pub fn pin_page(&mut self, page_no: PageNo, kind: FileKind) -> Result<()> {
        if let Some(&frame_id) = self.page_map.get(&(kind, page_no)) {
            self.frames[frame_id].page.pin();
            self.queue.record_reference(frame_id, AccessType::Get);
            self.num_pins += 1;
            return Ok(());
        }

        let frame_id = match self.free_frames.pop() {
            Some(f) => f,
            None => self.evict_one()?,
        };

        let mut buf = vec![0u8; PAGE_SIZE];
        self.phy.file_mut(kind).read_page(page_no, &mut buf)?;
        self.phy.record_read(kind);

        let slot = &mut self.frames[frame_id];
        slot.kind = Some(kind);
        slot.page.reset(page_no, bytes::BytesMut::from(&buf[..]));
        slot.page.pin();

        self.page_map.insert((kind, page_no), frame_id);
        self.queue.record_reference(frame_id, AccessType::Get);
        self.num_pins += 1;

        trace!("pin {kind:?}:{page_no} -> frame {frame_id}");
        Ok(())
    }

    /// Decrement the pin count; on every unpin, push the frame to the back
    /// of the reference queue.
    pub fn unpin_page(&mut self, page_no: PageNo, kind: FileKind) -> Result<()> {
        let frame_id = *self
            .page_map
            .get(&(kind, page_no))
            .ok_or_else(|| GraphError::invariant(format!("{kind:?}:{page_no} is not pinned")))?;

        if !self.frames[frame_id].page.unpin() {
            return Err(GraphError::invariant(format!(
                "unpin on {kind:?}:{page_no} whose pin count is already 0"
            )));
        }

        self.queue.record_reference(frame_id, AccessType::Get);
        self.num_unpins += 1;
        Ok(())
    }

    pub fn with_page<R>(
        &self,
        page_no: PageNo,
        kind: FileKind,
        f: impl FnOnce(&Page) -> R,
    ) -> Result<R> {
        let frame_id = *self
            .page_map
            .get(&(kind, page_no))
            .ok_or_else(|| GraphError::invariant(format!("{kind:?}:{page_no} is not resident")))?;
        Ok(f(&self.frames[frame_id].page))
    }

    pub fn with_page_mut<R>(
        &mut self,
        page_no: PageNo,
        kind: FileKind,
        f: impl FnOnce(&mut Page) -> R,
    ) -> Result<R> {
        let frame_id = *self
            .page_map
            .get(&(kind, page_no))
            .ok_or_else(|| GraphError::invariant(format!("{kind:?}:{page_no} is not resident")))?;
        Ok(f(&mut self.frames[frame_id].page))
    }

    /// Scan the reference queue oldest-to-newest, evict up to `k` unpinned
    /// frames (flushing dirty ones first), stop early if the queue ends.
    /// Fails if nothing could be evicted because every frame is pinned.
    fn evict_one(&mut self) -> Result<FrameId> {
        let candidates = {
            let frames = &self.frames;
            self.queue
                .find_victims(self.k, |f| frames[f].page.pin_count() == 0)
        };

        if candidates.is_empty() {
            return Err(GraphError::Capacity);
        }

        for &frame_id in &candidates {
            let kind = self.frames[frame_id].kind.expect("resident frame has a kind");
            if self.frames[frame_id].page.is_dirty() {
                self.flush_frame(frame_id, kind)?;
            }
            self.page_map.remove(&(kind, self.frames[frame_id].page.page_no));
            self.frames[frame_id].kind = None;
            self.queue.remove(frame_id);
            debug!("evicted frame {frame_id} ({kind:?})");
        }

        // All but the last victim become free; the last is handed directly
        // to the caller to be repurposed.
        let last = *candidates.last().unwrap();
        for &frame_id in &candidates[..candidates.len() - 1] {
            self.free_frames.push(frame_id);
        }

        Ok(last)
    }

    fn flush_frame(&mut self, frame_id: FrameId, kind: FileKind) -> Result<()> {
        let slot = &mut self.frames[frame_id];
        if slot.page.pin_count() > 0 {
            return Err(GraphError::invariant("cannot flush a pinned page"));
        }
        if !slot.page.is_dirty() {
            return Ok(());
        }

        self.phy
            .file_mut(kind)
            .write_page(slot.page.page_no, &slot.page.data)?;
        slot.page.set_dirty(false);
        self.phy.record_write(kind);
        Ok(())
    }

    pub fn flush_page(&mut self, page_no: PageNo, kind: FileKind) -> Result<()> {
        let Some(&frame_id) = self.page_map.get(&(kind, page_no)) else {
            return Ok(());
        };
        self.flush_frame(frame_id, kind)
    }

    pub fn flush_all_pages(&mut self) -> Result<()> {
        let entries: Vec<(FileKind, PageNo, FrameId)> = self
            .page_map
            .iter()
            .map(|(&(kind, page_no), &frame_id)| (kind, page_no, frame_id))
            .collect();

        for (kind, _page_no, frame_id) in entries {
            self.flush_frame(frame_id, kind)?;
        }
        Ok(())
    }
}

impl<D: Disk> Drop for PageCache<D> {
    fn drop(&mut self) {
        if let Err(e) = self.flush_all_pages() {
            debug!("flush on drop failed: {e}");
        }
    }
}
