//! Slotted record allocator over pages: node/relationship CRUD, free-slot
//! bitmap bookkeeping, page-local reorganization primitives. One slot holds
//! exactly one fixed-width record — [`crate::record::NodeRecord`] or
//! [`crate::record::RelationshipRecord`] — generalized over via
//! [`SlotRecord`] so the allocator, scan, and relocation logic are written
//! once for both record kinds.
//!
//! Header files (the per-slot in-use bitmaps) are small and read/written far
//! less often than the record files the [`crate::page_cache::PageCache`]
//! governs, so a `HeapFile` loads its header wholesale at construction and
//! writes it back wholesale on every mutation, going straight through
//! [`crate::physical_database::PhysicalDatabase`] rather than through the
//! pin/unpin path.

use std::marker::PhantomData;

use crate::bitmap::BitMap;
use crate::config::PAGE_SIZE;
use crate::disk::Disk;
use crate::error::{GraphError, Result};
use crate::page::PageNo;
use crate::page_cache::PageCache;
use crate::physical_database::FileKind;

/// A fixed-width record a [`HeapFile`] can store one-per-slot.
pub trait SlotRecord: Copy {
    const SIZE: usize;

    fn encode(&self, dst: &mut [u8]);
    fn decode(src: &[u8]) -> Self;
    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
    fn in_use(&self) -> bool;
    fn set_in_use(&mut self, in_use: bool);
}

impl SlotRecord for crate::record::NodeRecord {
    const SIZE: usize = crate::record::NodeRecord::SIZE;

    fn encode(&self, dst: &mut [u8]) {
        crate::record::NodeRecord::encode(self, dst)
    }
    fn decode(src: &[u8]) -> Self {
        crate::record::NodeRecord::decode(src)
    }
    fn id(&self) -> u64 {
        self.id
    }
    fn set_id(&mut self, id: u64) {
        crate::record::NodeRecord::set_id(self, id)
    }
    fn in_use(&self) -> bool {
        crate::record::NodeRecord::in_use(self)
    }
    fn set_in_use(&mut self, in_use: bool) {
        crate::record::NodeRecord::set_in_use(self, in_use)
    }
}

impl SlotRecord for crate::record::RelationshipRecord {
    const SIZE: usize = crate::record::RelationshipRecord::SIZE;

    fn encode(&self, dst: &mut [u8]) {
        crate::record::RelationshipRecord::encode(self, dst)
    }
    fn decode(src: &[u8]) -> Self {
        crate::record::RelationshipRecord::decode(src)
    }
    fn id(&self) -> u64 {
        self.id
    }
    fn set_id(&mut self, id: u64) {
        crate::record::RelationshipRecord::set_id(self, id)
    }
    fn in_use(&self) -> bool {
        crate::record::RelationshipRecord::in_use(self)
    }
    fn set_in_use(&mut self, in_use: bool) {
        crate::record::RelationshipRecord::set_in_use(self, in_use)
    }
}

/// A remapping of a record's id caused by [`HeapFile::relocate`] or
/// [`HeapFile::swap_pages`]. Callers (the [`crate::graph::GraphDb`] facade)
/// use these to rewrite every neighbor reference from `from` to `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remap {
    pub from: u64,
    pub to: u64,
}

pub struct HeapFile<T: SlotRecord> {
    records_kind: FileKind,
    header_kind: FileKind,
    slots_per_page: usize,
    bitmap: BitMap,
    last_alloc_slot: usize,
    _marker: PhantomData<T>,
}

impl<T: SlotRecord> HeapFile<T> {
    pub fn open<D: Disk>(
        cache: &mut PageCache<D>,
        records_kind: FileKind,
        header_kind: FileKind,
    ) -> Result<Self> {
        let slots_per_page = PAGE_SIZE / T::SIZE;
        let bitmap = Self::load_bitmap(cache, header_kind)?;

        Ok(Self {
            records_kind,
            header_kind,
            slots_per_page,
            bitmap,
            last_alloc_slot: 0,
            _marker: PhantomData,
        })
    }

    fn load_bitmap<D: Disk>(cache: &mut PageCache<D>, header_kind: FileKind) -> Result<BitMap> {
        let disk = cache.phy_mut().file_mut(header_kind);
        let n = disk.num_pages();
        if n == 0 {
            return Ok(BitMap::new());
        }
        let mut buf = vec![0u8; n as usize * PAGE_SIZE];
        disk.read_pages(0, n - 1, &mut buf)?;
        Ok(BitMap::from_bytes(buf))
    }

    fn flush_bitmap<D: Disk>(&self, cache: &mut PageCache<D>) -> Result<()> {
        let mut padded = self.bitmap.as_slice().to_vec();
        if padded.is_empty() {
            return Ok(());
        }
        let pages = padded.len().div_ceil(PAGE_SIZE);
        padded.resize(pages * PAGE_SIZE, 0);

        let disk = cache.phy_mut().file_mut(self.header_kind);
        disk.write_pages(0, pages as u64 - 1, &padded)
    }

    pub fn page_of(&self, id: u64) -> PageNo {
        id / self.slots_per_page as u64
    }

    pub fn slot_in_page(&self, id: u64) -> usize {
        (id % self.slots_per_page as u64) as usize
    }

    fn offset_in_page(&self, id: u64) -> usize {
        self.slot_in_page(id) * T::SIZE
    }

    pub fn check_record_exists(&self, id: u64) -> bool {
        self.bitmap.check(id as usize)
    }

    /// Scan from the rotating hint for the first unset bit, growing the
    /// records file by one page (and the bitmap along with it) if the
    /// current file has no gap.
    fn allocate_slot<D: Disk>(&mut self, cache: &mut PageCache<D>) -> Result<u64> {
        let mut slot = self.bitmap.first_unset_from(self.last_alloc_slot);
        if slot >= self.bitmap.len_bits() {
            let page_no = cache.new_page(self.records_kind)?;
            cache.unpin_page(page_no, self.records_kind)?;
            slot = page_no as usize * self.slots_per_page;
            self.bitmap.ensure_capacity(slot + self.slots_per_page - 1);
        }

        self.bitmap.set(slot, true);
        self.last_alloc_slot = slot + 1;
        self.flush_bitmap(cache)?;
        Ok(slot as u64)
    }

    fn write_record<D: Disk>(&self, cache: &mut PageCache<D>, rec: &T) -> Result<()> {
        let page_no = self.page_of(rec.id());
        let offset = self.offset_in_page(rec.id());

        let mut buf = vec![0u8; T::SIZE];
        rec.encode(&mut buf);

        cache.pin_page(page_no, self.records_kind)?;
        cache.with_page_mut(page_no, self.records_kind, |p| p.put_range(offset, &buf))?;
        cache.unpin_page(page_no, self.records_kind)?;
        Ok(())
    }

    /// Allocate a slot and persist `rec` into it, assigning `rec`'s id to the
    /// slot index — a record's id always equals its slot index.
    pub fn create<D: Disk>(&mut self, cache: &mut PageCache<D>, mut rec: T) -> Result<u64> {
        let id = self.allocate_slot(cache)?;
        rec.set_id(id);
        self.write_record(cache, &rec)?;
        Ok(id)
    }

    pub fn read<D: Disk>(&self, cache: &mut PageCache<D>, id: u64) -> Result<T> {
        if !self.check_record_exists(id) {
            return Err(GraphError::argument(format!("no such record with id {id}")));
        }

        let page_no = self.page_of(id);
        let offset = self.offset_in_page(id);

        cache.pin_page(page_no, self.records_kind)?;
        let bytes = cache.with_page(page_no, self.records_kind, |p| {
            p.get_range(offset..offset + T::SIZE).to_vec()
        })?;
        cache.unpin_page(page_no, self.records_kind)?;

        Ok(T::decode(&bytes))
    }

    /// Overwrite the slot named by `rec.id()`. The id must already be live.
    pub fn update<D: Disk>(&self, cache: &mut PageCache<D>, rec: &T) -> Result<()> {
        if !self.check_record_exists(rec.id()) {
            return Err(GraphError::argument(format!(
                "cannot update unallocated slot {}",
                rec.id()
            )));
        }
        self.write_record(cache, rec)
    }

    /// Clear the in-use bit and zero the slot.
    pub fn delete<D: Disk>(&mut self, cache: &mut PageCache<D>, id: u64) -> Result<()> {
        if !self.check_record_exists(id) {
            return Err(GraphError::argument(format!("no such record with id {id}")));
        }

        let page_no = self.page_of(id);
        let offset = self.offset_in_page(id);
        let zeros = vec![0u8; T::SIZE];

        cache.pin_page(page_no, self.records_kind)?;
        cache.with_page_mut(page_no, self.records_kind, |p| p.put_range(offset, &zeros))?;
        cache.unpin_page(page_no, self.records_kind)?;

        self.bitmap.set(id as usize, false);
        self.flush_bitmap(cache)?;
        Ok(())
    }

    /// All live records in ascending id order.
    pub fn scan_live<D: Disk>(&self, cache: &mut PageCache<D>) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for id in 0..self.bitmap.len_bits() as u64 {
            if self.bitmap.check(id as usize) {
                out.push(self.read(cache, id)?);
            }
        }
        Ok(out)
    }

    /// Copy the record living at `from_id` into the (currently free) slot
    /// `to_id`, then free the source slot. The caller is responsible for
    /// rewriting every neighbor that referenced `from_id`.
    pub fn relocate<D: Disk>(
        &mut self,
        cache: &mut PageCache<D>,
        from_id: u64,
        to_id: u64,
    ) -> Result<()> {
        if from_id == to_id {
            return Ok(());
        }
        if !self.check_record_exists(from_id) {
            return Err(GraphError::argument(format!("no such record with id {from_id}")));
        }
        if self.check_record_exists(to_id) {
            return Err(GraphError::argument(format!(
                "destination slot {to_id} is already in use"
            )));
        }

        let mut rec = self.read(cache, from_id)?;
        rec.set_id(to_id);

        self.ensure_page_allocated(cache, self.page_of(to_id))?;
        self.bitmap.ensure_capacity(to_id as usize);
        self.bitmap.set(to_id as usize, true);
        self.write_record(cache, &rec)?;

        self.delete(cache, from_id)
    }

    /// Grow the records file, one page at a time via [`PageCache::new_page`],
    /// until it has a page `page_no`. Unlike [`Self::allocate_slot`], a
    /// relocation target may name a slot arbitrarily far beyond the current
    /// end of the file, so the file must be extended explicitly rather than
    /// relying on the single-page growth `new_page` otherwise provides.
    fn ensure_page_allocated<D: Disk>(&self, cache: &mut PageCache<D>, page_no: PageNo) -> Result<()> {
        while cache.phy().file(self.records_kind).num_pages() <= page_no {
            let new_page_no = cache.new_page(self.records_kind)?;
            cache.unpin_page(new_page_no, self.records_kind)?;
        }
        Ok(())
    }

    /// Physically exchange the contents of two pages, then re-derive every
    /// moved record's id (since id == slot index) and report the remapping
    /// so the caller can fix up every neighbor reference.
    pub fn swap_pages<D: Disk>(
        &mut self,
        cache: &mut PageCache<D>,
        page_a: PageNo,
        page_b: PageNo,
    ) -> Result<Vec<Remap>> {
        if page_a == page_b {
            return Ok(Vec::new());
        }

        cache.pin_page(page_a, self.records_kind)?;
        cache.pin_page(page_b, self.records_kind)?;
        let bytes_a = cache.with_page(page_a, self.records_kind, |p| p.get_range(0..PAGE_SIZE).to_vec())?;
        let bytes_b = cache.with_page(page_b, self.records_kind, |p| p.get_range(0..PAGE_SIZE).to_vec())?;
        cache.with_page_mut(page_a, self.records_kind, |p| p.put_range(0, &bytes_b))?;
        cache.with_page_mut(page_b, self.records_kind, |p| p.put_range(0, &bytes_a))?;
        cache.unpin_page(page_a, self.records_kind)?;
        cache.unpin_page(page_b, self.records_kind)?;

        let mut remaps = Vec::new();
        for slot in 0..self.slots_per_page {
            let id_a = page_a * self.slots_per_page as u64 + slot as u64;
            let id_b = page_b * self.slots_per_page as u64 + slot as u64;
            let a_was_in_use = self.bitmap.check(id_a as usize);
            let b_was_in_use = self.bitmap.check(id_b as usize);

            self.bitmap.set(id_a as usize, b_was_in_use);
            self.bitmap.set(id_b as usize, a_was_in_use);

            if b_was_in_use {
                self.patch_id_field(cache, id_a)?;
                remaps.push(Remap { from: id_b, to: id_a });
            }
            if a_was_in_use {
                self.patch_id_field(cache, id_b)?;
                remaps.push(Remap { from: id_a, to: id_b });
            }
        }

        self.flush_bitmap(cache)?;
        Ok(remaps)
    }

    /// After a raw byte-level page swap, the record physically sitting in
    /// slot `id` still carries its old id in its encoded bytes. Decode,
    /// overwrite the id field with the slot's own index, re-encode.
    fn patch_id_field<D: Disk>(&self, cache: &mut PageCache<D>, id: u64) -> Result<()> {
        let page_no = self.page_of(id);
        let offset = self.offset_in_page(id);

        let bytes = cache.with_page(page_no, self.records_kind, |p| {
            p.get_range(offset..offset + T::SIZE).to_vec()
        })?;
        let mut rec = T::decode(&bytes);
        rec.set_id(id);

        let mut buf = vec![0u8; T::SIZE];
        rec.encode(&mut buf);
        cache.with_page_mut(page_no, self.records_kind, |p| p.put_range(offset, &buf))?;
        Ok(())
    }
}
