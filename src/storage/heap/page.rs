use crate::common::{PageId, RecordId, SlotNo};
use crate::error::{DbError, Result};
use crate::tuple::schema::Schema;
use crate::tuple::value::Value;
use crate::tuple::Tuple;

/// The slot layout of a heap page.
///
/// A page starts with a bitmap that marks which slots are occupied, followed by
/// `slot_count` slots of `tuple_size` bytes each. Bit `i` lives in byte `i / 8`
/// at position `i % 8`, counted from the least significant bit. Bytes behind the
/// last slot are unused. An all-zero page is an empty page.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapLayout {
    tuple_size: usize,
    slot_count: usize,
    header_size: usize,
}

impl HeapLayout {
    pub fn new(schema: &Schema, page_size: usize) -> Result<Self> {
        let tuple_size = schema.tuple_size();
        if tuple_size == 0 {
            return Err(DbError::Storage("Schema without columns".to_owned()));
        }
        // every tuple costs its bytes plus one header bit
        let slot_count = (page_size * 8) / (tuple_size * 8 + 1);
        if slot_count == 0 {
            return Err(DbError::Storage(format!(
                "Tuples of {tuple_size} bytes do not fit into pages of {page_size} bytes"
            )));
        }
        if slot_count > SlotNo::MAX as usize + 1 {
            return Err(DbError::Storage(format!(
                "Page size {page_size} yields {slot_count} slots, more than are addressable"
            )));
        }
        Ok(Self {
            tuple_size,
            slot_count,
            header_size: slot_count.div_ceil(8),
        })
    }

    pub fn tuple_size(&self) -> usize {
        self.tuple_size
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.header_size + slot * self.tuple_size;
        start..start + self.tuple_size
    }

    pub fn is_slot_used(&self, data: &[u8], slot: usize) -> bool {
        slot < self.slot_count && data[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_slot(&self, data: &mut [u8], slot: usize, used: bool) {
        if used {
            data[slot / 8] |= 1 << (slot % 8);
        } else {
            data[slot / 8] &= !(1 << (slot % 8));
        }
    }

    pub fn empty_slots(&self, data: &[u8]) -> usize {
        (0..self.slot_count)
            .filter(|&slot| !self.is_slot_used(data, slot))
            .count()
    }

    /// Writes `values` into the first free slot and returns it, or `None` if the page is full.
    pub fn insert(&self, data: &mut [u8], values: &[Value]) -> Option<SlotNo> {
        let slot = (0..self.slot_count).find(|&slot| !self.is_slot_used(data, slot))?;
        let mut offset = self.slot_range(slot).start;
        for value in values {
            let size = value.type_id().size();
            value.serialize_value(&mut data[offset..offset + size]);
            offset += size;
        }
        self.set_slot(data, slot, true);
        Some(slot as SlotNo)
    }

    /// Marks `slot` as free. The slot bytes are left in place.
    pub fn delete(&self, data: &mut [u8], slot: SlotNo) -> Result<()> {
        let slot = slot as usize;
        if !self.is_slot_used(data, slot) {
            return Err(DbError::Storage(format!("Slot {slot} is not occupied")));
        }
        self.set_slot(data, slot, false);
        Ok(())
    }

    pub fn read_tuple(
        &self,
        data: &[u8],
        schema: &Schema,
        page_id: PageId,
        slot: usize,
    ) -> Result<Tuple> {
        let mut offset = self.slot_range(slot).start;
        let mut values = Vec::with_capacity(schema.columns().len());
        for column in schema.columns() {
            let size = column.type_id().size();
            values.push(Value::parse_value(
                &data[offset..offset + size],
                column.type_id(),
            )?);
            offset += size;
        }
        Ok(Tuple::with_record_id(
            values,
            RecordId::new(page_id, slot as SlotNo),
        ))
    }

    /// All tuples stored on the page, in slot order.
    pub fn tuples(&self, data: &[u8], schema: &Schema, page_id: PageId) -> Result<Vec<Tuple>> {
        (0..self.slot_count)
            .filter(|&slot| self.is_slot_used(data, slot))
            .map(|slot| self.read_tuple(data, schema, page_id, slot))
            .collect()
    }
}
