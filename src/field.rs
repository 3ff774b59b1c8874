//! Field attribute and field-chain management
//!
//! 3270 fields are contiguous runs anchored at an attribute byte and
//! extending to the next field start in screen order, wrapping through
//! the end of the buffer. The chain is kept as a set sorted by start
//! address; "next field" is the modular successor, so no back-pointers
//! are stored.

use crate::codes::*;

/// A 3270 field with its base and extended attributes
///
/// `length` is derived from the position of the following field and is
/// refreshed by [`FieldManager::recalculate_lengths`] whenever the chain
/// changes. It counts the data cells after the attribute byte.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAttribute {
    /// Buffer address of the attribute byte
    pub address: u16,

    /// Base attribute byte (from SF order)
    pub base_attr: u8,

    /// Extended attributes (from SFE/MF orders)
    pub extended_attrs: ExtendedAttributes,

    /// Field length in data cells, wrapping through address 0
    pub length: u16,
}

impl FieldAttribute {
    /// Create a new field attribute with base attribute only
    pub fn new(address: u16, base_attr: u8) -> Self {
        Self {
            address,
            base_attr,
            extended_attrs: ExtendedAttributes::default(),
            length: 0,
        }
    }

    /// Create a new field attribute with extended attributes
    pub fn new_extended(address: u16, base_attr: u8, extended_attrs: ExtendedAttributes) -> Self {
        Self {
            address,
            base_attr,
            extended_attrs,
            length: 0,
        }
    }

    /// Check if field is protected
    pub fn is_protected(&self) -> bool {
        (self.base_attr & ATTR_PROTECTED) != 0
    }

    /// An input field is any field that is not protected.
    pub fn is_input(&self) -> bool {
        !self.is_protected()
    }

    /// Check if field is numeric
    pub fn is_numeric(&self) -> bool {
        (self.base_attr & ATTR_NUMERIC) != 0
    }

    /// Check if field is hidden (non-display)
    pub fn is_hidden(&self) -> bool {
        (self.base_attr & ATTR_DISPLAY) == DISPLAY_HIDDEN
    }

    /// Check if field is intensified
    pub fn is_intensified(&self) -> bool {
        (self.base_attr & ATTR_DISPLAY) == DISPLAY_INTENSIFIED
    }

    /// Check if Modified Data Tag (MDT) is set
    pub fn is_modified(&self) -> bool {
        (self.base_attr & ATTR_MDT) != 0
    }

    /// Set the Modified Data Tag (MDT)
    pub fn set_modified(&mut self, modified: bool) {
        if modified {
            self.base_attr |= ATTR_MDT;
        } else {
            self.base_attr &= !ATTR_MDT;
        }
    }

    /// Get display attribute (normal, intensified, or hidden)
    pub fn display_attr(&self) -> u8 {
        self.base_attr & ATTR_DISPLAY
    }
}

/// Extended field attributes from the SFE (Start Field Extended) order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtendedAttributes {
    /// Highlighting attribute (normal, blink, reverse, underscore)
    pub highlighting: Option<u8>,

    /// Foreground color
    pub foreground_color: Option<u8>,

    /// Background color
    pub background_color: Option<u8>,

    /// Character set
    pub charset: Option<u8>,

    /// Field validation (mandatory fill, mandatory entry, trigger)
    pub validation: Option<u8>,

    /// Field outlining
    pub outlining: Option<u8>,

    /// Transparency
    pub transparency: Option<u8>,
}

impl ExtendedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single (type, value) attribute pair; unknown types are ignored.
    pub fn apply(&mut self, attr_type: u8, attr_value: u8) {
        match attr_type {
            XA_HIGHLIGHTING => self.highlighting = Some(attr_value),
            XA_FOREGROUND => self.foreground_color = Some(attr_value),
            XA_BACKGROUND => self.background_color = Some(attr_value),
            XA_CHARSET => self.charset = Some(attr_value),
            XA_VALIDATION => self.validation = Some(attr_value),
            XA_OUTLINING => self.outlining = Some(attr_value),
            XA_TRANSPARENCY => self.transparency = Some(attr_value),
            _ => {
                log::debug!("ignoring unknown extended attribute type 0x{attr_type:02X}");
            }
        }
    }
}

/// Manager for the field chain of one screen buffer
///
/// Fields are kept sorted by start address. The field covering an
/// arbitrary address is the one with the greatest start at or below it,
/// or the last field in the buffer when the address precedes every start
/// (the chain wraps).
#[derive(Debug, Default)]
pub struct FieldManager {
    fields: Vec<FieldAttribute>,
}

impl FieldManager {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Add or replace the field at the given start address and re-link the chain.
    pub fn add_field(&mut self, field: FieldAttribute, buffer_size: usize) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.address == field.address) {
            *existing = field;
        } else {
            self.fields.push(field);
            self.fields.sort_by_key(|f| f.address);
        }
        self.recalculate_lengths(buffer_size);
    }

    /// Drop every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// All fields in screen order
    pub fn fields(&self) -> &[FieldAttribute] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find the field covering a buffer address (cyclic)
    pub fn find_field_at(&self, address: u16) -> Option<&FieldAttribute> {
        if self.fields.is_empty() {
            return None;
        }
        self.fields
            .iter()
            .rev()
            .find(|f| f.address <= address)
            .or_else(|| self.fields.last())
    }

    /// Mutable variant of [`find_field_at`](Self::find_field_at)
    pub fn find_field_at_mut(&mut self, address: u16) -> Option<&mut FieldAttribute> {
        if self.fields.is_empty() {
            return None;
        }
        if let Some(idx) = self.fields.iter().rposition(|f| f.address <= address) {
            self.fields.get_mut(idx)
        } else {
            self.fields.last_mut()
        }
    }

    /// The next field after an address in screen order, wrapping to the first.
    pub fn next_field(&self, address: u16) -> Option<&FieldAttribute> {
        if self.fields.is_empty() {
            return None;
        }
        self.fields
            .iter()
            .find(|f| f.address > address)
            .or_else(|| self.fields.first())
    }

    /// The next input (unprotected) field after an address, wrapping.
    pub fn next_input_field(&self, address: u16) -> Option<&FieldAttribute> {
        if self.fields.is_empty() {
            return None;
        }
        self.fields
            .iter()
            .filter(|f| f.is_input())
            .find(|f| f.address > address)
            .or_else(|| self.fields.iter().find(|f| f.is_input()))
    }

    /// The first input field in screen order.
    pub fn first_input_field(&self) -> Option<&FieldAttribute> {
        self.fields.iter().find(|f| f.is_input())
    }

    /// Recompute derived field lengths from the modular successor of each start.
    pub fn recalculate_lengths(&mut self, buffer_size: usize) {
        let count = self.fields.len();
        if count == 0 {
            return;
        }
        for i in 0..count {
            let start = self.fields[i].address as usize;
            let next_start = self.fields[(i + 1) % count].address as usize;
            // Data cells between this attribute byte and the next one,
            // wrapping through 0. A single field spans the whole buffer.
            let span = if count == 1 {
                buffer_size
            } else {
                (next_start + buffer_size - start) % buffer_size
            };
            self.fields[i].length = span.saturating_sub(1) as u16;
        }
    }

    /// All modified input fields (MDT set), in screen order.
    pub fn modified_fields(&self) -> Vec<&FieldAttribute> {
        self.fields
            .iter()
            .filter(|f| f.is_input() && f.is_modified())
            .collect()
    }

    /// Reset the MDT bit on every field.
    pub fn reset_mdt(&mut self) {
        for field in &mut self.fields {
            field.set_modified(false);
        }
    }

    /// MDT bits in screen order, for write-transaction snapshots.
    pub fn mdt_bits(&self) -> Vec<bool> {
        self.fields.iter().map(|f| f.is_modified()).collect()
    }

    /// Restore MDT bits captured by [`mdt_bits`](Self::mdt_bits).
    ///
    /// Only applied when the chain shape still matches; a mismatched chain
    /// means the caller also restored the fields wholesale.
    pub fn restore_mdt_bits(&mut self, bits: &[bool]) {
        if bits.len() == self.fields.len() {
            for (field, &bit) in self.fields.iter_mut().zip(bits) {
                field.set_modified(bit);
            }
        }
    }

    /// Replace the whole chain (rollback path).
    pub fn restore(&mut self, fields: Vec<FieldAttribute>) {
        self.fields = fields;
    }

    /// Clone the whole chain (snapshot path).
    pub fn snapshot(&self) -> Vec<FieldAttribute> {
        self.fields.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_attribute_protected() {
        let attr = FieldAttribute::new(0, ATTR_PROTECTED);
        assert!(attr.is_protected());
        assert!(!attr.is_input());
        assert!(!attr.is_numeric());
    }

    #[test]
    fn test_field_attribute_mdt() {
        let mut attr = FieldAttribute::new(0, 0);
        assert!(!attr.is_modified());

        attr.set_modified(true);
        assert!(attr.is_modified());

        attr.set_modified(false);
        assert!(!attr.is_modified());
    }

    #[test]
    fn test_field_attribute_display() {
        let attr = FieldAttribute::new(0, DISPLAY_HIDDEN);
        assert!(attr.is_hidden());
        assert!(!attr.is_intensified());
    }

    #[test]
    fn test_add_field_replaces_at_same_address() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(10, 0), 1920);
        manager.add_field(FieldAttribute::new(10, ATTR_PROTECTED), 1920);
        assert_eq!(manager.fields().len(), 1);
        assert!(manager.fields()[0].is_protected());
    }

    #[test]
    fn test_find_field_wraps() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(100, 0), 1920);
        manager.add_field(FieldAttribute::new(200, ATTR_PROTECTED), 1920);

        // Address before the first start belongs to the last field (wrap)
        let field = manager.find_field_at(50).unwrap();
        assert_eq!(field.address, 200);

        let field = manager.find_field_at(150).unwrap();
        assert_eq!(field.address, 100);
    }

    #[test]
    fn test_lengths_wrap_through_zero() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(0, 0), 1920);
        manager.add_field(FieldAttribute::new(100, 0), 1920);
        manager.add_field(FieldAttribute::new(200, 0), 1920);

        assert_eq!(manager.fields()[0].length, 99);
        assert_eq!(manager.fields()[1].length, 99);
        // Last field wraps around through 0 back to address 0
        assert_eq!(manager.fields()[2].length, 1719);
    }

    #[test]
    fn test_single_field_spans_buffer() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(5, 0), 1920);
        assert_eq!(manager.fields()[0].length, 1919);
    }

    #[test]
    fn test_next_input_field_skips_protected() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(0, ATTR_PROTECTED), 1920);
        manager.add_field(FieldAttribute::new(100, 0), 1920);
        manager.add_field(FieldAttribute::new(200, ATTR_PROTECTED), 1920);

        let next = manager.next_input_field(0).unwrap();
        assert_eq!(next.address, 100);
        // Wraps back to the only input field
        let next = manager.next_input_field(150).unwrap();
        assert_eq!(next.address, 100);
    }

    #[test]
    fn test_modified_fields_excludes_protected() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(0, ATTR_PROTECTED | ATTR_MDT), 1920);
        manager.add_field(FieldAttribute::new(100, ATTR_MDT), 1920);
        manager.add_field(FieldAttribute::new(200, 0), 1920);

        let modified = manager.modified_fields();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].address, 100);
    }

    #[test]
    fn test_reset_mdt() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(0, ATTR_MDT), 1920);
        manager.add_field(FieldAttribute::new(100, ATTR_MDT), 1920);
        manager.reset_mdt();
        assert!(manager.modified_fields().is_empty());
    }

    #[test]
    fn test_mdt_snapshot_round_trip() {
        let mut manager = FieldManager::new();
        manager.add_field(FieldAttribute::new(0, 0), 1920);
        manager.add_field(FieldAttribute::new(100, ATTR_MDT), 1920);

        let bits = manager.mdt_bits();
        manager.reset_mdt();
        manager.restore_mdt_bits(&bits);
        assert_eq!(manager.modified_fields().len(), 1);
    }
}
