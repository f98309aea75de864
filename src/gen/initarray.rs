//! `InitArraySectionContent` (spec.md §4.5): `.init_array`/`.fini_array`,
//! an array of 8-byte function pointers run in order at load/unload time.
//! Entries resolve to an address once their target function's
//! [`crate::position::Position`] has been placed, which for chunks
//! already living in the Program tree is immediate — no finalizer pass
//! needed, only the address lookup the caller already had to do to build
//! the list.

pub struct InitArraySectionContent {
    addresses: Vec<u64>,
}

impl InitArraySectionContent {
    pub fn new(addresses: Vec<u64>) -> Self {
        Self { addresses }
    }

    pub fn byte_len(&self) -> u64 {
        self.addresses.len() as u64 * 8
    }

    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.addresses.len() * 8);
        for addr in &self.addresses {
            out.extend_from_slice(&addr.to_le_bytes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_addresses_in_order() {
        let content = InitArraySectionContent::new(vec![0x1000, 0x2000]);
        let bytes = content.write();
        assert_eq!(bytes.len(), 16);
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), 0x1000);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 0x2000);
    }
}
