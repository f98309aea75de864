//! `InstructionSemantic` (spec.md §3): a tagged variant describing what an
//! instruction's encoded bytes mean, separate from the raw bytes
//! themselves. Every semantic reports its encoded size and, where
//! applicable, the byte offset of the displacement field a Link's target
//! patches into.
//!
//! Invariant I5 (spec.md §3): an Instruction has exactly one semantic, and
//! semantics are replaced wholesale (never shared between instructions) —
//! enforced here by [`InstructionSemantic`] owning its [`Link`] outright
//! rather than through a shared pointer.

use crate::link::Link;

/// What an instruction's bytes mean, and how a Link (if any) patches them.
#[derive(Debug, Clone)]
pub enum InstructionSemantic {
    /// Opaque bytes with no further-understood structure.
    RawByte { bytes: Vec<u8> },
    /// Architecture-decoded but non-relocatable (no embedded address).
    Literal { bytes: Vec<u8> },
    /// A branch or call: a displacement field at `disp_offset`, `disp_len`
    /// bytes wide, referencing `link`.
    ControlFlow {
        bytes: Vec<u8>,
        disp_offset: u8,
        disp_len: u8,
        link: Link,
    },
    /// A data-referencing instruction (e.g. RIP-relative `lea`): same shape
    /// as `ControlFlow` but the link targets data, not code.
    Linked {
        bytes: Vec<u8>,
        disp_offset: u8,
        disp_len: u8,
        link: Link,
    },
    /// A `ret`.
    Return { bytes: Vec<u8> },
    /// An indirect jump (e.g. through a jump table or a register).
    IndirectJump { bytes: Vec<u8> },
    /// An indirect call (e.g. through a PLT-resolved register/IFUNC).
    IndirectCall { bytes: Vec<u8> },
    /// A prologue/epilogue instruction that affects the stack frame
    /// (`push %rbp`, `sub $N, %rsp`, ...), tracked so passes inserting
    /// shadow-stack code can find the right splice point.
    StackFrame { bytes: Vec<u8> },
}

impl InstructionSemantic {
    /// Encoded size in bytes, per spec.md §3 "each semantic reports its
    /// encoded size".
    pub fn size(&self) -> u64 {
        self.raw_bytes().len() as u64
    }

    /// The raw encoded bytes, regardless of variant.
    pub fn raw_bytes(&self) -> &[u8] {
        match self {
            InstructionSemantic::RawByte { bytes }
            | InstructionSemantic::Literal { bytes }
            | InstructionSemantic::ControlFlow { bytes, .. }
            | InstructionSemantic::Linked { bytes, .. }
            | InstructionSemantic::Return { bytes }
            | InstructionSemantic::IndirectJump { bytes }
            | InstructionSemantic::IndirectCall { bytes }
            | InstructionSemantic::StackFrame { bytes } => bytes,
        }
    }

    /// The byte offset of the displacement field this semantic's Link
    /// patches, if any.
    pub fn displacement_offset(&self) -> Option<u8> {
        match self {
            InstructionSemantic::ControlFlow { disp_offset, .. }
            | InstructionSemantic::Linked { disp_offset, .. } => Some(*disp_offset),
            _ => None,
        }
    }

    pub fn displacement_len(&self) -> Option<u8> {
        match self {
            InstructionSemantic::ControlFlow { disp_len, .. }
            | InstructionSemantic::Linked { disp_len, .. } => Some(*disp_len),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&Link> {
        match self {
            InstructionSemantic::ControlFlow { link, .. }
            | InstructionSemantic::Linked { link, .. } => Some(link),
            _ => None,
        }
    }

    pub fn link_mut(&mut self) -> Option<&mut Link> {
        match self {
            InstructionSemantic::ControlFlow { link, .. }
            | InstructionSemantic::Linked { link, .. } => Some(link),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, InstructionSemantic::Return { .. })
    }

    pub fn is_control_flow(&self) -> bool {
        matches!(self, InstructionSemantic::ControlFlow { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ChunkId;

    #[test]
    fn size_matches_encoded_bytes() {
        let sem = InstructionSemantic::ControlFlow {
            bytes: vec![0xe9, 0x00, 0x00, 0x00, 0x00],
            disp_offset: 1,
            disp_len: 4,
            link: Link::Normal {
                target: ChunkId::new(0),
                scope: crate::link::LinkScope::Internal,
            },
        };
        assert_eq!(sem.size(), 5);
        assert_eq!(sem.displacement_offset(), Some(1));
        assert_eq!(sem.displacement_len(), Some(4));
    }
}
