//! Shared helpers for pulling emitted modules apart in tests.

use std::collections::HashSet;

/// One decoded instruction: opcode plus the operand words after the
/// header.
pub struct Instruction {
    pub opcode: u16,
    pub operands: Vec<u32>,
}

/// Parses the module and asserts the structural invariants: magic and
/// version words, exact instruction framing with no overruns or gaps,
/// unique result ids, ids defined before their structural uses, and an
/// id bound of max result id plus one.
pub fn check_module(words: &[u32]) -> Vec<Instruction> {
    assert!(words.len() >= 5, "module shorter than its header");
    assert_eq!(words[0], 0x0723_0203, "bad magic");
    assert_eq!(words[1], 0x0001_0000, "bad version");
    assert_eq!(words[2], 0, "generator should be zero");
    assert_eq!(words[4], 0, "schema should be zero");

    let mut instructions = Vec::new();
    let mut i = 5;
    while i < words.len() {
        let header = words[i];
        let count = (header >> 16) as usize;
        let opcode = (header & 0xffff) as u16;
        assert!(count >= 1, "zero-length instruction at word {i}");
        assert!(i + count <= words.len(), "instruction overruns the module");
        instructions.push(Instruction {
            opcode,
            operands: words[i + 1..i + count].to_vec(),
        });
        i += count;
    }
    assert_eq!(i, words.len(), "trailing words after the last instruction");

    let mut defined = HashSet::new();
    let mut max_id = 0u32;
    for inst in &instructions {
        let (type_pos, result_pos) = id_positions(inst.opcode);
        if let Some(p) = type_pos {
            let ty = inst.operands[p];
            assert!(
                defined.contains(&ty),
                "opcode {} uses type id {ty} before its definition",
                inst.opcode
            );
        }
        if let Some(p) = result_pos {
            let id = inst.operands[p];
            assert!(defined.insert(id), "result id {id} defined twice");
            max_id = max_id.max(id);
        }
        // OpStore has no result; both of its operands must exist.
        if inst.opcode == 62 {
            for &id in &inst.operands[..2] {
                assert!(defined.contains(&id), "store references undefined id {id}");
            }
        }
    }
    assert_eq!(words[3], max_id + 1, "id bound mismatch");
    instructions
}

/// Where the result-type and result-id words sit for the opcodes the
/// backend emits.
fn id_positions(opcode: u16) -> (Option<usize>, Option<usize>) {
    match opcode {
        // OpExtInstImport, type declarations, OpLabel.
        11 | 19..=25 | 27 | 28 | 30 | 32 | 33 | 248 => (None, Some(0)),
        // Everything with a result type followed by a result id.
        12 | 41..=44 | 54 | 59 | 61 | 65 | 79..=81 | 87 | 126..=148 | 207 | 208 => {
            (Some(0), Some(1))
        }
        _ => (None, None),
    }
}

pub fn find<'a>(instructions: &'a [Instruction], opcode: u16) -> Vec<&'a Instruction> {
    instructions
        .iter()
        .filter(|inst| inst.opcode == opcode)
        .collect()
}

pub fn find_one<'a>(instructions: &'a [Instruction], opcode: u16) -> &'a Instruction {
    let found = find(instructions, opcode);
    assert_eq!(found.len(), 1, "expected exactly one opcode {opcode}");
    found[0]
}

/// Decodes a NUL-terminated packed string; returns it together with the
/// number of words it occupied.
pub fn decode_string(words: &[u32]) -> (String, usize) {
    let mut bytes = Vec::new();
    let mut consumed = 0;
    'outer: for &word in words {
        consumed += 1;
        for byte in word.to_le_bytes() {
            if byte == 0 {
                break 'outer;
            }
            bytes.push(byte);
        }
    }
    (String::from_utf8(bytes).expect("non-utf8 string"), consumed)
}
