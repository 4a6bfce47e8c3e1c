//! End-to-end scenarios: each test assembles a program image by hand,
//! the way a compiler's code generator would, and drives it with
//! [`Runtime::run`].

use oxidex_bytecode::image::ProgramImage;
use oxidex_interpreter::{Config, Error, Runtime};

/// Opcode byte values, named for readability in the programs below.
mod op {
    pub const GET: u8 = 0;
    pub const INIT_IN_PLACE: u8 = 2;
    pub const MALLOC: u8 = 3;
    pub const ALLOCA: u8 = 4;
    pub const PRINT_STRING: u8 = 8;
    pub const LITERAL: u8 = 9;
    pub const HALT: u8 = 11;
    pub const NEW_REGION: u8 = 12;
    pub const FREE_REGION: u8 = 13;
    pub const DEREFERENCE: u8 = 14;
    pub const NEW_ARRAY: u8 = 15;
    pub const PROJECT_ARRAY: u8 = 17;
    pub const I32_ADD: u8 = 18;
    pub const U8_LITERAL: u8 = 25;
    pub const I32_TO_U8: u8 = 32;
}

fn usize_param(n: u64) -> [u8; 8] {
    n.to_le_bytes()
}

fn image(code: Vec<u8>) -> ProgramImage {
    let mut bytes = 0u32.to_le_bytes().to_vec();
    bytes.extend(code);
    ProgramImage::parse(bytes).unwrap()
}

fn run(code: Vec<u8>) -> Result<u8, Error> {
    Runtime::new(image(code), Config::default()).run()
}

#[test]
fn literal_and_halt() {
    let code = vec![op::LITERAL, 42, 0, 0, 0, op::U8_LITERAL, 0, op::HALT];
    assert_eq!(run(code).unwrap(), 0);
}

#[test]
fn arithmetic_adds_and_narrows_to_exit_status() {
    // push 3, push 4, add, narrow to u8, halt with the sum as exit status.
    let mut code = vec![op::LITERAL];
    code.extend(3i32.to_le_bytes());
    code.push(op::LITERAL);
    code.extend(4i32.to_le_bytes());
    code.push(op::I32_ADD);
    code.push(op::I32_TO_U8);
    code.push(op::HALT);
    assert_eq!(run(code).unwrap(), 7);
}

#[test]
fn region_round_trip_through_init_in_place_and_dereference() {
    // new-region(64), malloc(4), literal(42), init-in-place(0, 4),
    // dereference(4), narrow to u8, halt — exit status is whatever was
    // written into the heap object.
    let mut code = vec![op::NEW_REGION];
    code.extend(usize_param(64));
    code.push(op::MALLOC);
    code.extend(usize_param(4));
    code.push(op::LITERAL);
    code.extend(42i32.to_le_bytes());
    code.push(op::INIT_IN_PLACE);
    code.extend(usize_param(0));
    code.extend(usize_param(4));
    code.push(op::DEREFERENCE);
    code.extend(usize_param(4));
    code.push(op::I32_TO_U8);
    code.push(op::HALT);
    assert_eq!(run(code).unwrap(), 42);
}

#[test]
fn dereference_after_free_is_rejected() {
    // The instruction set exposes no per-object free, only free-region;
    // the use-after-free analog reachable from bytecode alone is reusing
    // a region handle once its region has been freed. `get` duplicates
    // the handle (without an explicit dup opcode) so free-region can
    // consume one copy while malloc later reuses the other.
    let mut code = vec![op::NEW_REGION];
    code.extend(usize_param(64));
    code.push(op::GET);
    code.extend(usize_param(0));
    code.extend(usize_param(8));
    code.push(op::FREE_REGION);
    code.push(op::MALLOC);
    code.extend(usize_param(4));
    let err = run(code).unwrap_err();
    assert!(matches!(err, Error::InvalidRegionHandle(_)));
}

#[test]
fn array_index_at_length_is_out_of_bounds() {
    // new-array(elem_size=4) of length 3, then project-array at index 3.
    let mut code = vec![op::NEW_REGION];
    code.extend(usize_param(64));
    code.push(op::LITERAL);
    code.extend(3i32.to_le_bytes());
    code.push(op::NEW_ARRAY);
    code.extend(usize_param(4));
    code.push(op::LITERAL);
    code.extend(3i32.to_le_bytes());
    code.push(op::PROJECT_ARRAY);
    code.extend(usize_param(4));
    let err = run(code).unwrap_err();
    assert_eq!(
        err,
        Error::ArrayIndexOutOfBounds {
            index: 3,
            len: 12
        }
    );
}

#[test]
fn array_index_below_length_succeeds() {
    let mut code = vec![op::NEW_REGION];
    code.extend(usize_param(64));
    code.push(op::LITERAL);
    code.extend(3i32.to_le_bytes());
    code.push(op::NEW_ARRAY);
    code.extend(usize_param(4));
    code.push(op::LITERAL);
    code.extend(2i32.to_le_bytes());
    code.push(op::PROJECT_ARRAY);
    code.extend(usize_param(4));
    code.push(op::I32_TO_U8);
    code.push(op::HALT);
    // A freshly allocated array is zeroed; index 2 is in bounds.
    assert_eq!(run(code).unwrap(), 0);
}

#[test]
fn segmented_stack_get_crosses_a_chunk_boundary() {
    // Push a marker, then alloca enough bytes to push the total past one
    // 4096-byte chunk, then read the marker back with `get` — the read
    // has to walk from the new top chunk back into the old one.
    let mut code = vec![op::LITERAL];
    code.extend(77i32.to_le_bytes());
    code.push(op::ALLOCA);
    code.extend(usize_param(4996)); // 4 (marker) + 4996 = 5000 bytes total
    code.push(op::GET);
    code.extend(usize_param(4996));
    code.extend(usize_param(4));
    code.push(op::I32_TO_U8);
    code.push(op::HALT);
    assert_eq!(run(code).unwrap(), 77);
}

#[test]
fn print_string_writes_data_section_payload() {
    // load-from-data-section(0) covers the whole 5-byte data section
    // ("hello"); print-string writes it to stdout and halts with 0.
    let mut bytes = 5u32.to_le_bytes().to_vec();
    bytes.extend_from_slice(b"hello");
    bytes.push(22); // load-from-data-section
    bytes.extend(usize_param(0));
    bytes.push(op::PRINT_STRING);
    bytes.push(op::U8_LITERAL);
    bytes.push(0);
    bytes.push(op::HALT);
    let image = ProgramImage::parse(bytes).unwrap();
    assert_eq!(Runtime::new(image, Config::default()).run().unwrap(), 0);
}
