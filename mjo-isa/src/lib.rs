//! Majiro bytecode instruction set.
//!
//! This crate provides the opcode table with its precompiled operand and
//! stack-transition descriptors, the [`Instruction`] model, and the
//! instruction-level decoder and encoder. Identifier hashing and the script
//! keystream live in [`crc`].

pub mod crc;
pub mod descriptor;
mod decoder;
mod emitter;
pub mod flags;
mod instruction;
pub mod opcode;
pub mod sjis;

pub use decoder::{DecodeError, decode, decode_one};
pub use descriptor::{EffectError, OperandKind, PopToken, PushToken, StackEffect};
pub use emitter::{EncodeError, encode, encode_one, encoded_size};
pub use flags::{Flags, InvertMode, MjoType, Modifier, Scope, TypeMask};
pub use instruction::{Instruction, Target};
pub use opcode::{NotFound, Opcode, by_mnemonic, by_value, op};
