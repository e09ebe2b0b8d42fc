//! Reflected CRC32/CRC64 primitives.
//!
//! Identifier hashes in scripts are CRC32 over Shift-JIS bytes, and the
//! script keystream is the raw little-endian bytes of the CRC32 lookup table.

const CRC32_POLY: u32 = 0xEDB8_8320;
const CRC64_POLY: u64 = 0x42F0_E1EB_A9EA_3693;

const fn crc32_entry(index: u32) -> u32 {
    let mut value = index;
    let mut round = 0;
    while round < 8 {
        value = if value & 1 != 0 {
            (value >> 1) ^ CRC32_POLY
        } else {
            value >> 1
        };
        round += 1;
    }
    value
}

const fn crc64_entry(index: u64) -> u64 {
    let mut value = index;
    let mut round = 0;
    while round < 8 {
        value = if value & 1 != 0 {
            (value >> 1) ^ CRC64_POLY
        } else {
            value >> 1
        };
        round += 1;
    }
    value
}

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = crc32_entry(i as u32);
        i += 1;
    }
    table
}

const fn build_crc64_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = crc64_entry(i as u64);
        i += 1;
    }
    table
}

/// Maps the top byte of a table entry back to the entry's index. Every entry
/// of the reflected CRC32 table has a distinct top byte.
const fn build_crc32_inverse() -> [u8; 256] {
    let mut index = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        index[(CRC32_TABLE[i] >> 24) as usize] = i as u8;
        i += 1;
    }
    index
}

const fn build_key32() -> [u8; 1024] {
    let mut key = [0u8; 1024];
    let mut i = 0;
    while i < 256 {
        let bytes = CRC32_TABLE[i].to_le_bytes();
        let mut b = 0;
        while b < 4 {
            key[i * 4 + b] = bytes[b];
            b += 1;
        }
        i += 1;
    }
    key
}

const fn build_key64() -> [u8; 2048] {
    let mut key = [0u8; 2048];
    let mut i = 0;
    while i < 256 {
        let bytes = CRC64_TABLE[i].to_le_bytes();
        let mut b = 0;
        while b < 8 {
            key[i * 8 + b] = bytes[b];
            b += 1;
        }
        i += 1;
    }
    key
}

pub const CRC32_TABLE: [u32; 256] = build_crc32_table();
pub const CRC64_TABLE: [u64; 256] = build_crc64_table();
const CRC32_INVERSE: [u8; 256] = build_crc32_inverse();

/// Keystream for encrypted script blobs.
pub const CRYPT_KEY32: [u8; 1024] = build_key32();
pub const CRYPT_KEY64: [u8; 2048] = build_key64();

pub fn hash32(bytes: &[u8]) -> u32 {
    hash32_continue(bytes, 0)
}

/// Continue a hash from a previous result, so that
/// `hash32_continue(b, hash32(a)) == hash32(a ++ b)`.
pub fn hash32_continue(bytes: &[u8], init: u32) -> u32 {
    let mut crc = !init;
    for &b in bytes {
        crc = (crc >> 8) ^ CRC32_TABLE[((crc ^ b as u32) & 0xff) as usize];
    }
    !crc
}

/// Undo the effect of `suffix` on a finished hash.
///
/// Returns the value `h` such that `hash32_continue(suffix, h) == target`.
pub fn hash32_inverse(suffix: &[u8], target: u32) -> u32 {
    let mut crc = !target;
    for &b in suffix.iter().rev() {
        let index = CRC32_INVERSE[(crc >> 24) as usize];
        crc = ((crc ^ CRC32_TABLE[index as usize]) << 8) | (index ^ b) as u32;
    }
    !crc
}

pub fn hash64(bytes: &[u8]) -> u64 {
    hash64_continue(bytes, 0)
}

pub fn hash64_continue(bytes: &[u8], init: u64) -> u64 {
    let mut crc = !init;
    for &b in bytes {
        crc = (crc >> 8) ^ CRC64_TABLE[((crc ^ b as u64) & 0xff) as usize];
    }
    !crc
}

/// XOR `data` in place with the 32-bit keystream, starting at key position
/// `key_offset`. Applying it twice restores the input.
pub fn crypt32(data: &mut [u8], key_offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= CRYPT_KEY32[(key_offset + i) & 0x3ff];
    }
}

pub fn crypt64(data: &mut [u8], key_offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= CRYPT_KEY64[(key_offset + i) & 0x7ff];
    }
}
