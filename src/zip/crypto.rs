//! Traditional PKWARE encryption (ZipCrypto).
//!
//! A password-keyed stream cipher over three 32-bit words. Every byte
//! advances the key state with the plaintext byte, so an entry has to be
//! processed strictly in order. Each encrypted entry starts with a 12-byte
//! header whose last plaintext byte is a check value, letting a reader
//! reject most wrong passwords before touching the payload.
//!
//! The scheme is weak and only here for compatibility.

use rand::RngCore;

/// Size of the encryption header that prefixes each encrypted entry.
pub const ENCRYPTION_HEADER_SIZE: usize = 12;

const INITIAL_KEYS: [u32; 3] = [0x1234_5678, 0x2345_6789, 0x3456_7890];

/// Reflected CRC-32 table for the key schedule. `crc32fast` only hashes
/// whole inverted buffers and has no raw single-byte step to reuse.
const CRC_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
};

/// One raw CRC-32 step, without the pre- and post-inversion of a full checksum.
fn crc32_update(crc: u32, byte: u8) -> u32 {
    CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8)
}

/// The value the last header byte must decrypt to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckByte {
    /// High byte of the entry CRC-32 (PKZIP).
    Crc32(u32),
    /// High byte of the MS-DOS time, used when the CRC is deferred to a
    /// data descriptor (Info-ZIP).
    DosTime(u16),
}

impl CheckByte {
    pub fn value(&self) -> u8 {
        match *self {
            CheckByte::Crc32(crc) => (crc >> 24) as u8,
            CheckByte::DosTime(time) => (time >> 8) as u8,
        }
    }
}

/// Cipher state for one entry.
#[derive(Clone)]
pub struct ZipCrypto {
    keys: [u32; 3],
}

impl ZipCrypto {
    /// Derive the initial state from a password.
    pub fn new(password: &[u8]) -> Self {
        let mut cipher = Self { keys: INITIAL_KEYS };
        for &b in password {
            cipher.update_keys(b);
        }
        cipher
    }

    fn update_keys(&mut self, plain: u8) {
        let [k0, k1, k2] = &mut self.keys;
        *k0 = crc32_update(*k0, plain);
        *k1 = k1
            .wrapping_add(*k0 & 0xFF)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        *k2 = crc32_update(*k2, (*k1 >> 24) as u8);
    }

    fn keystream_byte(&self) -> u8 {
        let temp = (self.keys[2] | 2) as u16;
        (temp.wrapping_mul(temp ^ 1) >> 8) as u8
    }

    pub fn decrypt_byte(&mut self, cipher: u8) -> u8 {
        let plain = cipher ^ self.keystream_byte();
        self.update_keys(plain);
        plain
    }

    pub fn encrypt_byte(&mut self, plain: u8) -> u8 {
        let cipher = plain ^ self.keystream_byte();
        self.update_keys(plain);
        cipher
    }

    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.decrypt_byte(*b);
        }
    }

    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.encrypt_byte(*b);
        }
    }

    /// Consume the encryption header. Returns `false` if the check byte
    /// does not match, which means the password is wrong.
    pub fn verify_header(&mut self, header: &[u8; ENCRYPTION_HEADER_SIZE], check: CheckByte) -> bool {
        let mut plain = *header;
        self.decrypt_in_place(&mut plain);
        plain[ENCRYPTION_HEADER_SIZE - 1] == check.value()
    }

    /// Produce an encrypted header: eleven random bytes and the check byte.
    pub fn encrypt_header<G: RngCore + ?Sized>(
        &mut self,
        check: CheckByte,
        rng: &mut G,
    ) -> [u8; ENCRYPTION_HEADER_SIZE] {
        let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
        rng.fill_bytes(&mut header[..ENCRYPTION_HEADER_SIZE - 1]);
        header[ENCRYPTION_HEADER_SIZE - 1] = check.value();
        self.encrypt_in_place(&mut header);
        header
    }
}

/// Decrypt an entry's raw bytes (header included). Returns `None` when the
/// password fails the header check.
pub fn decrypt_entry(password: &[u8], check: CheckByte, data: &[u8]) -> Option<Vec<u8>> {
    let (header, body) = data.split_first_chunk::<ENCRYPTION_HEADER_SIZE>()?;
    let mut cipher = ZipCrypto::new(password);
    if !cipher.verify_header(header, check) {
        return None;
    }
    let mut plain = body.to_vec();
    cipher.decrypt_in_place(&mut plain);
    Some(plain)
}

/// Encrypt an entry's compressed bytes, prefixing a fresh header.
pub fn encrypt_entry<G: RngCore + ?Sized>(
    password: &[u8],
    check: CheckByte,
    data: &[u8],
    rng: &mut G,
) -> Vec<u8> {
    let mut cipher = ZipCrypto::new(password);
    let mut out = Vec::with_capacity(ENCRYPTION_HEADER_SIZE + data.len());
    out.extend_from_slice(&cipher.encrypt_header(check, rng));
    let start = out.len();
    out.extend_from_slice(data);
    cipher.encrypt_in_place(&mut out[start..]);
    out
}
