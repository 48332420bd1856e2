use crate::constants::*;
use crate::error::KrbError;

use des::cipher::block_padding::NoPadding;
use des::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use des::Des;
use md4::Md4;
use md5::{Digest, Md5};
use tracing::{error, trace};
use zeroize::Zeroizing;

type DesCbcEnc = cbc::Encryptor<Des>;
type DesCbcDec = cbc::Decryptor<Des>;

const IV_ZERO: [u8; DES_BLOCK_SIZE] = [0; DES_BLOCK_SIZE];

// Each byte mapped to the nearest value with odd parity, changing only the low bit.
const ODD_PARITY: [u8; 256] = odd_parity_table();

// 7-bit values with their bit order reversed.
const REVERSE_7BIT: [u8; 128] = reverse_7bit_table();

/// DES weak and semi-weak keys, FIPS 74 section 3.6.
const DES_WEAK_KEYS: [[u8; DES_KEY_LEN]; 16] = [
    [0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01],
    [0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe, 0xfe],
    [0xe0, 0xe0, 0xe0, 0xe0, 0xf1, 0xf1, 0xf1, 0xf1],
    [0x1f, 0x1f, 0x1f, 0x1f, 0x0e, 0x0e, 0x0e, 0x0e],
    [0x01, 0xfe, 0x01, 0xfe, 0x01, 0xfe, 0x01, 0xfe],
    [0xfe, 0x01, 0xfe, 0x01, 0xfe, 0x01, 0xfe, 0x01],
    [0x1f, 0xe0, 0x1f, 0xe0, 0x0e, 0xf1, 0x0e, 0xf1],
    [0xe0, 0x1f, 0xe0, 0x1f, 0xf1, 0x0e, 0xf1, 0x0e],
    [0x01, 0xe0, 0x01, 0xe0, 0x01, 0xf1, 0x01, 0xf1],
    [0xe0, 0x01, 0xe0, 0x01, 0xf1, 0x01, 0xf1, 0x01],
    [0x1f, 0xfe, 0x1f, 0xfe, 0x0e, 0xfe, 0x0e, 0xfe],
    [0xfe, 0x1f, 0xfe, 0x1f, 0xfe, 0x0e, 0xfe, 0x0e],
    [0x01, 0x1f, 0x01, 0x1f, 0x01, 0x0e, 0x01, 0x0e],
    [0x1f, 0x01, 0x1f, 0x01, 0x0e, 0x01, 0x0e, 0x01],
    [0xe0, 0xfe, 0xe0, 0xfe, 0xf1, 0xfe, 0xf1, 0xfe],
    [0xfe, 0xe0, 0xfe, 0xe0, 0xfe, 0xf1, 0xfe, 0xf1],
];

const fn odd_parity_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let b = i as u8;
        table[i] = if b.count_ones() % 2 == 0 { b ^ 1 } else { b };
        i += 1;
    }
    table
}

const fn reverse_7bit_table() -> [u8; 128] {
    let mut table = [0u8; 128];
    let mut i = 0;
    while i < 128 {
        let mut reversed = 0u8;
        let mut bit = 0;
        while bit < 7 {
            if (i >> bit) & 1 == 1 {
                reversed |= 1 << (6 - bit);
            }
            bit += 1;
        }
        table[i] = reversed;
        i += 1;
    }
    table
}

/// RFC 3961 section 6.2 key correction. Forces odd parity on every byte and
/// then moves weak and semi-weak keys out of the weak set.
fn des_key_correction(key: &mut [u8; DES_KEY_LEN]) {
    for b in key.iter_mut() {
        *b = ODD_PARITY[*b as usize];
    }

    if DES_WEAK_KEYS.contains(key) {
        trace!("weak des key corrected");
        key[7] ^= 0xf0;
    }
}

/// Given the users passphrase and salt, derive the DES base key as described in
/// RFC 3961 section 6.2 (mit_des_string_to_key). The salt is the realm followed
/// by the principal's name components.
pub(crate) fn derive_key_des_cbc(
    passphrase: &[u8],
    salt: &[u8],
) -> Result<[u8; DES_KEY_LEN], KrbError> {
    let mut s = Zeroizing::new(Vec::with_capacity(
        passphrase.len() + salt.len() + DES_BLOCK_SIZE,
    ));
    s.extend_from_slice(passphrase);
    s.extend_from_slice(salt);

    let padded_len = s.len().div_ceil(DES_BLOCK_SIZE) * DES_BLOCK_SIZE;
    s.resize(padded_len, 0);

    // Fan-fold the 56 significant bits of each block together. Every second
    // block is bit reversed before folding.
    let mut folded: u64 = 0;
    for (i, block) in s.chunks_exact(DES_BLOCK_SIZE).enumerate() {
        let mut bits: u64 = 0;
        if i % 2 == 0 {
            for b in block {
                bits = (bits << 7) | u64::from(b & 0x7f);
            }
        } else {
            for b in block.iter().rev() {
                bits = (bits << 7) | u64::from(REVERSE_7BIT[(b & 0x7f) as usize]);
            }
        }
        folded ^= bits;
    }

    let mut tempkey = Zeroizing::new([0u8; DES_KEY_LEN]);
    for b in tempkey.iter_mut().rev() {
        *b = ((folded & 0x7f) as u8) << 1;
        folded >>= 7;
    }
    des_key_correction(&mut tempkey);

    // The key is then the final block of the padded input, encrypted under
    // itself in cbc mode.
    let mut cksum_buf = Zeroizing::new(s.to_vec());
    let ciphertext = DesCbcEnc::new_from_slices(tempkey.as_slice(), tempkey.as_slice())
        .map_err(|err| {
            error!(?err, "des key length");
            KrbError::InvalidEncryptionKey
        })?
        .encrypt_padded_mut::<NoPadding>(&mut cksum_buf, padded_len)
        .map_err(|err| {
            error!(?err, "des cbc checksum");
            KrbError::CiphertextInvalid
        })?;

    let last_block = ciphertext
        .last_chunk::<DES_KEY_LEN>()
        .ok_or(KrbError::CiphertextInvalid)?;

    let mut key = *last_block;
    des_key_correction(&mut key);

    Ok(key)
}

/// The modified CRC-32 of RFC 3961 section 6.1.3. Initial register of zero and
/// no final complement, which is the complement of the ISO CRC-32 started from
/// an all-ones register. Returned in the little endian octet order it is
/// carried in on the wire.
pub(crate) fn checksum_crc32_kerberos(data: &[u8]) -> [u8; CRC32_CKSUM_LEN] {
    let mut hasher = crc32fast::Hasher::new_with_initial(u32::MAX);
    hasher.update(data);
    (!hasher.finalize()).to_le_bytes()
}

fn checksum_md4(data: &[u8]) -> Vec<u8> {
    let mut hasher = Md4::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

fn checksum_md5(data: &[u8]) -> Vec<u8> {
    Md5::digest(data).to_vec()
}

/// Decrypt and verify a des-cbc-crc (etype 1) ciphertext. The key doubles as the IV.
pub(crate) fn decrypt_des_cbc_crc(
    key: &[u8; DES_KEY_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, KrbError> {
    decrypt_des_cbc_cksum(key, key, ciphertext, CRC32_CKSUM_LEN, |data| {
        checksum_crc32_kerberos(data).to_vec()
    })
}

/// Decrypt and verify a des-cbc-md4 (etype 2) ciphertext.
pub(crate) fn decrypt_des_cbc_md4(
    key: &[u8; DES_KEY_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, KrbError> {
    decrypt_des_cbc_cksum(key, &IV_ZERO, ciphertext, MD4_CKSUM_LEN, checksum_md4)
}

/// Decrypt and verify a des-cbc-md5 (etype 3) ciphertext.
pub(crate) fn decrypt_des_cbc_md5(
    key: &[u8; DES_KEY_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, KrbError> {
    decrypt_des_cbc_cksum(key, &IV_ZERO, ciphertext, MD5_CKSUM_LEN, checksum_md5)
}

/// RFC 3961 section 6.2.1. The plaintext layout is
/// `confounder | checksum | msg | pad`, where the checksum is computed over
/// the whole buffer with the checksum field zeroed. There is no separate MAC,
/// so a wrong key shows up as a checksum mismatch.
///
/// The returned message still carries its trailing zero padding. DER
/// decoding of the content stops at the end of the outer element.
fn decrypt_des_cbc_cksum<F>(
    key: &[u8; DES_KEY_LEN],
    iv: &[u8; DES_BLOCK_SIZE],
    ciphertext: &[u8],
    cksum_len: usize,
    cksum: F,
) -> Result<Vec<u8>, KrbError>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    let header_len = DES_BLOCK_SIZE + cksum_len;

    if ciphertext.len() < header_len || ciphertext.len() % DES_BLOCK_SIZE != 0 {
        error!(
            ciphertext_len = ciphertext.len(),
            "des ciphertext has an invalid length"
        );
        return Err(KrbError::CiphertextInvalid);
    }

    let mut plaintext = Zeroizing::new(ciphertext.to_vec());

    DesCbcDec::new_from_slices(key, iv)
        .map_err(|err| {
            error!(?err, "des key length");
            KrbError::InvalidEncryptionKey
        })?
        .decrypt_padded_mut::<NoPadding>(&mut plaintext)
        .map_err(|err| {
            error!(?err, "des cbc decrypt");
            KrbError::CiphertextInvalid
        })?;

    let received = plaintext[DES_BLOCK_SIZE..header_len].to_vec();
    plaintext[DES_BLOCK_SIZE..header_len].fill(0);

    let computed = cksum(plaintext.as_slice());

    if computed != received {
        error!("des checksum mismatch, likely an incorrect key");
        return Err(KrbError::MessageAuthenticationFailed);
    }

    Ok(plaintext[header_len..].to_vec())
}

#[cfg(test)]
pub(crate) fn encrypt_des_cbc_md5(
    key: &[u8; DES_KEY_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, KrbError> {
    encrypt_des_cbc_cksum(key, &IV_ZERO, plaintext, MD5_CKSUM_LEN, checksum_md5)
}

#[cfg(test)]
pub(crate) fn encrypt_des_cbc_crc(
    key: &[u8; DES_KEY_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>, KrbError> {
    encrypt_des_cbc_cksum(key, key, plaintext, CRC32_CKSUM_LEN, |data| {
        checksum_crc32_kerberos(data).to_vec()
    })
}

#[cfg(test)]
fn encrypt_des_cbc_cksum<F>(
    key: &[u8; DES_KEY_LEN],
    iv: &[u8; DES_BLOCK_SIZE],
    plaintext: &[u8],
    cksum_len: usize,
    cksum: F,
) -> Result<Vec<u8>, KrbError>
where
    F: Fn(&[u8]) -> Vec<u8>,
{
    use rand::{rng, Rng};

    let mut confounder = [0u8; DES_BLOCK_SIZE];
    rng().fill(&mut confounder);

    let header_len = DES_BLOCK_SIZE + cksum_len;
    let mut buf = Vec::with_capacity(header_len + plaintext.len() + DES_BLOCK_SIZE);
    buf.extend_from_slice(&confounder);
    buf.resize(header_len, 0);
    buf.extend_from_slice(plaintext);
    let padded_len = buf.len().div_ceil(DES_BLOCK_SIZE) * DES_BLOCK_SIZE;
    buf.resize(padded_len, 0);

    let computed = cksum(&buf);
    buf[DES_BLOCK_SIZE..header_len].copy_from_slice(&computed);

    DesCbcEnc::new_from_slices(key, iv)
        .map_err(|_| KrbError::InvalidEncryptionKey)?
        .encrypt_padded_mut::<NoPadding>(&mut buf, padded_len)
        .map_err(|_| KrbError::CiphertextInvalid)?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_hex::assert_eq_hex;

    #[test]
    fn des_string_to_key_rfc3961_vectors() {
        let _ = tracing_subscriber::fmt::try_init();

        // RFC 3961 appendix A.2
        let key = derive_key_des_cbc(b"password", b"ATHENA.MIT.EDUraeburn").unwrap();
        assert_eq_hex!(key.to_vec(), hex::decode("cbc22fae235298e3").unwrap());

        let key = derive_key_des_cbc(b"potatoe", b"WHITEHOUSE.GOVdanny").unwrap();
        assert_eq_hex!(key.to_vec(), hex::decode("df3d32a74fd92a01").unwrap());

        // G clef, U+1D11E
        let key = derive_key_des_cbc(
            "\u{1D11E}".as_bytes(),
            b"EXAMPLE.COMpianist",
        )
        .unwrap();
        assert_eq_hex!(key.to_vec(), hex::decode("4ffb26bab0cd9413").unwrap());
    }

    #[test]
    fn des_string_to_key_empty_password() {
        let key = derive_key_des_cbc(b"", b"EXAMPLE.COMalice").unwrap();
        assert_eq_hex!(key.to_vec(), hex::decode("924f57e08a15648a").unwrap());

        let again = derive_key_des_cbc(b"", b"EXAMPLE.COMalice").unwrap();
        assert_eq!(key, again);
    }

    #[test]
    fn des_string_to_key_odd_parity() {
        let inputs: [(&[u8], &[u8]); 6] = [
            (b"password", b"ATHENA.MIT.EDUraeburn"),
            (b"right", b"EXAMPLE.COMalice"),
            (b"wrong", b"EXAMPLE.COMalice"),
            (b"", b"EXAMPLE.COMalice"),
            // Exactly one block, no padding.
            (b"12345678", b""),
            (b"a much longer passphrase spanning blocks", b"EXAMPLE.COMalice"),
        ];

        for (passphrase, salt) in inputs {
            let key = derive_key_des_cbc(passphrase, salt).unwrap();
            assert_eq!(key.len(), DES_KEY_LEN);
            for b in key {
                assert_eq!(b.count_ones() % 2, 1, "byte {b:02x} lacks odd parity");
            }
            assert!(!DES_WEAK_KEYS.contains(&key));
        }
    }

    #[test]
    fn des_string_to_key_adjacent_inputs_differ() {
        let base = derive_key_des_cbc(b"right", b"EXAMPLE.COMalice").unwrap();

        let right = derive_key_des_cbc(b"right", b"EXAMPLE.COMalice").unwrap();
        assert_eq_hex!(right.to_vec(), hex::decode("4c1004b04973a78a").unwrap());

        let wrong = derive_key_des_cbc(b"wrong", b"EXAMPLE.COMalice").unwrap();
        assert_eq_hex!(wrong.to_vec(), hex::decode("dc16380e57ae29d5").unwrap());

        let adjacent: [(&[u8], &[u8]); 5] = [
            (b"righu", b"EXAMPLE.COMalice"),
            (b"Right", b"EXAMPLE.COMalice"),
            (b"right", b"EXAMPLE.COMalicf"),
            (b"right", b"EXAMPLE.CONalice"),
            (b"right", b"EXAMPLE.COMbob"),
        ];

        for (passphrase, salt) in adjacent {
            let other = derive_key_des_cbc(passphrase, salt).unwrap();
            assert_ne!(base, other);
        }
    }

    #[test]
    fn des_key_correction_weak_key() {
        let mut key = [0x01; DES_KEY_LEN];
        des_key_correction(&mut key);
        assert_eq_hex!(key.to_vec(), hex::decode("01010101010101f1").unwrap());

        // Even parity bytes have the low bit flipped.
        let mut key = [0x00, 0x03, 0xfe, 0x7f, 0x80, 0x10, 0x11, 0xff];
        des_key_correction(&mut key);
        assert_eq_hex!(key.to_vec(), hex::decode("0102fe7f801010fe").unwrap());
    }

    #[test]
    fn crc32_kerberos_rfc3961_vectors() {
        assert_eq_hex!(
            checksum_crc32_kerberos(b"foo").to_vec(),
            hex::decode("33bc3273").unwrap()
        );
        assert_eq_hex!(
            checksum_crc32_kerberos(b"test0123456789").to_vec(),
            hex::decode("d6883eb8").unwrap()
        );
        assert_eq_hex!(
            checksum_crc32_kerberos(b"MASSACHVSETTS INSTITVTE OF TECHNOLOGY").to_vec(),
            hex::decode("f78041e3").unwrap()
        );
    }

    const TEST_KEY: [u8; 8] = [0xcb, 0xc2, 0x2f, 0xae, 0x23, 0x52, 0x98, 0xe3];
    const TEST_MSG: &[u8] = b"krime test message";

    #[test]
    fn des_cbc_md5_decrypt() {
        // Confounder 0102030405060708
        let ciphertext = hex::decode("39b8ed5a17c327d2587ac104b3c7adb057adc0d148b6c1e4a899d17e61627dd580f1f7a9ed25ec46b075f2ada04935e8").unwrap();
        let plaintext = decrypt_des_cbc_md5(&TEST_KEY, &ciphertext).unwrap();
        assert_eq!(&plaintext[..TEST_MSG.len()], TEST_MSG);
        assert!(plaintext[TEST_MSG.len()..].iter().all(|b| *b == 0));
    }

    #[test]
    fn des_cbc_md4_decrypt() {
        let ciphertext = hex::decode("39b8ed5a17c327d23ed4eeb4d0549c6b247395a0cdaa7f43c6852d06fbcf235fa3a0d7fcc17aed9930d1613663c3ae9d").unwrap();
        let plaintext = decrypt_des_cbc_md4(&TEST_KEY, &ciphertext).unwrap();
        assert_eq!(&plaintext[..TEST_MSG.len()], TEST_MSG);
    }

    #[test]
    fn des_cbc_crc_decrypt() {
        let ciphertext = hex::decode(
            "cbdb945faa2b2e1bcc65e79434c00002d488bd14a4dd895bbcc5f079e6864cd1",
        )
        .unwrap();
        let plaintext = decrypt_des_cbc_crc(&TEST_KEY, &ciphertext).unwrap();
        assert_eq!(&plaintext[..TEST_MSG.len()], TEST_MSG);
    }

    #[test]
    fn des_cbc_wrong_key_fails_checksum() {
        let ciphertext = hex::decode("39b8ed5a17c327d2587ac104b3c7adb057adc0d148b6c1e4a899d17e61627dd580f1f7a9ed25ec46b075f2ada04935e8").unwrap();
        let wrong_key = derive_key_des_cbc(b"wrong", b"EXAMPLE.COMalice").unwrap();
        assert!(matches!(
            decrypt_des_cbc_md5(&wrong_key, &ciphertext),
            Err(KrbError::MessageAuthenticationFailed)
        ));

        // Truncated and misaligned ciphertexts are rejected before decryption.
        assert!(matches!(
            decrypt_des_cbc_md5(&TEST_KEY, &ciphertext[..16]),
            Err(KrbError::CiphertextInvalid)
        ));
        assert!(matches!(
            decrypt_des_cbc_md5(&TEST_KEY, &ciphertext[..27]),
            Err(KrbError::CiphertextInvalid)
        ));
    }

    #[test]
    fn des_cbc_encrypt_then_decrypt() {
        let key = derive_key_des_cbc(b"wrong", b"EXAMPLE.COMalice").unwrap();

        let ciphertext = encrypt_des_cbc_md5(&key, TEST_MSG).unwrap();
        assert_eq!(ciphertext.len() % DES_BLOCK_SIZE, 0);
        let plaintext = decrypt_des_cbc_md5(&key, &ciphertext).unwrap();
        assert_eq!(&plaintext[..TEST_MSG.len()], TEST_MSG);

        let ciphertext = encrypt_des_cbc_crc(&key, TEST_MSG).unwrap();
        let plaintext = decrypt_des_cbc_crc(&key, &ciphertext).unwrap();
        assert_eq!(&plaintext[..TEST_MSG.len()], TEST_MSG);
    }
}
