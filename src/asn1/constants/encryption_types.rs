use num_enum::{IntoPrimitive, TryFromPrimitive};

/// RFC 3961 section 8 encryption type numbers. Only the single DES profiles
/// can be used to unlock a reply; the rest exist so that a KDC's choice can
/// be named in logs.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum EncryptionType {
    DES_CBC_CRC = 1,
    DES_CBC_MD4 = 2,
    DES_CBC_MD5 = 3,
    DES3_CBC_MD5 = 5,
    DES3_CBC_SHA1 = 7,
    DES3_CBC_SHA1_KD = 16,
    AES128_CTS_HMAC_SHA1_96 = 17,
    AES256_CTS_HMAC_SHA1_96 = 18,
    AES128_CTS_HMAC_SHA256_128 = 19,
    AES256_CTS_HMAC_SHA384_192 = 20,
    RC4_HMAC = 23,
    RC4_HMAC_EXP = 24,
    CAMELLIA128_CTS_CMAC = 25,
    CAMELLIA256_CTS_CMAC = 26,
}

impl EncryptionType {
    /// The etypes this client requests, in preference order.
    pub const DES_DEFAULTS: [EncryptionType; 3] = [
        EncryptionType::DES_CBC_CRC,
        EncryptionType::DES_CBC_MD4,
        EncryptionType::DES_CBC_MD5,
    ];

    /// True for the single DES profiles that share the DES string-to-key.
    pub fn is_des(self) -> bool {
        matches!(
            self,
            EncryptionType::DES_CBC_CRC | EncryptionType::DES_CBC_MD4 | EncryptionType::DES_CBC_MD5
        )
    }
}
