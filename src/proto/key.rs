use super::Name;
use crate::asn1::constants::EncryptionType;
use crate::asn1::encrypted_data::EncryptionKey as KdcEncryptionKey;
use crate::constants::DES_KEY_LEN;
use crate::crypto::derive_key_des_cbc;
use crate::error::KrbError;
use std::fmt;
use tracing::error;
use zeroize::{Zeroize, Zeroizing};

/// A long term or session key. The key bytes are zeroed when the key is
/// dropped, or earlier through [`EncryptionKey::destroy`]. Once destroyed
/// every accessor fails with [`KrbError::KeyDestroyed`].
pub struct EncryptionKey {
    etype: EncryptionType,
    k: Zeroizing<Vec<u8>>,
    destroyed: bool,
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("etype", &self.etype)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

impl EncryptionKey {
    /// Derive the DES key for `name` from a password with the RFC 3961
    /// string-to-key and the default salt. The key is tagged as des-cbc-md5;
    /// use [`EncryptionKey::from_password_for`] when the etype matters.
    pub fn from_password(name: &Name, password: &str) -> Result<Self, KrbError> {
        Self::from_password_for(EncryptionType::DES_CBC_MD5, name, password)
    }

    /// As [`EncryptionKey::from_password`] for a chosen DES etype. All three
    /// single DES profiles share the same string-to-key.
    pub fn from_password_for(
        etype: EncryptionType,
        name: &Name,
        password: &str,
    ) -> Result<Self, KrbError> {
        if !etype.is_des() {
            error!(?etype, "only des keys can be derived from a password");
            return Err(KrbError::UnsupportedEncryption);
        }
        name.validate()?;

        let salt = name.default_salt();
        let k = derive_key_des_cbc(password.as_bytes(), salt.as_bytes())?;
        let k = Zeroizing::new(k);

        Self::from_bytes(etype, k.as_slice())
    }

    pub fn from_bytes(etype: EncryptionType, key: &[u8]) -> Result<Self, KrbError> {
        if etype.is_des() && key.len() != DES_KEY_LEN {
            error!(?etype, key_len = key.len(), "des key must be 8 bytes");
            return Err(KrbError::InvalidEncryptionKey);
        }

        if key.is_empty() {
            error!(?etype, "empty encryption key");
            return Err(KrbError::InvalidEncryptionKey);
        }

        Ok(EncryptionKey {
            etype,
            k: Zeroizing::new(key.to_vec()),
            destroyed: false,
        })
    }

    fn check_live(&self) -> Result<(), KrbError> {
        if self.destroyed {
            error!("attempt to use a destroyed key");
            Err(KrbError::KeyDestroyed)
        } else {
            Ok(())
        }
    }

    pub fn etype(&self) -> Result<EncryptionType, KrbError> {
        self.check_live().map(|_| self.etype)
    }

    pub fn key_bytes(&self) -> Result<&[u8], KrbError> {
        self.check_live().map(|_| self.k.as_slice())
    }

    /// The name of the cipher family this key belongs to.
    pub fn algorithm(&self) -> Result<&'static str, KrbError> {
        self.check_live()?;
        Ok(match self.etype {
            EncryptionType::DES_CBC_CRC
            | EncryptionType::DES_CBC_MD4
            | EncryptionType::DES_CBC_MD5 => "DES",
            EncryptionType::DES3_CBC_MD5
            | EncryptionType::DES3_CBC_SHA1
            | EncryptionType::DES3_CBC_SHA1_KD => "DESede",
            EncryptionType::AES128_CTS_HMAC_SHA1_96
            | EncryptionType::AES256_CTS_HMAC_SHA1_96
            | EncryptionType::AES128_CTS_HMAC_SHA256_128
            | EncryptionType::AES256_CTS_HMAC_SHA384_192 => "AES",
            EncryptionType::RC4_HMAC | EncryptionType::RC4_HMAC_EXP => "ArcFourHmac",
            EncryptionType::CAMELLIA128_CTS_CMAC | EncryptionType::CAMELLIA256_CTS_CMAC => {
                "Camellia"
            }
        })
    }

    pub fn format(&self) -> Result<&'static str, KrbError> {
        self.check_live().map(|_| "RAW")
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Zero the key bytes now rather than at drop.
    pub fn destroy(&mut self) {
        self.k.zeroize();
        self.destroyed = true;
    }

    pub(crate) fn des_key(&self) -> Result<Zeroizing<[u8; DES_KEY_LEN]>, KrbError> {
        self.check_live()?;
        if !self.etype.is_des() {
            error!(etype = ?self.etype, "key is not a des key");
            return Err(KrbError::UnsupportedEncryption);
        }
        let k: [u8; DES_KEY_LEN] = self.k.as_slice().try_into().map_err(|_| {
            error!("des key has an invalid length");
            KrbError::InvalidEncryptionKey
        })?;
        Ok(Zeroizing::new(k))
    }
}

impl TryFrom<&KdcEncryptionKey> for EncryptionKey {
    type Error = KrbError;

    fn try_from(kdc_key: &KdcEncryptionKey) -> Result<Self, Self::Error> {
        let etype = EncryptionType::try_from(kdc_key.key_type).map_err(|_| {
            error!(key_type = ?kdc_key.key_type, "unknown session key type");
            KrbError::UnsupportedEncryption
        })?;
        EncryptionKey::from_bytes(etype, kdc_key.key_value.as_bytes())
    }
}
