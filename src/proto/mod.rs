mod key;
pub(crate) mod reply;
mod request;
mod ticket;

pub use self::key::EncryptionKey;
pub use self::reply::{AuthenticationReply, ErrorReply, KerberosReply};
pub use self::request::{AuthenticationRequest, AuthenticationRequestBuilder, KerberosRequest};
pub use self::ticket::Ticket;
pub use crate::asn1::constants::{EncryptionType, KrbErrorCode, PaDataType};
pub use crate::asn1::kerberos_flags::KerberosFlags;
pub use crate::asn1::ticket_flags::TicketFlags;

use crate::asn1::{
    constants::PrincipalNameType,
    der_element_len,
    encrypted_data::EncryptedData as KdcEncryptedData,
    kerberos_string::KerberosString,
    principal_name::PrincipalName,
    realm::Realm,
    tagged_enc_kdc_rep_part::{
        EncKdcRepPart as Asn1EncKdcRepPart, LastReqItem as KdcLastReqItem, TaggedEncKdcRepPart,
    },
};
use crate::crypto::{decrypt_des_cbc_crc, decrypt_des_cbc_md4, decrypt_des_cbc_md5};
use crate::error::KrbError;
use der::Decode;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use tracing::{error, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Ord, PartialOrd)]
pub enum Name {
    Principal {
        name: String,
        realm: String,
    },
    SrvInst {
        service: String,
        instance: Vec<String>,
        realm: String,
    },
    SrvHst {
        service: String,
        host: String,
        realm: String,
    },
}

#[derive(Debug, Clone)]
pub enum EncryptedData {
    DesCbcCrc {
        kvno: Option<u32>,
        data: Vec<u8>,
    },
    DesCbcMd4 {
        kvno: Option<u32>,
        data: Vec<u8>,
    },
    DesCbcMd5 {
        kvno: Option<u32>,
        data: Vec<u8>,
    },
    Opaque {
        etype: i32,
        kvno: Option<u32>,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastRequestItem {
    None(SystemTime),
    LastInitialTgt(SystemTime),
    LastInitial(SystemTime),
    TgtIssued(SystemTime),
    LastRenewal(SystemTime),
    LastRequest(SystemTime),
    PasswordExpire(SystemTime),
    AccountExpire(SystemTime),
    Other(i32, SystemTime),
}

/// The decrypted EncASRepPart of a reply.
#[derive(Debug)]
pub struct KdcReplyPart {
    pub(crate) key: EncryptionKey,
    pub(crate) last_req: Vec<LastRequestItem>,
    pub(crate) nonce: u32,
    pub(crate) key_expiration: Option<SystemTime>,
    pub(crate) flags: TicketFlags,
    pub(crate) auth_time: SystemTime,
    pub(crate) start_time: Option<SystemTime>,
    pub(crate) end_time: SystemTime,
    pub(crate) renew_until: Option<SystemTime>,
    pub(crate) server: Name,
}

impl Name {
    pub fn principal(name: &str, realm: &str) -> Self {
        Self::Principal {
            name: name.to_string(),
            realm: realm.to_string(),
        }
    }

    pub fn service_krbtgt(realm: &str) -> Self {
        /*
         * RFC4120, section 7.3, Name of the TGS
         * The principal identifier of the ticket-granting service shall be
         * composed of three parts: the realm of the KDC issuing the TGS ticket,
         * and a two-part name of type NT-SRV-INST, with the first part "krbtgt"
         * and the second part the name of the realm that will accept the TGT.
         */
        Self::SrvInst {
            service: "krbtgt".to_string(),
            instance: vec![realm.to_string()],
            realm: realm.to_string(),
        }
    }

    pub fn is_service_krbtgt(&self, check_realm: &str) -> bool {
        match self {
            Self::SrvInst {
                service,
                instance,
                realm,
            } => service == "krbtgt" && realm == check_realm && instance.len() <= 1,
            _ => false,
        }
    }

    /// If the name is a PRINCIPAL then return it's name and realm components. If
    /// not, then an error is returned.
    pub fn principal_name(&self) -> Result<(&str, &str), KrbError> {
        match self {
            Name::Principal { name, realm } => Ok((name.as_str(), realm.as_str())),
            _ => {
                trace!(principal_name = ?self, "not a principal");
                Err(KrbError::NameNotPrincipal)
            }
        }
    }

    pub fn realm(&self) -> &str {
        match self {
            Name::Principal { realm, .. }
            | Name::SrvInst { realm, .. }
            | Name::SrvHst { realm, .. } => realm.as_str(),
        }
    }

    /// The name components, without the realm.
    pub fn components(&self) -> Vec<&str> {
        match self {
            Name::Principal { name, .. } => vec![name.as_str()],
            Name::SrvInst {
                service, instance, ..
            } => std::iter::once(service.as_str())
                .chain(instance.iter().map(String::as_str))
                .collect(),
            Name::SrvHst { service, host, .. } => vec![service.as_str(), host.as_str()],
        }
    }

    /// Fails with `NameInvalid` when the realm or any component is empty.
    pub fn validate(&self) -> Result<(), KrbError> {
        let components = self.components();
        if self.realm().is_empty()
            || components.is_empty()
            || components.iter().any(|c| c.is_empty())
        {
            error!(name = ?self, "name has an empty realm or component");
            return Err(KrbError::NameInvalid);
        }
        Ok(())
    }

    /// Convert a name off the wire, keeping name types and shapes that the
    /// strict conversion refuses by their components alone.
    pub(crate) fn from_wire_lenient(princ: &PrincipalName, realm: &Realm) -> Name {
        Name::try_from((princ, realm)).unwrap_or_else(|err| {
            warn!(
                ?err,
                name_type = princ.name_type,
                name = %princ.joined(),
                "keeping name by its components"
            );
            let realm = realm.to_string();
            let mut components = princ.name_string.iter().map(|s| s.to_string());
            let first = components.next().unwrap_or_default();
            let rest: Vec<String> = components.collect();
            if rest.is_empty() {
                Name::Principal { name: first, realm }
            } else {
                Name::SrvInst {
                    service: first,
                    instance: rest,
                    realm,
                }
            }
        })
    }

    /// The RFC 3961 default salt: the realm followed by every name component,
    /// with no separators.
    pub(crate) fn default_salt(&self) -> String {
        let mut salt = self.realm().to_string();
        for component in self.components() {
            salt.push_str(component);
        }
        salt
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.components().join("/"), self.realm())
    }
}

impl FromStr for Name {
    type Err = KrbError;

    /// Parses `name@REALM` as a principal, and `service/instance@REALM` as a
    /// service instance.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, realm)) = s.rsplit_once('@') else {
            error!(?s, "name has no realm");
            return Err(KrbError::NameInvalid);
        };

        let mut components = name.split('/');
        let first = components.next().unwrap_or_default();
        let rest: Vec<String> = components.map(str::to_string).collect();

        if realm.is_empty() || first.is_empty() || rest.iter().any(|c| c.is_empty()) {
            error!(?s, "name has an empty component");
            return Err(KrbError::NameInvalid);
        }

        if rest.is_empty() {
            Ok(Name::principal(first, realm))
        } else {
            Ok(Name::SrvInst {
                service: first.to_string(),
                instance: rest,
                realm: realm.to_string(),
            })
        }
    }
}

impl TryFrom<&Name> for (PrincipalName, Realm) {
    type Error = KrbError;

    fn try_from(name: &Name) -> Result<(PrincipalName, Realm), KrbError> {
        let name_type = match name {
            Name::Principal { .. } => PrincipalNameType::NtPrincipal,
            Name::SrvInst { .. } => PrincipalNameType::NtSrvInst,
            Name::SrvHst { .. } => PrincipalNameType::NtSrvHst,
        };

        let name_string = name
            .components()
            .into_iter()
            .map(KerberosString::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        let realm = Realm::from_str(name.realm())?;

        Ok((
            PrincipalName {
                name_type: name_type.into(),
                name_string,
            },
            realm,
        ))
    }
}

impl TryFrom<(&PrincipalName, &Realm)> for Name {
    type Error = KrbError;

    fn try_from((princ, realm): (&PrincipalName, &Realm)) -> Result<Self, Self::Error> {
        let name_type = princ.principal_name_type().ok_or_else(|| {
            error!(name_type = ?princ.name_type, "invalid principal name type");
            KrbError::PrincipalNameInvalidType
        })?;

        let name_string: Vec<String> = princ.name_string.iter().map(|s| s.to_string()).collect();
        let realm = realm.to_string();

        trace!(?name_type, ?name_string);

        match name_type {
            // MIT will encode host services as NT-PRINCIPAL, so check the length.
            PrincipalNameType::NtPrincipal | PrincipalNameType::NtUnknown => {
                match name_string.as_slice() {
                    [name] => Ok(Name::Principal {
                        name: name.clone(),
                        realm,
                    }),
                    [service, host] => Ok(Name::SrvHst {
                        service: service.clone(),
                        host: host.clone(),
                        realm,
                    }),
                    _ => Err(KrbError::NameNumberOfComponents),
                }
            }
            PrincipalNameType::NtSrvInst => {
                let (service, instance) = name_string
                    .split_first()
                    .ok_or(KrbError::NameNumberOfComponents)?;
                Ok(Name::SrvInst {
                    service: service.clone(),
                    instance: instance.to_vec(),
                    realm,
                })
            }
            PrincipalNameType::NtSrvHst => match name_string.as_slice() {
                [service, host] => Ok(Name::SrvHst {
                    service: service.clone(),
                    host: host.clone(),
                    realm,
                }),
                _ => Err(KrbError::NameNumberOfComponents),
            },
            _ => Err(KrbError::PrincipalNameInvalidType),
        }
    }
}

impl TryFrom<(PrincipalName, Realm)> for Name {
    type Error = KrbError;

    fn try_from((princ, realm): (PrincipalName, Realm)) -> Result<Self, Self::Error> {
        Self::try_from((&princ, &realm))
    }
}

impl From<KdcEncryptedData> for EncryptedData {
    fn from(enc_data: KdcEncryptedData) -> Self {
        let kvno = enc_data.kvno;
        let data = enc_data.cipher.into_bytes().into_vec();

        match EncryptionType::try_from(enc_data.etype) {
            Ok(EncryptionType::DES_CBC_CRC) => EncryptedData::DesCbcCrc { kvno, data },
            Ok(EncryptionType::DES_CBC_MD4) => EncryptedData::DesCbcMd4 { kvno, data },
            Ok(EncryptionType::DES_CBC_MD5) => EncryptedData::DesCbcMd5 { kvno, data },
            _ => EncryptedData::Opaque {
                etype: enc_data.etype,
                kvno,
                data,
            },
        }
    }
}

impl EncryptedData {
    pub fn etype(&self) -> i32 {
        match self {
            EncryptedData::DesCbcCrc { .. } => EncryptionType::DES_CBC_CRC.into(),
            EncryptedData::DesCbcMd4 { .. } => EncryptionType::DES_CBC_MD4.into(),
            EncryptedData::DesCbcMd5 { .. } => EncryptionType::DES_CBC_MD5.into(),
            EncryptedData::Opaque { etype, .. } => *etype,
        }
    }

    pub fn kvno(&self) -> Option<u32> {
        match self {
            EncryptedData::DesCbcCrc { kvno, .. }
            | EncryptedData::DesCbcMd4 { kvno, .. }
            | EncryptedData::DesCbcMd5 { kvno, .. }
            | EncryptedData::Opaque { kvno, .. } => *kvno,
        }
    }

    /// The profile of the ciphertext, or `UnsupportedEncryption` when it is
    /// not one of the single DES types.
    pub fn encryption_type(&self) -> Result<EncryptionType, KrbError> {
        match self {
            EncryptedData::DesCbcCrc { .. } => Ok(EncryptionType::DES_CBC_CRC),
            EncryptedData::DesCbcMd4 { .. } => Ok(EncryptionType::DES_CBC_MD4),
            EncryptedData::DesCbcMd5 { .. } => Ok(EncryptionType::DES_CBC_MD5),
            EncryptedData::Opaque { etype, .. } => {
                error!(?etype, "unsupported encryption type");
                Err(KrbError::UnsupportedEncryption)
            }
        }
    }

    fn decrypt_data(&self, key: &EncryptionKey) -> Result<Vec<u8>, KrbError> {
        let k = key.des_key()?;
        match self {
            EncryptedData::DesCbcCrc { data, .. } => decrypt_des_cbc_crc(&k, data),
            EncryptedData::DesCbcMd4 { data, .. } => decrypt_des_cbc_md4(&k, data),
            EncryptedData::DesCbcMd5 { data, .. } => decrypt_des_cbc_md5(&k, data),
            EncryptedData::Opaque { etype, .. } => {
                error!(?etype, "unsupported encryption type");
                Err(KrbError::UnsupportedEncryption)
            }
        }
    }

    pub(crate) fn decrypt_enc_kdc_rep(&self, key: &EncryptionKey) -> Result<KdcReplyPart, KrbError> {
        // The DES profiles carry no key usage, unlike the RFC 3962 types.
        let data = self.decrypt_data(key)?;

        let tagged_kdc_enc_part = TaggedEncKdcRepPart::from_der(der_element(&data)?)
            .map_err(|err| {
                error!(?err, "DerDecodeEncKdcRepPart");
                KrbError::DerDecodeEncKdcRepPart
            })?;

        // RFC states we should relax the tag check on these.
        KdcReplyPart::try_from(tagged_kdc_enc_part.into_inner())
    }
}

/// The leading DER element of `data`, dropping the zero padding a block
/// cipher leaves behind it.
pub(crate) fn der_element(data: &[u8]) -> Result<&[u8], KrbError> {
    let total = der_element_len(data).map_err(|err| {
        error!(?err, "DerDecodeEncKdcRepPart");
        KrbError::DerDecodeEncKdcRepPart
    })?;
    data.get(..total).ok_or_else(|| {
        error!(total, available = data.len(), "truncated encrypted part");
        KrbError::DerDecodeEncKdcRepPart
    })
}

impl From<&KdcLastReqItem> for LastRequestItem {
    fn from(last_req_item: &KdcLastReqItem) -> Self {
        let t: SystemTime = last_req_item.lr_value.to_system_time();
        // Negative types carry the same meaning, scoped to this principal.
        match last_req_item.lr_type.abs() {
            0 => LastRequestItem::None(t),
            1 => LastRequestItem::LastInitialTgt(t),
            2 => LastRequestItem::LastInitial(t),
            3 => LastRequestItem::TgtIssued(t),
            4 => LastRequestItem::LastRenewal(t),
            5 => LastRequestItem::LastRequest(t),
            6 => LastRequestItem::PasswordExpire(t),
            7 => LastRequestItem::AccountExpire(t),
            _ => LastRequestItem::Other(last_req_item.lr_type, t),
        }
    }
}

impl TryFrom<Asn1EncKdcRepPart> for KdcReplyPart {
    type Error = KrbError;

    fn try_from(enc_kdc_rep_part: Asn1EncKdcRepPart) -> Result<Self, Self::Error> {
        trace!(?enc_kdc_rep_part);

        let key = EncryptionKey::try_from(&enc_kdc_rep_part.key)?;
        let server = Name::try_from((
            &enc_kdc_rep_part.server_name,
            &enc_kdc_rep_part.server_realm,
        ))?;

        let last_req = enc_kdc_rep_part
            .last_req
            .iter()
            .map(LastRequestItem::from)
            .collect();

        Ok(KdcReplyPart {
            key,
            last_req,
            nonce: enc_kdc_rep_part.nonce,
            key_expiration: enc_kdc_rep_part.key_expiration.map(|t| t.to_system_time()),
            flags: enc_kdc_rep_part.flags,
            auth_time: enc_kdc_rep_part.auth_time.to_system_time(),
            start_time: enc_kdc_rep_part.start_time.map(|t| t.to_system_time()),
            end_time: enc_kdc_rep_part.end_time.to_system_time(),
            renew_until: enc_kdc_rep_part.renew_till.map(|t| t.to_system_time()),
            server,
        })
    }
}

impl KdcReplyPart {
    /// The session key shared with the ticket's service.
    pub fn session_key(&self) -> &EncryptionKey {
        &self.key
    }

    pub fn last_req(&self) -> &[LastRequestItem] {
        &self.last_req
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn key_expiration(&self) -> Option<SystemTime> {
        self.key_expiration
    }

    pub fn flags(&self) -> TicketFlags {
        self.flags
    }

    pub fn auth_time(&self) -> SystemTime {
        self.auth_time
    }

    /// When the ticket becomes valid. Absent means the same as the auth time.
    pub fn start_time(&self) -> SystemTime {
        self.start_time.unwrap_or(self.auth_time)
    }

    pub fn end_time(&self) -> SystemTime {
        self.end_time
    }

    pub fn renew_until(&self) -> Option<SystemTime> {
        self.renew_until
    }

    pub fn server(&self) -> &Name {
        &self.server
    }
}

#[cfg(test)]
mod tests {
    use super::{der_element, Name};
    use crate::asn1::constants::PrincipalNameType;
    use crate::asn1::principal_name::PrincipalName;
    use crate::asn1::realm::Realm;
    use crate::error::KrbError;
    use std::str::FromStr;

    #[test]
    fn name_parse_and_display() {
        let alice = Name::from_str("alice@EXAMPLE.COM").expect("Invalid name");
        assert_eq!(alice, Name::principal("alice", "EXAMPLE.COM"));
        assert_eq!(alice.to_string(), "alice@EXAMPLE.COM");
        assert_eq!(alice.default_salt(), "EXAMPLE.COMalice");

        let tgs = Name::from_str("krbtgt/EXAMPLE.COM@EXAMPLE.COM").expect("Invalid name");
        assert_eq!(tgs, Name::service_krbtgt("EXAMPLE.COM"));
        assert!(tgs.is_service_krbtgt("EXAMPLE.COM"));
        assert_eq!(tgs.to_string(), "krbtgt/EXAMPLE.COM@EXAMPLE.COM");

        for bad in ["alice", "alice@", "@EXAMPLE.COM", "host/@EXAMPLE.COM"] {
            assert!(matches!(Name::from_str(bad), Err(KrbError::NameInvalid)));
        }
    }

    #[test]
    fn name_principal_name_conversion() {
        let tgs = Name::service_krbtgt("EXAMPLE.COM");
        let (pn, realm): (PrincipalName, Realm) = (&tgs).try_into().expect("Failed to convert");
        assert_eq!(pn.name_type, i32::from(PrincipalNameType::NtSrvInst));
        assert_eq!(pn.joined(), "krbtgt/EXAMPLE.COM");
        assert_eq!(realm.as_str(), "EXAMPLE.COM");

        let back = Name::try_from((pn, realm)).expect("Failed to convert");
        assert_eq!(back, tgs);

        // MIT sends host services as NT-PRINCIPAL with two components.
        let host = PrincipalName::try_from((PrincipalNameType::NtPrincipal, "host/kdc.example.com"))
            .expect("Invalid name");
        let realm = Realm::from_str("EXAMPLE.COM").expect("Invalid realm");
        let name = Name::try_from((&host, &realm)).expect("Failed to convert");
        assert!(matches!(name, Name::SrvHst { .. }));
        assert!(matches!(
            name.principal_name(),
            Err(KrbError::NameNotPrincipal)
        ));
    }

    #[test]
    fn der_element_strips_padding() {
        let data = [0x30, 0x03, 0x02, 0x01, 0x05, 0x00, 0x00, 0x00];
        assert_eq!(der_element(&data).expect("Failed to frame"), &data[..5]);
        assert!(der_element(&data[..4]).is_err());
    }
}
