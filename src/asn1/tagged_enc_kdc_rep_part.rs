use super::encrypted_data::EncryptionKey;
use super::kdc_req_body::HostAddresses;
use super::kerberos_time::KerberosTime;
use super::principal_name::PrincipalName;
use super::realm::Realm;
use super::ticket_flags::TicketFlags;
use der::{Sequence, Tag, TagNumber, Writer};

/// ```text
/// LastReq         ::=     SEQUENCE OF SEQUENCE {
///         lr-type         [0] Int32,
///         lr-value        [1] KerberosTime
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Sequence)]
pub(crate) struct LastReqItem {
    #[asn1(context_specific = "0")]
    pub(crate) lr_type: i32,
    #[asn1(context_specific = "1")]
    pub(crate) lr_value: KerberosTime,
}

pub(crate) type LastReq = Vec<LastReqItem>;

/// ```text
/// EncKDCRepPart   ::= SEQUENCE {
///         key             [0] EncryptionKey,
///         last-req        [1] LastReq,
///         nonce           [2] UInt32,
///         key-expiration  [3] KerberosTime OPTIONAL,
///         flags           [4] TicketFlags,
///         authtime        [5] KerberosTime,
///         starttime       [6] KerberosTime OPTIONAL,
///         endtime         [7] KerberosTime,
///         renew-till      [8] KerberosTime OPTIONAL,
///         srealm          [9] Realm,
///         sname           [10] PrincipalName,
///         caddr           [11] HostAddresses OPTIONAL
/// }
/// ```
#[derive(Debug, Eq, PartialEq, Sequence)]
pub(crate) struct EncKdcRepPart {
    #[asn1(context_specific = "0")]
    pub(crate) key: EncryptionKey,
    #[asn1(context_specific = "1")]
    pub(crate) last_req: LastReq,
    #[asn1(context_specific = "2")]
    pub(crate) nonce: u32,
    #[asn1(context_specific = "3", optional = "true")]
    pub(crate) key_expiration: Option<KerberosTime>,
    #[asn1(context_specific = "4")]
    pub(crate) flags: TicketFlags,
    #[asn1(context_specific = "5")]
    pub(crate) auth_time: KerberosTime,
    #[asn1(context_specific = "6", optional = "true")]
    pub(crate) start_time: Option<KerberosTime>,
    #[asn1(context_specific = "7")]
    pub(crate) end_time: KerberosTime,
    #[asn1(context_specific = "8", optional = "true")]
    pub(crate) renew_till: Option<KerberosTime>,
    #[asn1(context_specific = "9")]
    pub(crate) server_realm: Realm,
    #[asn1(context_specific = "10")]
    pub(crate) server_name: PrincipalName,
    #[asn1(context_specific = "11", optional = "true")]
    pub(crate) client_addresses: Option<HostAddresses>,
}

/// ```text
///  EncASRepPart    ::= [APPLICATION 25] EncKDCRepPart
///  EncTGSRepPart   ::= [APPLICATION 26] EncKDCRepPart
/// ```
///
/// Some KDCs wrap the AS reply part in the TGS tag, so both are accepted.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum TaggedEncKdcRepPart {
    EncAsRepPart(EncKdcRepPart),
    EncTgsRepPart(EncKdcRepPart),
}

impl TaggedEncKdcRepPart {
    fn tag(&self) -> Tag {
        let number = match self {
            TaggedEncKdcRepPart::EncAsRepPart(_) => TagNumber(25),
            TaggedEncKdcRepPart::EncTgsRepPart(_) => TagNumber(26),
        };
        Tag::Application {
            constructed: true,
            number,
        }
    }

    fn inner(&self) -> &EncKdcRepPart {
        match self {
            TaggedEncKdcRepPart::EncAsRepPart(part) | TaggedEncKdcRepPart::EncTgsRepPart(part) => {
                part
            }
        }
    }

    pub(crate) fn into_inner(self) -> EncKdcRepPart {
        match self {
            TaggedEncKdcRepPart::EncAsRepPart(part) | TaggedEncKdcRepPart::EncTgsRepPart(part) => {
                part
            }
        }
    }
}

impl<'a> ::der::Decode<'a> for TaggedEncKdcRepPart {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        let tag: der::Tag = decoder.decode()?;
        let _len: der::Length = decoder.decode()?;

        match tag {
            Tag::Application {
                constructed: true,
                number: TagNumber(25),
            } => {
                let enc_kdc_rep_part: EncKdcRepPart = decoder.decode()?;
                Ok(TaggedEncKdcRepPart::EncAsRepPart(enc_kdc_rep_part))
            }
            Tag::Application {
                constructed: true,
                number: TagNumber(26),
            } => {
                let enc_kdc_rep_part: EncKdcRepPart = decoder.decode()?;
                Ok(TaggedEncKdcRepPart::EncTgsRepPart(enc_kdc_rep_part))
            }
            _ => Err(der::Error::from(der::ErrorKind::TagUnexpected {
                expected: None,
                actual: tag,
            })),
        }
    }
}

impl ::der::Encode for TaggedEncKdcRepPart {
    fn encoded_len(&self) -> Result<der::Length, der::Error> {
        let inner_len = self.inner().encoded_len()?;
        self.tag().encoded_len()? + inner_len.encoded_len()? + inner_len
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.tag().encode(writer)?;
        self.inner().encoded_len()?.encode(writer)?;
        self.inner().encode(writer)
    }
}
