use super::encrypted_data::EncryptedData;
use super::krb_error::{KrbError, PaData};
use super::principal_name::PrincipalName;
use super::realm::Realm;
use der::asn1::Any;
use der::{Sequence, Tag, TagNumber, Writer};

/// ```text
///   KDC-REP         ::= SEQUENCE {
///           pvno            [0] INTEGER (5),
///           msg-type        [1] INTEGER (11 -- AS -- | 13 -- TGS --),
///           padata          [2] SEQUENCE OF PA-DATA OPTIONAL
///                                   -- NOTE: not empty --,
///           crealm          [3] Realm,
///           cname           [4] PrincipalName,
///           ticket          [5] Ticket,
///           enc-part        [6] EncryptedData
///                                   -- EncASRepPart or EncTGSRepPart,
///                                   -- as appropriate
///   }
/// ```
#[derive(Debug, Eq, PartialEq, Sequence)]
pub(crate) struct KdcRep {
    #[asn1(context_specific = "0")]
    pub(crate) pvno: u8,
    #[asn1(context_specific = "1")]
    pub(crate) msg_type: u8,
    #[asn1(context_specific = "2", optional = "true")]
    pub(crate) padata: Option<Vec<PaData>>,
    #[asn1(context_specific = "3")]
    pub(crate) crealm: Realm,
    #[asn1(context_specific = "4")]
    pub(crate) cname: PrincipalName,
    // Held as Any so the ticket can be handed on exactly as the KDC sent it.
    #[asn1(context_specific = "5")]
    pub(crate) ticket: Any,
    #[asn1(context_specific = "6")]
    pub(crate) enc_part: EncryptedData,
}

/// ```text
/// AS-REP          ::= [APPLICATION 11] KDC-REP
/// KRB-ERROR       ::= [APPLICATION 30] SEQUENCE { ... }
/// ```
#[derive(Debug, Eq, PartialEq)]
#[allow(clippy::enum_variant_names)]
pub(crate) enum KrbKdcRep {
    AsRep(KdcRep),
    ErrRep(KrbError),
}

const AS_REP_TAG: Tag = Tag::Application {
    constructed: true,
    number: TagNumber(11),
};

const KRB_ERROR_TAG: Tag = Tag::Application {
    constructed: true,
    number: TagNumber(30),
};

impl<'a> ::der::Decode<'a> for KrbKdcRep {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        let tag: der::Tag = decoder.decode()?;
        let _len: der::Length = decoder.decode()?;

        match tag {
            Tag::Application {
                constructed: true,
                number: TagNumber(11),
            } => {
                let kdc_rep: KdcRep = decoder.decode()?;
                Ok(KrbKdcRep::AsRep(kdc_rep))
            }
            Tag::Application {
                constructed: true,
                number: TagNumber(30),
            } => {
                let err_rep: KrbError = decoder.decode()?;
                Ok(KrbKdcRep::ErrRep(err_rep))
            }
            _ => Err(der::Error::from(der::ErrorKind::TagUnexpected {
                expected: None,
                actual: tag,
            })),
        }
    }
}

impl ::der::Encode for KrbKdcRep {
    fn encoded_len(&self) -> Result<der::Length, der::Error> {
        let (tag, inner_len) = match self {
            KrbKdcRep::AsRep(asrep) => (AS_REP_TAG, asrep.encoded_len()?),
            KrbKdcRep::ErrRep(err_rep) => (KRB_ERROR_TAG, err_rep.encoded_len()?),
        };
        tag.encoded_len()? + inner_len.encoded_len()? + inner_len
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            KrbKdcRep::AsRep(asrep) => {
                AS_REP_TAG.encode(writer)?;
                asrep.encoded_len()?.encode(writer)?;
                asrep.encode(writer)
            }
            KrbKdcRep::ErrRep(err_rep) => {
                KRB_ERROR_TAG.encode(writer)?;
                err_rep.encoded_len()?.encode(writer)?;
                err_rep.encode(writer)
            }
        }
    }
}
