use super::kdc_req_body::KdcReqBody;
use super::krb_error::PaData;
use der::{Sequence, Tag, TagNumber, Writer};

/// ```text
/// KDC-REQ         ::= SEQUENCE {
///         -- NOTE: first tag is [1], not [0]
///         pvno            [1] INTEGER (5) ,
///         msg-type        [2] INTEGER (10 -- AS -- | 12 -- TGS --),
///         padata          [3] SEQUENCE OF PA-DATA OPTIONAL
///                             -- NOTE: not empty --,
///         req-body        [4] KDC-REQ-BODY
/// }
/// ```
#[derive(Debug, Eq, PartialEq, Sequence)]
pub(crate) struct KdcReq {
    #[asn1(context_specific = "1")]
    pub(crate) pvno: u8,
    #[asn1(context_specific = "2")]
    pub(crate) msg_type: u8,
    #[asn1(context_specific = "3", optional = "true")]
    pub(crate) padata: Option<Vec<PaData>>,
    #[asn1(context_specific = "4")]
    pub(crate) req_body: KdcReqBody,
}

/// ```text
/// AS-REQ          ::= [APPLICATION 10] KDC-REQ
/// ```
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum KrbKdcReq {
    AsReq(KdcReq),
}

const AS_REQ_TAG: Tag = Tag::Application {
    constructed: true,
    number: TagNumber(10),
};

impl<'a> ::der::Decode<'a> for KrbKdcReq {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        let tag: der::Tag = decoder.decode()?;
        let _len: der::Length = decoder.decode()?;

        match tag {
            Tag::Application {
                constructed: true,
                number: TagNumber(10),
            } => {
                let kdc_req: KdcReq = decoder.decode()?;
                Ok(KrbKdcReq::AsReq(kdc_req))
            }
            _ => Err(der::Error::from(der::ErrorKind::TagUnexpected {
                expected: Some(AS_REQ_TAG),
                actual: tag,
            })),
        }
    }
}

impl ::der::Encode for KrbKdcReq {
    fn encoded_len(&self) -> Result<der::Length, der::Error> {
        let KrbKdcReq::AsReq(asreq) = self;
        let tag_len = AS_REQ_TAG.encoded_len()?;
        let as_req_len = asreq.encoded_len()?;
        let as_req_len_len = as_req_len.encoded_len()?;

        tracing::trace!(?tag_len, ?as_req_len, ?as_req_len_len);

        tag_len + as_req_len + as_req_len_len
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        let KrbKdcReq::AsReq(asreq) = self;
        AS_REQ_TAG.encode(writer)?;
        asreq.encoded_len()?.encode(writer)?;
        asreq.encode(writer)
    }
}
