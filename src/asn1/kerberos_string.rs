use crate::error::KrbError;
use der::asn1::{Ia5String, OctetString};
use der::DecodeValue;
use der::EncodeValue;
use der::FixedTag;
use der::Tag;
use std::fmt;
use std::str::FromStr;
use tracing::error;

/// ```text
/// KerberosString  ::= GeneralString (IA5String)
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct KerberosString(pub(crate) Ia5String);

impl FixedTag for KerberosString {
    const TAG: Tag = Tag::GeneralString;
}

impl<'a> DecodeValue<'a> for KerberosString {
    type Error = der::Error;

    fn decode_value<R: der::Reader<'a>>(reader: &mut R, header: der::Header) -> der::Result<Self> {
        Ia5String::decode_value(reader, header).map(Self)
    }
}

impl EncodeValue for KerberosString {
    fn value_len(&self) -> der::Result<der::Length> {
        Ia5String::value_len(&self.0)
    }
    fn encode_value(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
        Ia5String::encode_value(&self.0, encoder)
    }
}

impl fmt::Display for KerberosString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for KerberosString {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl KerberosString {
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }
}

impl FromStr for KerberosString {
    type Err = KrbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ia5String::new(s).map(KerberosString).map_err(|err| {
            error!(?err, "unable to represent string as GeneralString");
            KrbError::DerEncodeKerberosString
        })
    }
}

/// Free text such as a KRB-ERROR e-text. Tagged as a GeneralString like
/// [`KerberosString`], but the octets are kept as sent. Heimdal and AD put
/// UTF-8 here, so it is read as UTF-8 with replacement rather than IA5.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct KerberosText(pub(crate) Vec<u8>);

impl FixedTag for KerberosText {
    const TAG: Tag = Tag::GeneralString;
}

impl<'a> DecodeValue<'a> for KerberosText {
    type Error = der::Error;

    fn decode_value<R: der::Reader<'a>>(reader: &mut R, header: der::Header) -> der::Result<Self> {
        OctetString::decode_value(reader, header).map(|octets| Self(octets.into_bytes().into_vec()))
    }
}

impl EncodeValue for KerberosText {
    fn value_len(&self) -> der::Result<der::Length> {
        der::Length::try_from(self.0.len())
    }
    fn encode_value(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
        encoder.write(&self.0)
    }
}

impl fmt::Display for KerberosText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for KerberosText {
    fn from(s: &str) -> Self {
        KerberosText(s.as_bytes().to_vec())
    }
}
