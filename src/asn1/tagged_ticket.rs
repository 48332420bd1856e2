use super::encrypted_data::EncryptedData;
use super::principal_name::PrincipalName;
use super::realm::Realm;
use der::{DecodeValue, EncodeValue, FixedTag, Sequence, Tag, TagNumber};

/// ```text
/// Ticket          ::= [APPLICATION 1] SEQUENCE {
///         tkt-vno         [0] INTEGER (5),
///         realm           [1] Realm,
///         sname           [2] PrincipalName,
///         enc-part        [3] EncryptedData -- EncTicketPart
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Sequence)]
pub(crate) struct Ticket {
    #[asn1(context_specific = "0")]
    pub(crate) tkt_vno: u8,
    #[asn1(context_specific = "1")]
    pub(crate) realm: Realm,
    #[asn1(context_specific = "2")]
    pub(crate) sname: PrincipalName,
    #[asn1(context_specific = "3")]
    pub(crate) enc_part: EncryptedData,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct TaggedTicket(pub(crate) Ticket);

impl TaggedTicket {
    pub(crate) fn new(realm: Realm, sname: PrincipalName, enc_part: EncryptedData) -> Self {
        Self(Ticket {
            tkt_vno: crate::constants::KRB_PVNO,
            realm,
            sname,
            enc_part,
        })
    }
}

impl FixedTag for TaggedTicket {
    const TAG: Tag = Tag::Application {
        constructed: true,
        number: TagNumber(1),
    };
}

impl<'a> DecodeValue<'a> for TaggedTicket {
    type Error = der::Error;

    fn decode_value<R: der::Reader<'a>>(reader: &mut R, _header: der::Header) -> der::Result<Self> {
        let t: Ticket = reader.decode()?;
        Ok(Self(t))
    }
}

impl EncodeValue for TaggedTicket {
    fn value_len(&self) -> der::Result<der::Length> {
        der::Encode::encoded_len(&self.0)
    }
    fn encode_value(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
        der::Encode::encode(&self.0, encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::TaggedTicket;
    use crate::asn1::constants::PrincipalNameType;
    use crate::asn1::encrypted_data::EncryptedData;
    use crate::asn1::principal_name::PrincipalName;
    use crate::asn1::realm::Realm;
    use der::asn1::OctetString;
    use der::{Decode, Encode};
    use std::str::FromStr;

    #[test]
    fn tagged_ticket_application_tag() {
        let ticket = TaggedTicket::new(
            Realm::from_str("EXAMPLE.COM").expect("Invalid realm"),
            PrincipalName::try_from((PrincipalNameType::NtSrvInst, "krbtgt/EXAMPLE.COM"))
                .expect("Invalid name"),
            EncryptedData {
                etype: 3,
                kvno: Some(2),
                cipher: OctetString::new(vec![0xAA; 16]).expect("Invalid cipher"),
            },
        );

        let bytes = ticket.to_der().expect("Failed to encode");
        // [APPLICATION 1] wrapping a SEQUENCE.
        assert_eq!(bytes[0], 0x61);
        assert_eq!(bytes[2], 0x30);

        let decoded = TaggedTicket::from_der(&bytes).expect("Failed to decode");
        assert_eq!(decoded.0.tkt_vno, 5);
        assert_eq!(decoded.0.sname.joined(), "krbtgt/EXAMPLE.COM");
        assert_eq!(decoded.0.enc_part.kvno, Some(2));
    }
}
