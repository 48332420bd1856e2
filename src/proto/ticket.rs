use super::{EncryptedData, Name};
use crate::asn1::tagged_ticket::TaggedTicket;
use crate::constants::KRB_PVNO;
use crate::error::KrbError;
use der::Decode;
use tracing::error;

/// A ticket issued by the KDC. The client cannot decrypt the ticket, so it
/// holds on to the exact bytes it was given alongside the parsed view. Those
/// bytes are what gets presented back to a service.
#[derive(Debug, Clone)]
pub struct Ticket {
    tkt_vno: u8,
    service: Name,
    enc_part: EncryptedData,
    encoded: Vec<u8>,
}

impl Ticket {
    /// Parse a DER encoded `[APPLICATION 1]` ticket. Trailing bytes are
    /// rejected.
    pub fn from_der(encoded: &[u8]) -> Result<Self, KrbError> {
        let TaggedTicket(ticket) = TaggedTicket::from_der(encoded).map_err(|err| {
            error!(?err, "DerDecodeTicket");
            KrbError::DerDecodeTicket
        })?;

        if ticket.tkt_vno != KRB_PVNO {
            error!(tkt_vno = ticket.tkt_vno, "unsupported ticket version");
            return Err(KrbError::InvalidPvno);
        }

        let service = Name::try_from((&ticket.sname, &ticket.realm))?;

        Ok(Ticket {
            tkt_vno: ticket.tkt_vno,
            service,
            enc_part: EncryptedData::from(ticket.enc_part),
            encoded: encoded.to_vec(),
        })
    }

    /// The ticket exactly as the KDC sent it.
    pub fn as_der(&self) -> &[u8] {
        &self.encoded
    }

    pub fn tkt_vno(&self) -> u8 {
        self.tkt_vno
    }

    pub fn service(&self) -> &Name {
        &self.service
    }

    pub fn realm(&self) -> &str {
        self.service.realm()
    }

    pub fn enc_part(&self) -> &EncryptedData {
        &self.enc_part
    }
}

impl PartialEq for Ticket {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Ticket {}
