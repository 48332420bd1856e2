pub(crate) mod constants;
pub(crate) mod encrypted_data;
pub(crate) mod kdc_req_body;
pub(crate) mod kerberos_flags;
pub(crate) mod kerberos_string;
pub(crate) mod kerberos_time;
pub(crate) mod krb_error;
pub(crate) mod krb_kdc_rep;
pub(crate) mod krb_kdc_req;
pub(crate) mod microseconds;
pub(crate) mod principal_name;
pub(crate) mod realm;
pub(crate) mod tagged_enc_kdc_rep_part;
pub(crate) mod tagged_ticket;
pub(crate) mod ticket_flags;

pub use der::asn1::{Ia5String, OctetString};
pub use der::DateTime;

use der::Reader;

/// Size of the complete DER element at the start of `buf`, read from its
/// tag and length octets alone.
pub(crate) fn der_element_len(buf: &[u8]) -> der::Result<usize> {
    let mut reader = der::SliceReader::new(buf)?;
    let _tag: der::Tag = reader.decode()?;
    let len: der::Length = reader.decode()?;
    usize::try_from((reader.position() + len)?)
}
