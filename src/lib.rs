// #![deny(warnings)]

#![warn(unused_extern_crates)]
// Enable some groups of clippy lints.
#![deny(clippy::suspicious)]
#![deny(clippy::perf)]
// Specific lints to enforce.
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::disallowed_types)]
#![deny(clippy::manual_let_else)]
#![allow(clippy::unreachable)]

mod asn1;
pub mod client;
pub mod config;
pub(crate) mod constants;
pub(crate) mod crypto;
pub mod error;
pub mod proto;

pub use crate::constants::{DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_IO_MAX_SIZE, DEFAULT_KDC_PORT};

use bytes::BytesMut;
use error::KrbError;
use proto::{KerberosReply, KerberosRequest};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{error, trace};

use crate::asn1::der_element_len;

/// Frames Kerberos messages carried over UDP. A reply may arrive split over
/// several datagrams; the decoder yields nothing until the outer DER length
/// says the element is complete.
pub struct KerberosUdpCodec {
    max_size: usize,
}

impl Default for KerberosUdpCodec {
    fn default() -> Self {
        KerberosUdpCodec {
            max_size: DEFAULT_IO_MAX_SIZE,
        }
    }
}

impl KerberosUdpCodec {
    pub fn new(max_size: usize) -> Self {
        KerberosUdpCodec { max_size }
    }
}

impl Decoder for KerberosUdpCodec {
    type Item = KerberosReply;
    type Error = KrbError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() > self.max_size {
            error!(len = buf.len(), max_size = self.max_size, "reply too large");
            return Err(KrbError::ReplyTooLarge);
        }

        if buf.is_empty() {
            return Ok(None);
        }

        let total = match der_element_len(buf) {
            Ok(total) => total,
            Err(err) if matches!(err.kind(), der::ErrorKind::Incomplete { .. }) => {
                trace!(len = buf.len(), "reply header incomplete");
                return Ok(None);
            }
            Err(err) => {
                error!(?err, "unable to frame reply");
                return Err(KrbError::DerDecodeKdcRep);
            }
        };

        if total > self.max_size {
            error!(total, max_size = self.max_size, "announced reply too large");
            return Err(KrbError::ReplyTooLarge);
        }

        if buf.len() < total {
            trace!(len = buf.len(), total, "waiting for more of the reply");
            return Ok(None);
        }

        if buf.len() > total {
            error!(len = buf.len(), total, "trailing data after reply");
            return Err(KrbError::ReplyTrailingData);
        }

        let frame = buf.split_to(total);
        KerberosReply::from_der(&frame).map(Some)
    }
}

impl Encoder<KerberosRequest> for KerberosUdpCodec {
    type Error = KrbError;

    fn encode(&mut self, msg: KerberosRequest, buf: &mut BytesMut) -> Result<(), KrbError> {
        let der_bytes = msg.to_der()?;

        if der_bytes.len() > constants::UDP_DATAGRAM_MAX {
            error!(len = der_bytes.len(), "request does not fit in a datagram");
            return Err(KrbError::DerEncodeKdcReq);
        }

        buf.clear();
        buf.extend_from_slice(&der_bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::KerberosUdpCodec;
    use crate::asn1::constants::KrbErrorCode;
    use crate::error::{ErrorKind, KrbError};
    use crate::proto::reply::fixtures::{as_rep_der, krb_error_der};
    use crate::proto::{EncryptionKey, KerberosReply, KerberosRequest, Name};
    use assert_hex::assert_eq_hex;
    use bytes::BytesMut;
    use std::time::SystemTime;
    use tokio_util::codec::{Decoder, Encoder};

    #[test]
    fn udp_codec_dispatch_krb_error() {
        let _ = tracing_subscriber::fmt::try_init();

        let alice = Name::principal("alice", "EXAMPLE.COM");
        let blob = krb_error_der(KrbErrorCode::KdcErrPreauthRequired.into(), &alice, None);

        let mut codec = KerberosUdpCodec::default();
        let mut buf = BytesMut::from(blob.as_slice());
        let reply = codec
            .decode(&mut buf)
            .expect("Failed to decode")
            .expect("Reply must be complete");

        let KerberosReply::ERR(err) = reply else {
            panic!("Expected a KRB-ERROR");
        };
        assert_eq!(err.code(), 25);
        assert_eq!(err.client_name(), Some(&alice));
        assert!(buf.is_empty());
    }

    #[test]
    fn udp_codec_unknown_tag() {
        let _ = tracing_subscriber::fmt::try_init();

        let mut codec = KerberosUdpCodec::default();
        let mut buf = BytesMut::from(&[0x6d, 0x02, 0x30, 0x00][..]);
        let reply = codec
            .decode(&mut buf)
            .expect("Failed to decode")
            .expect("Reply must be complete");
        assert!(matches!(reply, KerberosReply::Unknown(_)));

        // Not a DER element at all.
        let mut buf = BytesMut::from(&[0x6d, 0x85, 0xff, 0xff, 0xff, 0xff, 0xff][..]);
        let err = codec.decode(&mut buf).expect_err("Must fail");
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn udp_codec_truncated_reply_does_not_complete() {
        let _ = tracing_subscriber::fmt::try_init();

        let alice = Name::principal("alice", "EXAMPLE.COM");
        let key = EncryptionKey::from_password(&alice, "right").expect("Failed to derive");
        let blob = as_rep_der(&alice, &key, 7);

        let mut codec = KerberosUdpCodec::default();
        let mut buf = BytesMut::new();

        // Header split across the boundary, then the body in pieces.
        for chunk in [&blob[..1], &blob[1..3], &blob[3..100]] {
            buf.extend_from_slice(chunk);
            assert!(codec.decode(&mut buf).expect("Failed to decode").is_none());
        }

        buf.extend_from_slice(&blob[100..]);
        let reply = codec
            .decode(&mut buf)
            .expect("Failed to decode")
            .expect("Reply must be complete");
        assert!(matches!(reply, KerberosReply::AS(_)));
    }

    #[test]
    fn udp_codec_rejects_oversize_and_trailing() {
        let _ = tracing_subscriber::fmt::try_init();

        let alice = Name::principal("alice", "EXAMPLE.COM");
        let blob = krb_error_der(KrbErrorCode::KdcErrCPrincipalUnknown.into(), &alice, None);

        let mut codec = KerberosUdpCodec::new(blob.len() - 1);
        let mut buf = BytesMut::from(&blob[..4]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(KrbError::ReplyTooLarge)
        ));

        let mut codec = KerberosUdpCodec::default();
        let mut buf = BytesMut::from(blob.as_slice());
        buf.extend_from_slice(&[0x00]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(KrbError::ReplyTrailingData)
        ));
    }

    #[test]
    fn udp_codec_encode_request() {
        let _ = tracing_subscriber::fmt::try_init();

        let alice = Name::principal("alice", "EXAMPLE.COM");
        let req = KerberosRequest::build_as(
            &alice,
            Name::service_krbtgt("EXAMPLE.COM"),
            SystemTime::UNIX_EPOCH,
        )
        .build();
        let expected = req.to_der().expect("Failed to encode");

        let mut codec = KerberosUdpCodec::default();
        let mut buf = BytesMut::from(&b"stale"[..]);
        codec.encode(req, &mut buf).expect("Failed to encode");
        assert_eq_hex!(buf.as_ref(), expected.as_slice());
    }
}
