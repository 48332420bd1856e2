mod error_rep;
#[cfg(test)]
pub(crate) mod fixtures;

pub use self::error_rep::ErrorReply;

use crate::asn1::{
    constants::KrbMessageType,
    krb_kdc_rep::{KdcRep, KrbKdcRep},
};
use crate::constants::KRB_PVNO;
use crate::error::KrbError;
use der::{Decode, Encode, Reader, SliceReader, Tag, TagNumber};
use tracing::{error, trace, warn};

use super::{EncryptedData, EncryptionKey, KdcReplyPart, Name, Ticket};

/// A reply from the KDC, classified by its outer application tag.
#[derive(Debug)]
pub enum KerberosReply {
    AS(AuthenticationReply),
    ERR(ErrorReply),
    /// A well framed element this client does not handle, such as a TGS-REP.
    Unknown(Tag),
}

/// An AS-REP. The encrypted part is only opened by [`AuthenticationReply::decrypt`].
#[derive(Debug, Clone)]
pub struct AuthenticationReply {
    name: Name,
    ticket: Ticket,
    enc_part: EncryptedData,
    pa_data_present: bool,
}

impl KerberosReply {
    pub fn from_der(data: &[u8]) -> Result<Self, KrbError> {
        let tag: Tag = SliceReader::new(data)
            .and_then(|mut reader| reader.decode())
            .map_err(|err| {
                error!(?err, "unable to read the reply tag");
                KrbError::DerDecodeKdcRep
            })?;

        match tag {
            Tag::Application {
                constructed: true,
                number: TagNumber(11),
            } => {
                let rep = KrbKdcRep::from_der(data).map_err(|err| {
                    error!(?err, "DerDecodeKdcRep");
                    KrbError::DerDecodeKdcRep
                })?;
                KerberosReply::try_from(rep)
            }
            Tag::Application {
                constructed: true,
                number: TagNumber(30),
            } => {
                let rep = KrbKdcRep::from_der(data).map_err(|err| {
                    error!(?err, "DerDecodeKrbError");
                    KrbError::DerDecodeKrbError
                })?;
                KerberosReply::try_from(rep)
            }
            tag => {
                warn!(?tag, "unexpected reply tag");
                Ok(KerberosReply::Unknown(tag))
            }
        }
    }
}

impl TryFrom<KrbKdcRep> for KerberosReply {
    type Error = KrbError;

    fn try_from(rep: KrbKdcRep) -> Result<Self, KrbError> {
        match rep {
            KrbKdcRep::AsRep(kdc_rep) => AuthenticationReply::try_from(kdc_rep).map(KerberosReply::AS),
            KrbKdcRep::ErrRep(err_rep) => ErrorReply::try_from(err_rep).map(KerberosReply::ERR),
        }
    }
}

impl TryFrom<KdcRep> for AuthenticationReply {
    type Error = KrbError;

    fn try_from(rep: KdcRep) -> Result<Self, KrbError> {
        if rep.pvno != KRB_PVNO {
            error!(pvno = rep.pvno, "unsupported protocol version");
            return Err(KrbError::InvalidPvno);
        }

        match KrbMessageType::try_from(rep.msg_type) {
            Ok(KrbMessageType::KrbAsRep) => {}
            _ => {
                error!(msg_type = rep.msg_type, "not an AS-REP");
                return Err(KrbError::InvalidMessageType);
            }
        }

        let enc_part = EncryptedData::from(rep.enc_part);
        trace!(?enc_part);

        let name = Name::try_from((&rep.cname, &rep.crealm))?;

        // Any re-emits the element with its original content octets.
        let ticket_bytes = rep.ticket.to_der().map_err(|err| {
            error!(?err, "DerDecodeTicket");
            KrbError::DerDecodeTicket
        })?;
        let ticket = Ticket::from_der(&ticket_bytes)?;

        Ok(AuthenticationReply {
            name,
            ticket,
            enc_part,
            pa_data_present: rep.padata.is_some_and(|padata| !padata.is_empty()),
        })
    }
}

impl AuthenticationReply {
    /// Open the encrypted part with the client's long term key. A wrong key
    /// fails the integrity check with [`KrbError::MessageAuthenticationFailed`].
    pub fn decrypt(&self, key: &EncryptionKey) -> Result<KdcReplyPart, KrbError> {
        self.enc_part.decrypt_enc_kdc_rep(key)
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn enc_part(&self) -> &EncryptedData {
        &self.enc_part
    }

    pub fn pa_data_present(&self) -> bool {
        self.pa_data_present
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{as_rep_der, krb_error_der};
    use super::KerberosReply;
    use crate::asn1::constants::{EncryptionType, KrbErrorCode};
    use crate::error::KrbError;
    use crate::proto::{EncryptedData, EncryptionKey, Name, TicketFlags};
    use der::{Tag, TagNumber};

    const AS_REP_TESTUSER: &str = "6b8203513082034da003020105a10302010ba22d302b3029a103020113a2220420301e301ca003020112a1151b134558414d504c452e434f4d7465737475736572a30d1b0b4558414d504c452e434f4da4153013a003020101a10c300a1b087465737475736572a58201ba618201b6308201b2a003020105a10d1b0b4558414d504c452e434f4da220301ea003020102a11730151b066b72627467741b0b4558414d504c452e434f4da382017830820174a003020112a103020101a282016604820162eac20712018638db059fc4580cb6aad87fbc722c85219b83574df7a6cee9ee5f6d83569c8ddfcd0695bd9ec215540200f905ec11f91353d6724be7fbfe9444606d39b4d85e4ae084a72a14a0f652a922da109e652b68dae1a519d2c2087b07c7d8f738738fe2276ead3c31d83bd3f8cbcc6c6ca8b5133a1cca5f09bfb45489fca80cecfc754d13f93418dc6385475400795d7f06f8ae9a146e21eeccd10f2efaa0bf1d3acde3f8d1c71cb7a555eedb1ce333a32941141c8ed7552a31df706d11be06b21c02178d2ac8bbed10964ff67b0b06e7f56f1c2422be26ac862521bf1be90b3977975a3346f2d2404342bf53b9c45d83a56c45fef0a7386ed82ffc0c4b23e10e9cb51ab18076d8fe9fc3d66d0ad9cd44764f2af929a181fe008d99de0acc44d689874ad433f1b04d129c2bb65f3070aa7c0343d9b07a44c9d031f950119f90744ff0085b0f4c08b29b281d376525736f9dd292eec03c16d2f5a681eb24bb56a682012c30820128a003020112a282011f0482011b602fe69bf3c949b575e0303ebec6975c3921b38a7479c16e68fd18d18972e670296ce1f6d005df8f423f44f9f8efcaafc8a148a141f706ddd24a2ded22f85b85c41ffe6168ba887a85f3b514e4f670818bf0f402c245cd167ef5136a72edd19e0536d0ea1863e27a227dd7207aa0d1c3d13526936636574f604bb57492feb534c1d8b15610bcce035a4de2d259103f9e63968f8b4e3f8b1e7120ef31bd390344bfabacf657ff062c8a50f12ffdf045df03d98bbc5f324b7a7eb48e4e656ceb5ee1325a394de51bb7617d6db4cda242c0aba97612dcf23816e08ca41bea80f4b2dc144422ed832c2395b61fdd9437f08fd2a3a1dd2475d61d61a102d1a38292afaded12f26318a6550328f60addb0542ac8e287d7a1c96f3593ca04";

    #[test]
    fn reply_classify_as_rep() {
        let _ = tracing_subscriber::fmt::try_init();

        let blob = hex::decode(AS_REP_TESTUSER).expect("Failed to decode sample");
        let KerberosReply::AS(asrep) = KerberosReply::from_der(&blob).expect("Failed to decode")
        else {
            panic!("Expected an AS-REP");
        };

        assert_eq!(asrep.name(), &Name::principal("testuser", "EXAMPLE.COM"));
        assert!(asrep.pa_data_present());
        assert_eq!(asrep.ticket().as_der(), &blob[107..549]);
        assert_eq!(asrep.ticket().service(), &Name::service_krbtgt("EXAMPLE.COM"));

        // An aes256 reply is decoded but cannot be opened.
        assert!(matches!(asrep.enc_part(), EncryptedData::Opaque { etype: 18, .. }));
        let key = EncryptionKey::from_password(asrep.name(), "password").expect("Failed to derive");
        assert!(matches!(
            asrep.decrypt(&key),
            Err(KrbError::UnsupportedEncryption)
        ));
    }

    #[test]
    fn reply_classify_unknown_tag() {
        let _ = tracing_subscriber::fmt::try_init();

        // A TGS-REP tag with an empty body.
        let reply = KerberosReply::from_der(&[0x6d, 0x00]).expect("Failed to classify");
        let KerberosReply::Unknown(tag) = reply else {
            panic!("Expected an unknown tag");
        };
        assert_eq!(
            tag,
            Tag::Application {
                constructed: true,
                number: TagNumber(13),
            }
        );

        assert!(matches!(
            KerberosReply::from_der(&[]),
            Err(KrbError::DerDecodeKdcRep)
        ));
    }

    #[test]
    fn reply_truncated_krb_error() {
        let _ = tracing_subscriber::fmt::try_init();

        let service = Name::service_krbtgt("EXAMPLE.COM");
        let blob = krb_error_der(KrbErrorCode::KdcErrPreauthRequired.into(), &service, None);
        assert!(matches!(
            KerberosReply::from_der(&blob[..blob.len() - 3]),
            Err(KrbError::DerDecodeKrbError)
        ));
    }

    #[test]
    fn reply_decrypt_des_cbc_md5() {
        let _ = tracing_subscriber::fmt::try_init();

        let alice = Name::principal("alice", "EXAMPLE.COM");
        let right = EncryptionKey::from_password(&alice, "right").expect("Failed to derive");
        let wrong = EncryptionKey::from_password(&alice, "wrong").expect("Failed to derive");

        let blob = as_rep_der(&alice, &right, 0x1234_5678);
        let KerberosReply::AS(asrep) = KerberosReply::from_der(&blob).expect("Failed to decode")
        else {
            panic!("Expected an AS-REP");
        };
        assert!(!asrep.pa_data_present());
        assert_eq!(
            asrep.enc_part().encryption_type().expect("Unsupported etype"),
            EncryptionType::DES_CBC_MD5
        );

        let part = asrep.decrypt(&right).expect("Failed to decrypt");
        assert_eq!(part.nonce(), 0x1234_5678);
        assert_eq!(part.server(), &Name::service_krbtgt("EXAMPLE.COM"));
        assert!(part.flags().contains(TicketFlags::Initial));
        assert_eq!(part.start_time(), part.auth_time());
        assert!(part.end_time() > part.auth_time());
        assert_eq!(
            part.session_key().etype().expect("Key destroyed"),
            EncryptionType::DES_CBC_MD5
        );
        assert_eq!(part.last_req().len(), 1);

        assert!(matches!(
            asrep.decrypt(&wrong),
            Err(KrbError::MessageAuthenticationFailed)
        ));
    }
}
