use crate::proto::ErrorReply;
use std::fmt;
use tracing::error;

#[derive(Debug)]
pub enum KrbError {
    // =========================================================================================
    // IMPORTANT: Don't add variables to variants in this  enum - it's a potential security risk
    // as you can leak internal state in an error as these can end up in userfacing contexts!!!
    //
    // In other words, any extra information you add here is a potential CVE.
    //
    // If you want to debug the error, then use the error! macro at the error raise site to
    // report relevant information.
    //
    // The only exception is KdcError, which hands the KDC's own KRB-ERROR back to the
    // caller. That content came off the wire, not out of our process.
    // =========================================================================================
    ConfigMissingRealmOrKdc,
    ConfigNotFound,
    ConfigIo,
    ConfigInvalidKdcAddress,
    ConfigMissingRealm,
    ConfigMissingKdc,
    ConfigInvalidOptions,
    RealmMismatch,

    IoError,
    KdcAddressUnresolved,

    Timeout,

    DerError,
    DerDecodeKdcRep,
    DerDecodeKrbError,
    DerDecodeTicket,
    DerDecodeEncKdcRepPart,
    DerDecodePaData,
    DerEncodeKdcReq,
    DerEncodeKdcReqBody,
    DerEncodeAny,
    DerEncodeKerberosString,
    DerEncodeKerberosTime,
    UnexpectedReplyTag,
    ReplyTooLarge,
    ReplyTrailingData,
    InvalidPvno,
    InvalidMessageType,
    NonceMismatch,

    NameNotPrincipal,
    NameNumberOfComponents,
    NameInvalid,
    PrincipalNameInvalidType,

    KdcError(ErrorReply),

    UnsupportedEncryption,
    MessageAuthenticationFailed,
    InvalidEncryptionKey,
    CiphertextInvalid,
    KeyDestroyed,
    InvalidPassphrase,

    /// No really, do you have a time machine? How did you go back to before 1970?
    DoYouHaveATimeMachine,
}

/// The broad class of a failure. Callers that only care about "what went wrong"
/// rather than the precise variant should match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No usable or a contradictory realm/KDC source.
    Configuration,
    /// Socket or address resolution failure.
    Network,
    /// The KDC did not answer within the exchange timeout.
    Timeout,
    /// Malformed bytes, an unknown outer tag, or a reply that does not match the request.
    Protocol,
    /// A well formed KRB-ERROR from the KDC.
    KerberosProtocol,
    /// Key derivation or decryption failed. Usually a wrong password.
    Crypto,
}

impl KrbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KrbError::ConfigMissingRealmOrKdc
            | KrbError::ConfigNotFound
            | KrbError::ConfigIo
            | KrbError::ConfigInvalidKdcAddress
            | KrbError::ConfigMissingRealm
            | KrbError::ConfigMissingKdc
            | KrbError::ConfigInvalidOptions
            | KrbError::RealmMismatch => ErrorKind::Configuration,

            KrbError::IoError | KrbError::KdcAddressUnresolved => ErrorKind::Network,

            KrbError::Timeout => ErrorKind::Timeout,

            KrbError::DerError
            | KrbError::DerDecodeKdcRep
            | KrbError::DerDecodeKrbError
            | KrbError::DerDecodeTicket
            | KrbError::DerDecodeEncKdcRepPart
            | KrbError::DerDecodePaData
            | KrbError::DerEncodeKdcReq
            | KrbError::DerEncodeKdcReqBody
            | KrbError::DerEncodeAny
            | KrbError::DerEncodeKerberosString
            | KrbError::DerEncodeKerberosTime
            | KrbError::UnexpectedReplyTag
            | KrbError::ReplyTooLarge
            | KrbError::ReplyTrailingData
            | KrbError::InvalidPvno
            | KrbError::InvalidMessageType
            | KrbError::NonceMismatch
            | KrbError::NameNotPrincipal
            | KrbError::NameNumberOfComponents
            | KrbError::NameInvalid
            | KrbError::PrincipalNameInvalidType
            | KrbError::DoYouHaveATimeMachine => ErrorKind::Protocol,

            KrbError::KdcError(_) => ErrorKind::KerberosProtocol,

            KrbError::UnsupportedEncryption
            | KrbError::MessageAuthenticationFailed
            | KrbError::InvalidEncryptionKey
            | KrbError::CiphertextInvalid
            | KrbError::KeyDestroyed
            | KrbError::InvalidPassphrase => ErrorKind::Crypto,
        }
    }

    /// The KDC's numeric error code, if this error is a KRB-ERROR reply.
    pub fn kdc_error_code(&self) -> Option<i32> {
        match self {
            KrbError::KdcError(reply) => Some(reply.code()),
            _ => None,
        }
    }
}

impl fmt::Display for KrbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KrbError::KdcError(reply) => {
                write!(f, "KDC returned error code {}", reply.code())?;
                if let Some(text) = reply.text() {
                    write!(f, ": {text}")?;
                }
                Ok(())
            }
            other => write!(f, "{:?} ({:?})", other, other.kind()),
        }
    }
}

impl std::error::Error for KrbError {}

impl From<der::Error> for KrbError {
    fn from(err: der::Error) -> Self {
        error!(?err, "der");
        KrbError::DerError
    }
}

impl From<std::io::Error> for KrbError {
    fn from(err: std::io::Error) -> Self {
        error!(?err, "io");
        KrbError::IoError
    }
}
