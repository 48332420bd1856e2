//! Registered numbers from RFC 4120 and RFC 3961 that appear on the wire.

pub(crate) mod encryption_types;
pub(crate) mod errors;
pub(crate) mod message_types;
pub(crate) mod pa_data_types;
pub(crate) mod princ_name_types;

pub use self::encryption_types::EncryptionType;
pub use self::errors::KrbErrorCode;
pub use self::message_types::KrbMessageType;
pub use self::pa_data_types::PaDataType;
pub use self::princ_name_types::PrincipalNameType;
