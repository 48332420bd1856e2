use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Pre-authentication data types a KDC may list in the METHOD-DATA of a
/// KDC_ERR_PREAUTH_REQUIRED reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum PaDataType {
    PaTgsReq = 1,
    PaEncTimestamp = 2,
    PaPwSalt = 3,
    PaEtypeInfo = 11,
    PaPkAsReqOld = 14,      // (pkinit)
    PaPkAsRepOld = 15,      // (pkinit)
    PaPkAsReq = 16,         // (pkinit)
    PaPkAsRep = 17,         // (pkinit)
    PaEtypeInfo2 = 19,      // (replaces pa-etype-info)
    PaPacRequest = 128,     // Include Windows PAC
    PaFxCookie = 133,       // RFC6113 FAST Cookie
    PaFxFast = 136,         // RFC6113 FAST
    EncpadataReqEncPaRep = 149, // RFC 6806
    PadataAsFreshness = 150,    // RFC 8070
}
