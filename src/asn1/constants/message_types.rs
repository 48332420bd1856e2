use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum KrbMessageType {
    KrbAsReq = 10,  // Request for initial authentication
    KrbAsRep = 11,  // Response to KrbAsReq request
    KrbTgsReq = 12, // Request for authentication based on Tgt
    KrbTgsRep = 13, // Response to KrbTgsReq request
    KrbApReq = 14,  // Application request to server
    KrbApRep = 15,  // Response to KrbApReqMutual
    KrbError = 30,  // Error response
}
