use crate::asn1::{
    constants::{KrbErrorCode, KrbMessageType},
    kerberos_time::KerberosTime,
    krb_error::{KrbError as KdcKrbError, MethodData},
    microseconds::Microseconds,
};
use crate::constants::KRB_PVNO;
use crate::error::KrbError;
use der::Decode;
use std::time::{Duration, SystemTime};
use tracing::{error, trace};

use super::super::Name;

/// A KRB-ERROR from the KDC. Every optional field is decoded up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    code: i32,
    service: Name,
    server_time: SystemTime,
    client_time: Option<SystemTime>,
    client_realm: Option<String>,
    client_name: Option<Name>,
    error_text: Option<String>,
    error_data: Option<Vec<u8>>,
}

fn kerberos_time_with_usec(t: &KerberosTime, usec: Option<Microseconds>) -> SystemTime {
    let usec = usec.unwrap_or_default();
    t.to_system_time() + Duration::from_micros(u64::from(usec))
}

impl ErrorReply {
    /// The error code exactly as the KDC sent it.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The code as a known RFC 4120 value, if it is one.
    pub fn error_code(&self) -> Option<KrbErrorCode> {
        KrbErrorCode::try_from(self.code).ok()
    }

    pub fn service(&self) -> &Name {
        &self.service
    }

    pub fn server_time(&self) -> SystemTime {
        self.server_time
    }

    pub fn client_time(&self) -> Option<SystemTime> {
        self.client_time
    }

    pub fn client_realm(&self) -> Option<&str> {
        self.client_realm.as_deref()
    }

    pub fn client_name(&self) -> Option<&Name> {
        self.client_name.as_ref()
    }

    pub fn text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    pub fn error_data(&self) -> Option<&[u8]> {
        self.error_data.as_deref()
    }

    /// The pre-authentication types the KDC offers, from the METHOD-DATA
    /// carried in e-data. Empty when there is no e-data.
    pub fn preauth_methods(&self) -> Result<Vec<u32>, KrbError> {
        let Some(edata) = self.error_data.as_deref() else {
            return Ok(Vec::new());
        };

        let methods = MethodData::from_der(edata).map_err(|err| {
            error!(?err, "DerDecodePaData");
            KrbError::DerDecodePaData
        })?;

        Ok(methods.iter().map(|pa| pa.padata_type).collect())
    }
}

impl TryFrom<KdcKrbError> for ErrorReply {
    type Error = KrbError;

    fn try_from(rep: KdcKrbError) -> Result<Self, KrbError> {
        trace!(?rep);

        if rep.pvno != KRB_PVNO {
            error!(pvno = rep.pvno, "unsupported protocol version");
            return Err(KrbError::InvalidPvno);
        }

        match KrbMessageType::try_from(rep.msg_type) {
            Ok(KrbMessageType::KrbError) => {}
            _ => {
                error!(msg_type = rep.msg_type, "not a KRB-ERROR");
                return Err(KrbError::InvalidMessageType);
            }
        }

        // The code must reach the caller whatever shape the names are in.
        let service = Name::from_wire_lenient(&rep.service_name, &rep.service_realm);

        // A cname without a crealm belongs to the service realm.
        let client_name = rep.cname.as_ref().map(|cname| {
            let realm = rep.crealm.as_ref().unwrap_or(&rep.service_realm);
            Name::from_wire_lenient(cname, realm)
        });

        Ok(ErrorReply {
            code: rep.error_code,
            service,
            server_time: kerberos_time_with_usec(&rep.stime, Some(rep.susec)),
            client_time: rep
                .ctime
                .as_ref()
                .map(|ctime| kerberos_time_with_usec(ctime, rep.cusec)),
            client_realm: rep.crealm.as_ref().map(|r| r.to_string()),
            client_name,
            error_text: rep.error_text.as_ref().map(|t| t.to_string()),
            error_data: rep.error_data.map(|d| d.into_bytes().into_vec()),
        })
    }
}
