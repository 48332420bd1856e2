use crate::asn1::{
    constants::{EncryptionType, KrbMessageType, PrincipalNameType},
    kdc_req_body::KdcReqBody,
    kerberos_flags::KerberosFlags,
    kerberos_time::KerberosTime,
    krb_kdc_req::{KdcReq, KrbKdcReq},
    principal_name::PrincipalName,
    realm::Realm,
};
use crate::constants::KRB_PVNO;
use crate::error::KrbError;
use der::{Decode, Encode};
use std::time::SystemTime;
use tracing::{error, trace};

use super::Name;

#[derive(Debug)]
pub enum KerberosRequest {
    AS(AuthenticationRequest),
}

/// An AS-REQ. The request realm is always the client's realm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    pub(crate) nonce: u32,
    pub(crate) client_name: Name,
    pub(crate) service_name: Name,
    pub(crate) until: SystemTime,
    pub(crate) etypes: Vec<EncryptionType>,
    pub(crate) kdc_options: KerberosFlags,
}

#[derive(Debug)]
pub struct AuthenticationRequestBuilder {
    client_name: Name,
    service_name: Name,
    until: SystemTime,
    nonce: u32,
    etypes: Vec<EncryptionType>,
    kdc_options: KerberosFlags,
}

impl KerberosRequest {
    /// Start an AS-REQ. Without further settings the request carries no
    /// kdc-options, a nonce of zero and the three single DES etypes.
    pub fn build_as(
        client_name: &Name,
        service_name: Name,
        until: SystemTime,
    ) -> AuthenticationRequestBuilder {
        AuthenticationRequestBuilder {
            client_name: client_name.clone(),
            service_name,
            until,
            nonce: 0,
            etypes: EncryptionType::DES_DEFAULTS.to_vec(),
            kdc_options: KerberosFlags::none(),
        }
    }

    pub fn to_der(&self) -> Result<Vec<u8>, KrbError> {
        let krb_kdc_req = KrbKdcReq::try_from(self)?;
        krb_kdc_req.to_der().map_err(|err| {
            error!(?err, "DerEncodeKdcReq");
            KrbError::DerEncodeKdcReq
        })
    }

    /// Decode a request as a KDC would see it.
    pub fn from_der(data: &[u8]) -> Result<Self, KrbError> {
        KrbKdcReq::from_der(data)
            .map_err(KrbError::from)
            .and_then(KerberosRequest::try_from)
    }
}

impl AuthenticationRequestBuilder {
    pub fn kdc_options(mut self, kdc_options: KerberosFlags) -> Self {
        self.kdc_options = kdc_options;
        self
    }

    pub fn nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn etypes(mut self, etypes: Vec<EncryptionType>) -> Self {
        self.etypes = etypes;
        self
    }

    pub fn build(self) -> KerberosRequest {
        let AuthenticationRequestBuilder {
            client_name,
            service_name,
            until,
            nonce,
            etypes,
            kdc_options,
        } = self;

        KerberosRequest::AS(AuthenticationRequest {
            nonce,
            client_name,
            service_name,
            until,
            etypes,
            kdc_options,
        })
    }
}

impl AuthenticationRequest {
    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn client_name(&self) -> &Name {
        &self.client_name
    }

    pub fn service_name(&self) -> &Name {
        &self.service_name
    }

    pub fn realm(&self) -> &str {
        self.client_name.realm()
    }

    pub fn until(&self) -> SystemTime {
        self.until
    }

    pub fn etypes(&self) -> &[EncryptionType] {
        &self.etypes
    }

    pub fn kdc_options(&self) -> KerberosFlags {
        self.kdc_options
    }
}

impl From<AuthenticationRequest> for KerberosRequest {
    fn from(req: AuthenticationRequest) -> Self {
        KerberosRequest::AS(req)
    }
}

impl TryFrom<&KerberosRequest> for KrbKdcReq {
    type Error = KrbError;

    fn try_from(req: &KerberosRequest) -> Result<Self, Self::Error> {
        let KerberosRequest::AS(AuthenticationRequest {
            nonce,
            client_name,
            service_name,
            until,
            etypes,
            kdc_options,
        }) = req;

        // Clients are users, whatever shape their name takes.
        let (mut cname, realm): (PrincipalName, Realm) = client_name.try_into()?;
        cname.name_type = PrincipalNameType::NtPrincipal.into();
        // Only the name of the service is sent. Its realm is the request realm.
        let (sname, _): (PrincipalName, Realm) = service_name.try_into()?;

        let till = KerberosTime::from_system_time(*until).map_err(|err| {
            error!(?err, "DerEncodeKerberosTime");
            KrbError::DerEncodeKerberosTime
        })?;

        let req_body = KdcReqBody {
            kdc_options: *kdc_options,
            cname: Some(cname),
            realm,
            sname: Some(sname),
            from: None,
            till,
            rtime: None,
            nonce: *nonce,
            etype: etypes.iter().map(|e| i32::from(*e)).collect(),
            addresses: None,
            enc_authorization_data: None,
            additional_tickets: None,
        };

        trace!(?req_body);

        Ok(KrbKdcReq::AsReq(KdcReq {
            pvno: KRB_PVNO,
            msg_type: KrbMessageType::KrbAsReq.into(),
            padata: None,
            req_body,
        }))
    }
}

impl TryFrom<KrbKdcReq> for KerberosRequest {
    type Error = KrbError;

    fn try_from(req: KrbKdcReq) -> Result<Self, KrbError> {
        let KrbKdcReq::AsReq(kdc_req) = req;
        KerberosRequest::try_from(kdc_req)
    }
}

impl TryFrom<KdcReq> for KerberosRequest {
    type Error = KrbError;

    fn try_from(req: KdcReq) -> Result<Self, Self::Error> {
        if req.pvno != KRB_PVNO {
            error!(pvno = req.pvno, "unsupported protocol version");
            return Err(KrbError::InvalidPvno);
        }

        match KrbMessageType::try_from(req.msg_type) {
            Ok(KrbMessageType::KrbAsReq) => {}
            _ => {
                error!(msg_type = req.msg_type, "not an AS-REQ");
                return Err(KrbError::InvalidMessageType);
            }
        }

        let req_body = req.req_body;
        trace!(?req_body);

        // Unknown etypes are skipped, the KDC picks from what it understands.
        let etypes = req_body
            .etype
            .iter()
            .filter_map(|etype| EncryptionType::try_from(*etype).ok())
            .collect();

        let cname = req_body.cname.ok_or_else(|| {
            error!("AS-REQ without a client name");
            KrbError::NameInvalid
        })?;
        let client_name = Name::try_from((&cname, &req_body.realm))?;

        let sname = req_body.sname.ok_or_else(|| {
            error!("AS-REQ without a service name");
            KrbError::NameInvalid
        })?;
        let service_name = Name::try_from((&sname, &req_body.realm))?;

        Ok(KerberosRequest::AS(AuthenticationRequest {
            nonce: req_body.nonce,
            client_name,
            service_name,
            until: req_body.till.to_system_time(),
            etypes,
            kdc_options: req_body.kdc_options,
        }))
    }
}
