use super::kerberos_string::KerberosText;
use super::kerberos_time::KerberosTime;
use super::microseconds::Microseconds;
use super::principal_name::PrincipalName;
use super::realm::Realm;
use der::asn1::OctetString;
use der::Sequence;

/// ```text
/// KRB-ERROR       ::= [APPLICATION 30] SEQUENCE {
///            pvno            [0] INTEGER (5),
///            msg-type        [1] INTEGER (30),
///            ctime           [2] KerberosTime OPTIONAL,
///            cusec           [3] Microseconds OPTIONAL,
///            stime           [4] KerberosTime,
///            susec           [5] Microseconds,
///            error-code      [6] Int32,
///            crealm          [7] Realm OPTIONAL,
///            cname           [8] PrincipalName OPTIONAL,
///            realm           [9] Realm -- service realm --,
///            sname           [10] PrincipalName -- service name --,
///            e-text          [11] KerberosString OPTIONAL,
///            e-data          [12] OCTET STRING OPTIONAL
///    }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Sequence)]
pub(crate) struct KrbError {
    #[asn1(context_specific = "0")]
    pub(crate) pvno: u8,
    #[asn1(context_specific = "1")]
    pub(crate) msg_type: u8,
    #[asn1(context_specific = "2", optional = "true")]
    pub(crate) ctime: Option<KerberosTime>,
    #[asn1(context_specific = "3", optional = "true")]
    pub(crate) cusec: Option<Microseconds>,
    #[asn1(context_specific = "4")]
    pub(crate) stime: KerberosTime,
    #[asn1(context_specific = "5")]
    pub(crate) susec: Microseconds,
    #[asn1(context_specific = "6")]
    pub(crate) error_code: i32,
    #[asn1(context_specific = "7", optional = "true")]
    pub(crate) crealm: Option<Realm>,
    #[asn1(context_specific = "8", optional = "true")]
    pub(crate) cname: Option<PrincipalName>,
    #[asn1(context_specific = "9")]
    pub(crate) service_realm: Realm,
    #[asn1(context_specific = "10")]
    pub(crate) service_name: PrincipalName,
    #[asn1(context_specific = "11", optional = "true")]
    pub(crate) error_text: Option<KerberosText>,
    #[asn1(context_specific = "12", optional = "true")]
    pub(crate) error_data: Option<OctetString>,
}

/// ```text
/// PA-DATA         ::= SEQUENCE {
///         -- NOTE: first tag is [1], not [0]
///         padata-type     [1] Int32,
///         padata-value    [2] OCTET STRING -- might be encoded AP-REQ
/// }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Sequence)]
pub(crate) struct PaData {
    #[asn1(context_specific = "1")]
    pub(crate) padata_type: u32,
    #[asn1(context_specific = "2")]
    pub(crate) padata_value: OctetString,
}

/// ```text
///    If the errorcode is KDC_ERR_PREAUTH_REQUIRED, then the e-data field will
///    contain an encoding of a sequence of padata fields, each
///    corresponding to an acceptable pre-authentication method and
///    optionally containing data for the method:
///
///      METHOD-DATA     ::= SEQUENCE OF PA-DATA
/// ```
pub(crate) type MethodData = Vec<PaData>;

#[cfg(test)]
mod tests {
    use crate::asn1::constants::{KrbErrorCode, KrbMessageType, PaDataType};
    use crate::asn1::kerberos_time::KerberosTime;
    use crate::asn1::krb_error::MethodData;
    use crate::asn1::krb_kdc_rep::KrbKdcRep;
    use der::{DateTime, Decode};

    fn decode_err(hex_blob: &str) -> super::KrbError {
        let blob = hex::decode(hex_blob).expect("Failed to decode sample");
        match KrbKdcRep::from_der(&blob).expect("Failed to decode") {
            KrbKdcRep::ErrRep(err) => err,
            KrbKdcRep::AsRep(_) => panic!("Expected a KRB-ERROR"),
        }
    }

    #[test]
    fn krb_err_response_too_big() {
        let _ = tracing_subscriber::fmt::try_init();

        let e = decode_err("7e5a3058a003020105a10302011ea411180f32303234303631323131343830355aa505020301dc66a603020134a90c1b0a41464f524553542e4144aa1f301da003020102a11630141b066b72627467741b0a41464f524553542e4144");

        assert_eq!(e.pvno, 5);
        assert_eq!(e.msg_type, u8::from(KrbMessageType::KrbError));
        assert_eq!(
            e.stime,
            KerberosTime::from_date_time(
                DateTime::new(2024, 6, 12, 11, 48, 5).expect("Failed to build datetime")
            )
        );
        assert_eq!(e.susec, 121958);
        assert_eq!(e.error_code, i32::from(KrbErrorCode::KrbErrResponseTooBig));
        assert_eq!(e.service_realm.as_str(), "AFOREST.AD");
        assert_eq!(e.service_name.joined(), "krbtgt/AFOREST.AD");
        assert!(e.crealm.is_none());
        assert!(e.cname.is_none());
        assert!(e.error_text.is_none());
        assert!(e.error_data.is_none());
    }

    #[test]
    fn krb_err_preauth_required() {
        let _ = tracing_subscriber::fmt::try_init();

        let e = decode_err("7e81a93081a6a003020105a10302011ea411180f32303234303631323131343830355aa505020301dc66a603020119a90c1b0a41464f524553542e4144aa1f301da003020102a11630141b066b72627467741b0a41464f524553542e4144ac4c044a30483025a103020113a21e041c301a3018a003020112a1111b0f41464f524553542e414475736572313009a103020102a20204003009a103020110a20204003009a10302010fa2020400");

        assert_eq!(e.error_code, i32::from(KrbErrorCode::KdcErrPreauthRequired));
        assert_eq!(e.service_name.name_type, 2);

        let edata = e.error_data.as_ref().expect("e-data must be there");
        let methods = MethodData::from_der(edata.as_bytes()).expect("Failed to decode");

        let expected = [
            PaDataType::PaEtypeInfo2,
            PaDataType::PaEncTimestamp,
            PaDataType::PaPkAsReq,
            PaDataType::PaPkAsRepOld,
        ];
        let types: Vec<u32> = methods.iter().map(|pa| pa.padata_type).collect();
        assert_eq!(types, expected.map(u32::from));

        let etype_info2 =
            hex::decode("301a3018a003020112a1111b0f41464f524553542e41447573657231")
                .expect("Failed to decode bytes");
        assert_eq!(methods[0].padata_value.as_bytes(), etype_info2);
        assert!(methods[1].padata_value.as_bytes().is_empty());
    }
}
