//! Builders for the replies a KDC would send, used by the simulated KDCs in
//! tests.

use crate::asn1::{
    constants::{EncryptionType, KrbMessageType},
    encrypted_data::{EncryptedData as KdcEncryptedData, EncryptionKey as KdcEncryptionKey},
    kerberos_string::KerberosText,
    kerberos_time::KerberosTime,
    krb_error::KrbError as KdcKrbError,
    krb_kdc_rep::{KdcRep, KrbKdcRep},
    principal_name::PrincipalName,
    realm::Realm,
    tagged_enc_kdc_rep_part::{EncKdcRepPart, LastReqItem, TaggedEncKdcRepPart},
    tagged_ticket::TaggedTicket,
    ticket_flags::TicketFlags,
    OctetString,
};
use crate::constants::KRB_PVNO;
use crate::crypto::encrypt_des_cbc_md5;
use crate::proto::{EncryptionKey, Name};
use der::asn1::Any;
use der::Encode;
use std::time::Duration;

pub(crate) const FIXTURE_AUTH_TIME: u64 = 1_700_000_000;
pub(crate) const FIXTURE_LIFETIME: u64 = 36_000;

fn kerberos_time(secs: u64) -> KerberosTime {
    KerberosTime::from_unix_duration(Duration::from_secs(secs)).expect("Invalid time")
}

fn krbtgt(realm: &str) -> (PrincipalName, Realm) {
    (&Name::service_krbtgt(realm))
        .try_into()
        .expect("Invalid service name")
}

/// A DES AS-REP for `client`, with the encrypted part sealed under `key`.
pub(crate) fn as_rep_der(client: &Name, key: &EncryptionKey, nonce: u32) -> Vec<u8> {
    let (cname, crealm): (PrincipalName, Realm) = client.try_into().expect("Invalid client");
    let (sname, srealm) = krbtgt(client.realm());

    let ticket_enc_part = KdcEncryptedData {
        etype: EncryptionType::DES_CBC_MD5.into(),
        kvno: Some(2),
        cipher: OctetString::new(vec![0x5a; 64]).expect("Invalid octets"),
    };
    let ticket = TaggedTicket::new(srealm.clone(), sname.clone(), ticket_enc_part);
    let ticket = Any::encode_from(&ticket).expect("Failed to encode ticket");

    let session_key = KdcEncryptionKey {
        key_type: EncryptionType::DES_CBC_MD5.into(),
        key_value: OctetString::new(vec![0x3b; 8]).expect("Invalid octets"),
    };

    let enc_part = EncKdcRepPart {
        key: session_key,
        last_req: vec![LastReqItem {
            lr_type: 0,
            lr_value: kerberos_time(FIXTURE_AUTH_TIME),
        }],
        nonce,
        key_expiration: None,
        flags: TicketFlags::Initial | TicketFlags::Renewable,
        auth_time: kerberos_time(FIXTURE_AUTH_TIME),
        start_time: None,
        end_time: kerberos_time(FIXTURE_AUTH_TIME + FIXTURE_LIFETIME),
        renew_till: None,
        server_realm: srealm,
        server_name: sname,
        client_addresses: None,
    };
    let plaintext = TaggedEncKdcRepPart::EncAsRepPart(enc_part)
        .to_der()
        .expect("Failed to encode enc part");

    let k = key.des_key().expect("Not a des key");
    let cipher = encrypt_des_cbc_md5(&k, &plaintext).expect("Failed to encrypt");

    let kdc_rep = KdcRep {
        pvno: KRB_PVNO,
        msg_type: KrbMessageType::KrbAsRep.into(),
        padata: None,
        crealm,
        cname,
        ticket,
        enc_part: KdcEncryptedData {
            etype: EncryptionType::DES_CBC_MD5.into(),
            kvno: None,
            cipher: OctetString::new(cipher).expect("Invalid octets"),
        },
    };

    KrbKdcRep::AsRep(kdc_rep)
        .to_der()
        .expect("Failed to encode AS-REP")
}

/// A KRB-ERROR about `client` with the given code and optional text.
pub(crate) fn krb_error_der(code: i32, client: &Name, text: Option<&str>) -> Vec<u8> {
    let (service_name, service_realm) = krbtgt(client.realm());
    let (cname, crealm): (PrincipalName, Realm) = client.try_into().expect("Invalid client");

    let err = KdcKrbError {
        pvno: KRB_PVNO,
        msg_type: KrbMessageType::KrbError.into(),
        ctime: None,
        cusec: None,
        stime: kerberos_time(FIXTURE_AUTH_TIME),
        susec: 42,
        error_code: code,
        crealm: Some(crealm),
        cname: Some(cname),
        service_realm,
        service_name,
        error_text: text.map(KerberosText::from),
        error_data: None,
    };

    KrbKdcRep::ErrRep(err)
        .to_der()
        .expect("Failed to encode KRB-ERROR")
}
