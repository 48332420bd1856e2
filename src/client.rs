//! The AS exchange: build an AS-REQ, send it to the KDC over UDP and turn the
//! reply into credentials or an error.

use crate::config::{ConfigSources, KdcConfig};
use crate::constants::{DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_IO_MAX_SIZE, UDP_DATAGRAM_MAX};
use crate::error::KrbError;
use crate::proto::{
    AuthenticationReply, AuthenticationRequest, EncryptionKey, EncryptionType, KdcReplyPart,
    KerberosFlags, KerberosReply, KerberosRequest, Name, Ticket,
};
use crate::KerberosUdpCodec;
use bytes::BytesMut;
use der::DateTime;
use rand::{rng, Rng};
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::net::UdpSocket;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, instrument, trace, warn};

/// How the request nonce is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceSource {
    Fixed(u32),
    /// A fresh value per request.
    Random,
}

/// Per exchange settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeOptions {
    pub timeout: Duration,
    pub max_reply_size: usize,
    pub nonce: NonceSource,
    pub till: SystemTime,
    pub kdc_options: KerberosFlags,
    pub etypes: Vec<EncryptionType>,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        ExchangeOptions {
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
            max_reply_size: DEFAULT_IO_MAX_SIZE,
            nonce: NonceSource::Fixed(0),
            till: SystemTime::UNIX_EPOCH,
            kdc_options: KerberosFlags::none(),
            etypes: EncryptionType::DES_DEFAULTS.to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TillSetting {
    Seconds(u64),
    Rfc3339(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EtypeSetting {
    Number(i32),
    Name(String),
}

/// The TOML form of [`ExchangeOptions`]. Every field is optional.
///
/// ```toml
/// timeout_secs = 10
/// max_reply_size = 65535
/// random_nonce = true
/// till = "2030-01-01T00:00:00Z"
/// kdc_options = ["forwardable", "renewable-ok"]
/// etypes = ["des-cbc-md5", 1]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeConfig {
    timeout_secs: Option<u64>,
    max_reply_size: Option<usize>,
    nonce: Option<u32>,
    #[serde(default)]
    random_nonce: bool,
    till: Option<TillSetting>,
    #[serde(default)]
    kdc_options: Vec<String>,
    etypes: Option<Vec<EtypeSetting>>,
}

fn invalid_options() -> KrbError {
    KrbError::ConfigInvalidOptions
}

fn kdc_option_from_name(name: &str) -> Result<KerberosFlags, KrbError> {
    let flag = match name.to_ascii_lowercase().replace('_', "-").as_str() {
        "forwardable" => KerberosFlags::Forwardable,
        "forwarded" => KerberosFlags::Forwarded,
        "proxiable" => KerberosFlags::Proxiable,
        "proxy" => KerberosFlags::Proxy,
        "allow-postdate" => KerberosFlags::AllowPostdate,
        "postdated" => KerberosFlags::Postdated,
        "renewable" => KerberosFlags::Renewable,
        "opt-hardware-auth" => KerberosFlags::OptHardwareAuth,
        "canonicalize" => KerberosFlags::Canonicalize,
        "disable-transited-check" => KerberosFlags::DisableTransitedCheck,
        "renewable-ok" => KerberosFlags::RenewableOk,
        "enc-tkt-in-skey" => KerberosFlags::EncTktInSkey,
        "renew" => KerberosFlags::Renew,
        "validate" => KerberosFlags::Validate,
        _ => {
            error!(name, "unknown kdc option");
            return Err(invalid_options());
        }
    };
    Ok(flag)
}

fn etype_from_setting(setting: &EtypeSetting) -> Result<EncryptionType, KrbError> {
    let etype = match setting {
        EtypeSetting::Number(n) => EncryptionType::try_from(*n).map_err(|_| {
            error!(etype = n, "unknown etype");
            invalid_options()
        })?,
        EtypeSetting::Name(name) => match name.to_ascii_lowercase().as_str() {
            "des-cbc-crc" => EncryptionType::DES_CBC_CRC,
            "des-cbc-md4" => EncryptionType::DES_CBC_MD4,
            "des-cbc-md5" => EncryptionType::DES_CBC_MD5,
            _ => {
                error!(name, "unknown or unsupported etype");
                return Err(invalid_options());
            }
        },
    };

    if !etype.is_des() {
        error!(?etype, "only the single des etypes are supported");
        return Err(invalid_options());
    }

    Ok(etype)
}

impl TryFrom<&ExchangeConfig> for ExchangeOptions {
    type Error = KrbError;

    fn try_from(cfg: &ExchangeConfig) -> Result<Self, Self::Error> {
        let defaults = ExchangeOptions::default();

        let timeout = match cfg.timeout_secs {
            Some(0) => {
                error!("timeout_secs must be greater than zero");
                return Err(invalid_options());
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        let max_reply_size = match cfg.max_reply_size {
            Some(0) => {
                error!("max_reply_size must be greater than zero");
                return Err(invalid_options());
            }
            Some(size) => size,
            None => defaults.max_reply_size,
        };

        let nonce = match (cfg.nonce, cfg.random_nonce) {
            (Some(_), true) => {
                error!("nonce and random_nonce are mutually exclusive");
                return Err(invalid_options());
            }
            (Some(nonce), false) => NonceSource::Fixed(nonce),
            (None, true) => NonceSource::Random,
            (None, false) => defaults.nonce,
        };

        let till = match &cfg.till {
            Some(TillSetting::Seconds(secs)) => SystemTime::UNIX_EPOCH + Duration::from_secs(*secs),
            Some(TillSetting::Rfc3339(text)) => DateTime::from_str(text)
                .map(|dt| dt.to_system_time())
                .map_err(|err| {
                    error!(?err, till = text, "till must be YYYY-MM-DDTHH:MM:SSZ");
                    invalid_options()
                })?,
            None => defaults.till,
        };

        let kdc_options = cfg
            .kdc_options
            .iter()
            .map(|name| kdc_option_from_name(name))
            .try_fold(KerberosFlags::none(), |acc, flag| flag.map(|f| acc | f))?;

        let etypes = match &cfg.etypes {
            Some(settings) if settings.is_empty() => {
                error!("etypes must not be empty");
                return Err(invalid_options());
            }
            Some(settings) => settings
                .iter()
                .map(etype_from_setting)
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.etypes,
        };

        Ok(ExchangeOptions {
            timeout,
            max_reply_size,
            nonce,
            till,
            kdc_options,
            etypes,
        })
    }
}

impl ExchangeOptions {
    /// Load options from a TOML file.
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self, KrbError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            error!(?err, ?path, "unable to read exchange options");
            KrbError::ConfigIo
        })?;

        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, KrbError> {
        let cfg: ExchangeConfig = toml::from_str(contents).map_err(|err| {
            error!(?err, "toml parse failure");
            invalid_options()
        })?;

        ExchangeOptions::try_from(&cfg)
    }

    fn next_nonce(&self) -> u32 {
        match self.nonce {
            NonceSource::Fixed(nonce) => nonce,
            // MIT rejects nonces above i32::MAX with "ASN.1 value too large".
            NonceSource::Random => rng().random::<u32>() & 0x7fff_ffff,
        }
    }
}

/// The outcome of a successful exchange.
#[derive(Debug)]
pub struct AsCredentials {
    name: Name,
    ticket: Ticket,
    reply_part: KdcReplyPart,
}

impl AsCredentials {
    /// The client name as the KDC returned it.
    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    pub fn session_key(&self) -> &EncryptionKey {
        self.reply_part.session_key()
    }

    pub fn reply_part(&self) -> &KdcReplyPart {
        &self.reply_part
    }
}

/// A client for the AS exchange against one realm and KDC.
#[derive(Debug, Clone)]
pub struct AsClient {
    config: Arc<KdcConfig>,
    options: ExchangeOptions,
}

impl AsClient {
    pub fn new(config: Arc<KdcConfig>, options: ExchangeOptions) -> Self {
        AsClient { config, options }
    }

    /// Load the realm and KDC from `sources` and build a client.
    pub fn from_sources(sources: &ConfigSources, options: ExchangeOptions) -> Result<Self, KrbError> {
        let config = KdcConfig::load(sources)?;
        Ok(AsClient::new(Arc::new(config), options))
    }

    pub fn config(&self) -> &KdcConfig {
        &self.config
    }

    pub fn options(&self) -> &ExchangeOptions {
        &self.options
    }

    /// Build a request for a TGT for `client` from the configured realm.
    pub fn build_request(&self, client: &Name) -> Result<AuthenticationRequest, KrbError> {
        client.validate()?;
        let realm = client.realm();

        if realm != self.config.realm() {
            error!(
                client_realm = realm,
                configured_realm = self.config.realm(),
                "client realm does not match the configured realm"
            );
            return Err(KrbError::RealmMismatch);
        }

        let KerberosRequest::AS(request) =
            KerberosRequest::build_as(client, Name::service_krbtgt(realm), self.options.till)
                .kdc_options(self.options.kdc_options)
                .nonce(self.options.next_nonce())
                .etypes(self.options.etypes.clone())
                .build();

        trace!(?request);
        Ok(request)
    }

    /// Send `request` to the KDC and open the reply with a key derived from
    /// `password`.
    #[instrument(level = "debug", skip_all, fields(client = %request.client_name()))]
    pub async fn exchange(
        &self,
        request: AuthenticationRequest,
        password: &str,
    ) -> Result<AsCredentials, KrbError> {
        let client = request.client_name().clone();
        let expected_nonce = request.nonce();

        let mut codec = KerberosUdpCodec::new(self.options.max_reply_size);
        let mut out = BytesMut::new();
        codec.encode(KerberosRequest::from(request), &mut out)?;
        trace!(as_req = %hex::encode(&out));

        let kdc = self.config.kdc();
        // Resolution counts against the exchange timeout.
        let reply = tokio::time::timeout(self.options.timeout, async {
            let kdc_addr = kdc.resolve().await?;
            debug!(%kdc_addr, "sending AS-REQ");
            send_and_receive(kdc_addr, &out, &mut codec).await
        })
        .await
        .map_err(|_| {
            error!(%kdc, timeout = ?self.options.timeout, "no reply from kdc");
            KrbError::Timeout
        })??;

        match reply {
            KerberosReply::AS(as_rep) => complete(&as_rep, &client, expected_nonce, password),
            KerberosReply::ERR(err_rep) => {
                debug!(code = err_rep.code(), text = ?err_rep.text(), "kdc returned an error");
                Err(KrbError::KdcError(err_rep))
            }
            KerberosReply::Unknown(tag) => {
                error!(?tag, "unexpected reply from kdc");
                Err(KrbError::UnexpectedReplyTag)
            }
        }
    }

    /// Build a fresh request for `client` and run the exchange.
    pub async fn authenticate(&self, client: &Name, password: &str) -> Result<AsCredentials, KrbError> {
        let request = self.build_request(client)?;
        self.exchange(request, password).await
    }
}

/// One datagram out, then datagrams in until the codec has a whole reply.
/// The socket is closed when this returns or is dropped.
async fn send_and_receive(
    kdc_addr: SocketAddr,
    request: &[u8],
    codec: &mut KerberosUdpCodec,
) -> Result<KerberosReply, KrbError> {
    let local: SocketAddr = if kdc_addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local).await?;
    socket.connect(kdc_addr).await?;

    let sent = socket.send(request).await?;
    if sent != request.len() {
        error!(sent, len = request.len(), "short datagram write");
        return Err(KrbError::IoError);
    }

    let mut buf = BytesMut::new();
    let mut datagram = vec![0u8; UDP_DATAGRAM_MAX];

    loop {
        let len = socket.recv(&mut datagram).await?;
        trace!(len, "received datagram");
        buf.extend_from_slice(&datagram[..len]);

        if let Some(reply) = codec.decode(&mut buf)? {
            return Ok(reply);
        }
    }
}

fn complete(
    as_rep: &AuthenticationReply,
    client: &Name,
    expected_nonce: u32,
    password: &str,
) -> Result<AsCredentials, KrbError> {
    if as_rep.name() != client {
        warn!(requested = %client, returned = %as_rep.name(), "kdc returned a different client name");
    }

    let etype = as_rep.enc_part().encryption_type()?;

    let mut key = EncryptionKey::from_password_for(etype, client, password)?;
    let decrypted = as_rep.decrypt(&key);
    key.destroy();
    let reply_part = decrypted?;

    if reply_part.nonce() != expected_nonce {
        error!(
            expected = expected_nonce,
            received = reply_part.nonce(),
            "nonce mismatch"
        );
        return Err(KrbError::NonceMismatch);
    }

    Ok(AsCredentials {
        name: as_rep.name().clone(),
        ticket: as_rep.ticket().clone(),
        reply_part,
    })
}
