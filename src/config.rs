//! Realm and KDC discovery.
//!
//! The realm and KDC come from one of, in order:
//!
//! * the paired `KRB5_REALM` and `KRB5_KDC` settings,
//! * the file named by `KRB5_CONFIG`,
//! * `<exe dir>/../etc/krb5.conf`,
//! * the platform `krb5.conf`.
//!
//! Setting only one of the pair is an error, as is naming a `KRB5_CONFIG`
//! that does not exist.

use crate::constants::DEFAULT_KDC_PORT;
use crate::error::KrbError;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, trace, warn};

pub const ENV_REALM: &str = "KRB5_REALM";
pub const ENV_KDC: &str = "KRB5_KDC";
pub const ENV_CONFIG: &str = "KRB5_CONFIG";

#[cfg(windows)]
const PLATFORM_CONFIG_PATH: &str = "C:\\ProgramData\\MIT\\Kerberos5\\krb5.ini";
#[cfg(not(windows))]
const PLATFORM_CONFIG_PATH: &str = "/etc/krb5.conf";

static SYSTEM_CONFIG: OnceCell<Arc<KdcConfig>> = OnceCell::const_new();

/// A parsed `krb5.conf`. Values are looked up by section and tag. The
/// contents of a `tag = { ... }` block are stored under the section
/// `"<section>/<tag>"`, so the realms block for `EXAMPLE.COM` is the section
/// `realms/EXAMPLE.COM`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KrbConfig {
    sections: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl KrbConfig {
    /// Read and parse a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, KrbError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            error!(?err, ?path, "unable to read krb5.conf");
            if err.kind() == io::ErrorKind::NotFound {
                KrbError::ConfigNotFound
            } else {
                KrbError::ConfigIo
            }
        })?;

        debug!(?path, "loaded krb5.conf");
        Ok(Self::parse(&contents))
    }

    /// Lines that do not fit the grammar are skipped.
    pub fn parse(contents: &str) -> Self {
        let mut sections: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        let mut section: Option<String> = None;
        // Open blocks, innermost last.
        let mut blocks: Vec<String> = Vec::new();

        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim();
                if !blocks.is_empty() {
                    warn!(lineno, "section starts inside an unterminated block");
                    blocks.clear();
                }
                sections.entry(name.to_string()).or_default();
                section = Some(name.to_string());
                continue;
            }

            let Some(current) = section.as_deref() else {
                trace!(lineno, "skipping line outside of any section");
                continue;
            };

            if line == "}" {
                if blocks.pop().is_none() {
                    trace!(lineno, "skipping unbalanced closing brace");
                }
                continue;
            }

            let Some((tag, value)) = line.split_once('=') else {
                trace!(lineno, "skipping line without a tag");
                continue;
            };

            let tag = tag.trim();
            let value = value.trim();
            if tag.is_empty() {
                trace!(lineno, "skipping line with an empty tag");
                continue;
            }

            let path = std::iter::once(current)
                .chain(blocks.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join("/");

            if value == "{" {
                sections.entry(format!("{path}/{tag}")).or_default();
                blocks.push(tag.to_string());
                continue;
            }

            sections
                .entry(path)
                .or_default()
                .entry(tag.to_string())
                .or_default()
                .push(value.to_string());
        }

        if !blocks.is_empty() {
            warn!("krb5.conf ends inside an unterminated block");
        }

        KrbConfig { sections }
    }

    /// The first value of `tag` in `section`.
    pub fn value(&self, section: &str, tag: &str) -> Option<&str> {
        self.values(section, tag).first().map(String::as_str)
    }

    /// Every value of `tag` in `section`, in file order.
    pub fn values(&self, section: &str, tag: &str) -> &[String] {
        self.sections
            .get(section)
            .and_then(|tags| tags.get(tag))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn default_realm(&self) -> Option<&str> {
        self.value("libdefaults", "default_realm")
    }

    /// The first `kdc` listed for `realm` in the `[realms]` section.
    pub fn kdc_for_realm(&self, realm: &str) -> Option<&str> {
        self.value(&format!("realms/{realm}"), "kdc")
    }
}

/// Where to look for the realm and KDC.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub realm: Option<String>,
    pub kdc: Option<String>,
    /// An explicit configuration file. When set it must exist.
    pub config_path: Option<PathBuf>,
    pub runtime_default: Option<PathBuf>,
    pub platform_default: Option<PathBuf>,
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl ConfigSources {
    pub fn from_env() -> Self {
        let runtime_default = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("../etc/krb5.conf")));

        ConfigSources {
            realm: non_empty_env(ENV_REALM),
            kdc: non_empty_env(ENV_KDC),
            config_path: non_empty_env(ENV_CONFIG).map(PathBuf::from),
            runtime_default,
            platform_default: Some(PathBuf::from(PLATFORM_CONFIG_PATH)),
        }
    }

    fn find_config_file(&self) -> Result<&Path, KrbError> {
        if let Some(path) = self.config_path.as_deref() {
            return if path.is_file() {
                Ok(path)
            } else {
                error!(?path, "{} names a file that does not exist", ENV_CONFIG);
                Err(KrbError::ConfigNotFound)
            };
        }

        [self.runtime_default.as_deref(), self.platform_default.as_deref()]
            .into_iter()
            .flatten()
            .find(|path| {
                trace!(?path, "searching for krb5.conf");
                path.is_file()
            })
            .ok_or_else(|| {
                error!("no krb5.conf found and no realm and kdc set");
                KrbError::ConfigNotFound
            })
    }
}

/// A KDC `host[:port]`. IPv6 literals with a port are written in brackets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdcAddress {
    host: String,
    port: u16,
}

impl KdcAddress {
    pub fn new(host: &str, port: u16) -> Self {
        KdcAddress {
            host: host.to_string(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Resolve to the first socket address the resolver returns.
    pub async fn resolve(&self) -> Result<SocketAddr, KrbError> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|err| {
                error!(?err, kdc = %self, "unable to resolve kdc");
                KrbError::KdcAddressUnresolved
            })?
            .next()
            .ok_or_else(|| {
                error!(kdc = %self, "kdc resolved to no addresses");
                KrbError::KdcAddressUnresolved
            })
    }
}

fn parse_port(port: &str) -> Result<u16, KrbError> {
    port.parse().map_err(|err| {
        error!(?err, port, "invalid kdc port");
        KrbError::ConfigInvalidKdcAddress
    })
}

impl FromStr for KdcAddress {
    type Err = KrbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, after) = rest.split_once(']').ok_or_else(|| {
                error!(kdc = s, "unterminated ipv6 literal");
                KrbError::ConfigInvalidKdcAddress
            })?;
            let port = match after {
                "" => DEFAULT_KDC_PORT,
                after => match after.strip_prefix(':') {
                    Some(port) => parse_port(port)?,
                    None => {
                        error!(kdc = s, "unexpected text after ipv6 literal");
                        return Err(KrbError::ConfigInvalidKdcAddress);
                    }
                },
            };
            (host, port)
        } else if s.matches(':').count() > 1 {
            // A bare IPv6 literal cannot carry a port.
            (s, DEFAULT_KDC_PORT)
        } else {
            match s.rsplit_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (s, DEFAULT_KDC_PORT),
            }
        };

        if host.is_empty() {
            error!(kdc = s, "empty kdc host");
            return Err(KrbError::ConfigInvalidKdcAddress);
        }

        Ok(KdcAddress::new(host, port))
    }
}

impl fmt::Display for KdcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// The realm and KDC an exchange talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdcConfig {
    realm: String,
    kdc: KdcAddress,
}

impl KdcConfig {
    pub fn new(realm: &str, kdc: &str) -> Result<Self, KrbError> {
        if realm.trim().is_empty() {
            error!("empty realm");
            return Err(KrbError::ConfigMissingRealm);
        }

        Ok(KdcConfig {
            realm: realm.trim().to_string(),
            kdc: KdcAddress::from_str(kdc)?,
        })
    }

    pub fn load(sources: &ConfigSources) -> Result<Self, KrbError> {
        match (sources.realm.as_deref(), sources.kdc.as_deref()) {
            (Some(realm), Some(kdc)) => {
                debug!(realm, kdc, "using realm and kdc from settings");
                KdcConfig::new(realm, kdc)
            }
            (Some(_), None) | (None, Some(_)) => {
                error!(
                    "{} and {} must be set together, or not at all",
                    ENV_REALM, ENV_KDC
                );
                Err(KrbError::ConfigMissingRealmOrKdc)
            }
            (None, None) => {
                let path = sources.find_config_file()?;
                let config = KrbConfig::load(path)?;
                KdcConfig::try_from(&config)
            }
        }
    }

    /// The process wide configuration, loaded from the environment on first
    /// use. A failed load is returned to the caller and retried next time.
    pub async fn system() -> Result<Arc<KdcConfig>, KrbError> {
        Self::load_once(&SYSTEM_CONFIG, ConfigSources::from_env).await
    }

    pub(crate) async fn load_once<F>(
        cell: &OnceCell<Arc<KdcConfig>>,
        sources: F,
    ) -> Result<Arc<KdcConfig>, KrbError>
    where
        F: FnOnce() -> ConfigSources,
    {
        cell.get_or_try_init(|| async move { KdcConfig::load(&sources()).map(Arc::new) })
            .await
            .cloned()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn kdc(&self) -> &KdcAddress {
        &self.kdc
    }
}

impl TryFrom<&KrbConfig> for KdcConfig {
    type Error = KrbError;

    fn try_from(config: &KrbConfig) -> Result<Self, Self::Error> {
        let realm = config.default_realm().ok_or_else(|| {
            error!("krb5.conf has no [libdefaults] default_realm");
            KrbError::ConfigMissingRealm
        })?;

        let kdc = config.kdc_for_realm(realm).ok_or_else(|| {
            error!(realm, "krb5.conf lists no kdc for the default realm");
            KrbError::ConfigMissingKdc
        })?;

        KdcConfig::new(realm, kdc)
    }
}
