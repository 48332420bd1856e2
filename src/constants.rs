use std::time::Duration;

pub const DEFAULT_KDC_PORT: u16 = 88;

/// Upper bound for a reassembled reply. RFC 4120 section 7.2.1 notes that
/// large replies should come over TCP, and KDCs answer with
/// KRB_ERR_RESPONSE_TOO_BIG well before this.
pub const DEFAULT_IO_MAX_SIZE: usize = 128 * 1024;

/// Largest payload a single UDP datagram can carry.
pub(crate) const UDP_DATAGRAM_MAX: usize = 65_535;

pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const DES_BLOCK_SIZE: usize = 8;
pub(crate) const DES_KEY_LEN: usize = 8;
pub(crate) const MD5_CKSUM_LEN: usize = 16;
pub(crate) const MD4_CKSUM_LEN: usize = 16;
pub(crate) const CRC32_CKSUM_LEN: usize = 4;

pub(crate) const KRB_PVNO: u8 = 5;
