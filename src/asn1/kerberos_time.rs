use der::asn1::GeneralizedTime;

/// ```text
/// KerberosTime    ::= GeneralizedTime -- with no fractional seconds
/// ```
pub(crate) type KerberosTime = GeneralizedTime;
