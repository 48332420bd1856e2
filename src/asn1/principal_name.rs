use super::constants::PrincipalNameType;
use super::kerberos_string::KerberosString;
use crate::error::KrbError;
use der::Sequence;
use std::str::FromStr;

/// ```text
///   PrincipalName   ::= SEQUENCE {
///           name-type       [0] Int32,
///           name-string     [1] SEQUENCE OF KerberosString
///   }
/// ```
#[derive(Debug, Clone, Eq, PartialEq, Sequence)]
pub(crate) struct PrincipalName {
    // The name-type is only a hint. Two names differing only in type are
    // still the same name.
    #[asn1(context_specific = "0")]
    pub(crate) name_type: i32,
    #[asn1(context_specific = "1")]
    pub(crate) name_string: Vec<KerberosString>,
}

impl PrincipalName {
    /// The name with its components joined by `/`.
    pub(crate) fn joined(&self) -> String {
        self.name_string
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    pub(crate) fn principal_name_type(&self) -> Option<PrincipalNameType> {
        PrincipalNameType::try_from(self.name_type).ok()
    }
}

impl<T> TryFrom<(PrincipalNameType, T)> for PrincipalName
where
    T: AsRef<str>,
{
    type Error = KrbError;

    fn try_from((name_type, name_str): (PrincipalNameType, T)) -> Result<Self, Self::Error> {
        let name_string = name_str
            .as_ref()
            .split('/')
            .map(KerberosString::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name_type: name_type.into(),
            name_string,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::PrincipalName;
    use crate::asn1::constants::PrincipalNameType;
    use assert_hex::assert_eq_hex;
    use der::{Decode, Encode};

    #[test]
    fn principal_name_krbtgt() {
        let name = PrincipalName::try_from((PrincipalNameType::NtSrvInst, "krbtgt/AFOREST.AD"))
            .expect("Invalid name");
        let bytes = name.to_der().expect("Failed to encode");
        let expect = hex::decode("301da003020102a11630141b066b72627467741b0a41464f524553542e4144")
            .expect("Failed to decode sample");
        assert_eq_hex!(bytes, expect);

        let decoded = PrincipalName::from_der(&expect).expect("Failed to decode");
        assert_eq!(decoded.joined(), "krbtgt/AFOREST.AD");
        assert_eq!(
            decoded.principal_name_type(),
            Some(PrincipalNameType::NtSrvInst)
        );
    }
}
