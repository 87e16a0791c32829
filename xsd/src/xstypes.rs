use std::fmt;

pub type NCName = String;
pub type AnyURI = String;

/// An expanded name: namespace URI plus local part.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace_name: Option<AnyURI>,
    pub local_name: NCName,
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace_name) = self.namespace_name.as_ref() {
            write!(f, "{{{}}}{}", namespace_name, self.local_name)
        } else {
            write!(f, "{}", self.local_name)
        }
    }
}

impl QName {
    pub fn with_namespace(
        namespace_name: impl Into<String>,
        local_name: impl Into<String>,
    ) -> Self {
        Self::with_optional_namespace(Some(namespace_name), local_name)
    }

    pub fn with_optional_namespace(
        namespace_name: Option<impl Into<String>>,
        local_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace_name: namespace_name.map(Into::into),
            local_name: local_name.into(),
        }
    }
}

/// The lexical form of a QName as it appears in the document, `prefix:local` or `local`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PrefixedName<'a> {
    pub prefix: Option<&'a str>,
    pub local_name: &'a str,
}

impl<'a> PrefixedName<'a> {
    pub fn parse(source: &'a str) -> Self {
        match source.split_once(':') {
            Some((prefix, local_name)) => Self {
                prefix: Some(prefix),
                local_name,
            },
            None => Self {
                prefix: None,
                local_name: source,
            },
        }
    }
}

impl fmt::Display for PrefixedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local_name),
            None => f.write_str(self.local_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_name_splits_on_first_colon() {
        let name = PrefixedName::parse("lib:Book");
        assert_eq!(name.prefix, Some("lib"));
        assert_eq!(name.local_name, "Book");
        assert_eq!(name.to_string(), "lib:Book");
    }

    #[test]
    fn unprefixed_name_has_no_prefix() {
        let name = PrefixedName::parse("Book");
        assert_eq!(name.prefix, None);
        assert_eq!(name.local_name, "Book");
    }

    #[test]
    fn qname_display_uses_clark_notation() {
        let name = QName::with_namespace("urn:lib", "Book");
        assert_eq!(name.to_string(), "{urn:lib}Book");
        let name = QName::with_optional_namespace(None::<String>, "Book");
        assert_eq!(name.to_string(), "Book");
    }
}
