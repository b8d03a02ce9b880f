//! Connector addresses.
//!
//! An address names a backend, a location within that backend, and default
//! options for the handler in a single string:
//!
//! ```text
//! [<scheme>://]<location>[/<path>][;<key>=<value>[,...]][?<key>=<value>[&...]]
//! ```
//!
//! The `;` segment carries defaults baked into the address, the `?` segment
//! carries options for a specific call and overrides both the defaults and any
//! options passed in code.
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::contract::ConnectorContract;
use crate::errors::{ConnectorError, Result};
use crate::options::{OptionMap, OptionValue};

/// A parsed connector address.
///
/// Equality ignores the raw input string, two addresses are equal if they
/// normalize to the same parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ConnectorContract", into = "ConnectorContract")]
pub struct ConnectorAddress {
    raw: String,
    scheme: String,
    /// If the scheme was written in the address rather than taken from the
    /// fallback.
    explicit_scheme: bool,
    location: String,
    resource: String,
    path: String,
    inline_params: OptionMap,
    query_params: IndexMap<String, String>,
    module_ref: Option<String>,
    handler_ref: Option<String>,
}

impl ConnectorAddress {
    /// Scheme used when the address doesn't carry one.
    pub const DEFAULT_SCHEME: &'static str = "file";

    const SCHEME_SEP: &'static str = "://";
    const INLINE_SEP: char = ';';
    const QUERY_SEP: char = '?';

    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        Self::parse_with_default_scheme(raw, Self::DEFAULT_SCHEME)
    }

    /// Parse an address, using `default_scheme` if the address doesn't
    /// contain a `://` separator.
    pub fn parse_with_default_scheme(raw: impl Into<String>, default_scheme: &str) -> Result<Self> {
        let raw = raw.into();

        let (rest, query) = match raw.split_once(Self::QUERY_SEP) {
            Some((rest, query)) => (rest, Some(query)),
            None => (raw.as_str(), None),
        };
        let query_params: IndexMap<String, String> = match query {
            Some(query) => form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => IndexMap::new(),
        };

        let (rest, inline) = match rest.split_once(Self::INLINE_SEP) {
            Some((rest, inline)) => (rest, Some(inline)),
            None => (rest, None),
        };
        let inline_params = match inline {
            Some(inline) => parse_inline(&raw, inline)?,
            None => OptionMap::new(),
        };

        let (scheme, explicit_scheme, location, resource) = match rest.split_once(Self::SCHEME_SEP)
        {
            Some((scheme, remainder)) => {
                let (location, resource) = match remainder.find('/') {
                    Some(idx) => remainder.split_at(idx),
                    None => (remainder, ""),
                };
                if location.is_empty() && resource.is_empty() {
                    return Err(ConnectorError::malformed(
                        &raw,
                        "missing location after scheme",
                    ));
                }
                (scheme, true, location, resource)
            }
            None => {
                if rest.is_empty() {
                    return Err(ConnectorError::malformed(&raw, "empty address"));
                }
                (default_scheme, false, "", rest)
            }
        };

        if !is_valid_scheme(scheme) {
            return Err(ConnectorError::malformed(
                &raw,
                format!("invalid scheme '{scheme}'"),
            ));
        }
        let scheme = scheme.to_ascii_lowercase();

        let path = if explicit_scheme {
            format!("{scheme}{}{location}{resource}", Self::SCHEME_SEP)
        } else {
            resource.to_string()
        };

        Ok(ConnectorAddress {
            scheme,
            explicit_scheme,
            location: location.to_string(),
            resource: resource.to_string(),
            path,
            inline_params,
            query_params,
            module_ref: None,
            handler_ref: None,
            raw,
        })
    }

    /// Attach the module and handler that should be resolved for this
    /// address.
    pub fn with_handler(mut self, module_ref: impl Into<String>, handler_ref: impl Into<String>) -> Self {
        self.module_ref = Some(module_ref.into());
        self.handler_ref = Some(handler_ref.into());
        self
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn has_explicit_scheme(&self) -> bool {
        self.explicit_scheme
    }

    /// Segment between the scheme separator and the first `/`. Empty for
    /// addresses without a scheme.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Everything after the location, including the leading `/`.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The address with inline and query segments stripped.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extension of the last path component, if any.
    pub fn file_extension(&self) -> Option<&str> {
        let last = if self.resource.is_empty() {
            &self.location
        } else {
            &self.resource
        };
        Path::new(last).extension().and_then(|ext| ext.to_str())
    }

    pub fn inline_params(&self) -> &OptionMap {
        &self.inline_params
    }

    pub fn query_params(&self) -> &IndexMap<String, String> {
        &self.query_params
    }

    pub fn module_ref(&self) -> Option<&str> {
        self.module_ref.as_deref()
    }

    pub fn handler_ref(&self) -> Option<&str> {
        self.handler_ref.as_deref()
    }

    /// Merge options for a call.
    ///
    /// Inline params are the base, explicit call options override those, and
    /// query params override everything.
    pub fn effective_options(&self, call: &OptionMap) -> OptionMap {
        let mut options = self.inline_params.clone();
        options.merge(call);
        for (name, value) in self.query_params.iter() {
            options.insert(name.clone(), OptionValue::parse_literal(value));
        }
        options
    }
}

impl PartialEq for ConnectorAddress {
    fn eq(&self, other: &Self) -> bool {
        self.scheme == other.scheme
            && self.explicit_scheme == other.explicit_scheme
            && self.location == other.location
            && self.resource == other.resource
            && self.inline_params == other.inline_params
            && self.query_params == other.query_params
            && self.module_ref == other.module_ref
            && self.handler_ref == other.handler_ref
    }
}

impl Eq for ConnectorAddress {}

/// Writes the normalized form of the address. Module and handler references
/// aren't part of the string form.
impl fmt::Display for ConnectorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;

        if !self.inline_params.is_empty() {
            let inline = self
                .inline_params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "{}{inline}", Self::INLINE_SEP)?;
        }

        if !self.query_params.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.query_params.iter())
                .finish();
            write!(f, "{}{query}", Self::QUERY_SEP)?;
        }

        Ok(())
    }
}

impl FromStr for ConnectorAddress {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ConnectorAddress {
    type Error = ConnectorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<ConnectorContract> for ConnectorAddress {
    type Error = ConnectorError;

    fn try_from(contract: ConnectorContract) -> Result<Self, Self::Error> {
        let mut address = Self::parse(contract.uri)?;
        address.module_ref = contract.module_name;
        address.handler_ref = contract.handler;
        Ok(address)
    }
}

impl From<ConnectorAddress> for ConnectorContract {
    fn from(address: ConnectorAddress) -> Self {
        ConnectorContract {
            uri: address.raw,
            module_name: address.module_ref,
            handler: address.handler_ref,
        }
    }
}

fn parse_inline(raw: &str, inline: &str) -> Result<OptionMap> {
    let mut params = OptionMap::new();
    for pair in inline.split(',').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            ConnectorError::malformed(raw, format!("inline parameter '{pair}' is not key=value"))
        })?;
        if key.is_empty() {
            return Err(ConnectorError::malformed(
                raw,
                format!("inline parameter '{pair}' has an empty key"),
            ));
        }
        params.insert(key, OptionValue::parse_literal(value));
    }
    Ok(params)
}

/// Schemes follow RFC 3986: a letter followed by letters, digits, `+`, `-` or
/// `.`.
fn is_valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => (),
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
