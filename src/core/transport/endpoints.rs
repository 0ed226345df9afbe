//! Ordered endpoint candidates.

use std::fmt;

use url::Url;

use crate::utils::{UrlValidationError, validate_endpoint_url};

/// Mainland region realtime endpoint, tried first by default.
pub const DASHSCOPE_WS_URL: &str = "wss://dashscope.aliyuncs.com/api-ws/v1/realtime";

/// International region realtime endpoint, tried second by default.
pub const DASHSCOPE_INTL_WS_URL: &str = "wss://dashscope-intl.aliyuncs.com/api-ws/v1/realtime";

/// One remote address with its priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCandidate {
    /// Validated endpoint, without the model query pair
    pub address: Url,
    /// Priority; 0 is attempted first
    pub ordinal: usize,
}

impl fmt::Display for EndpointCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Immutable, ordered list of endpoint candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    candidates: Vec<EndpointCandidate>,
}

impl EndpointSet {
    /// Build a set from addresses in priority order.
    ///
    /// Blank entries are skipped; every remaining entry must validate.
    pub fn from_addresses<I, S>(addresses: I) -> Result<Self, UrlValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates = Vec::new();
        for address in addresses {
            let address = address.as_ref().trim();
            if address.is_empty() {
                continue;
            }
            let url = validate_endpoint_url(address)?;
            candidates.push(EndpointCandidate {
                address: url,
                ordinal: candidates.len(),
            });
        }
        Ok(Self { candidates })
    }

    /// Parse a comma-separated override such as `DASHSCOPE_ASR_WS_URL`.
    pub fn parse_list(list: &str) -> Result<Self, UrlValidationError> {
        Self::from_addresses(list.split(','))
    }

    /// Mainland region first, international region second.
    pub fn dashscope_defaults() -> Self {
        // Both constants are well-formed wss URLs.
        let candidates = [DASHSCOPE_WS_URL, DASHSCOPE_INTL_WS_URL]
            .iter()
            .filter_map(|address| Url::parse(address).ok())
            .enumerate()
            .map(|(ordinal, address)| EndpointCandidate { address, ordinal })
            .collect();
        Self { candidates }
    }

    #[inline]
    pub fn candidates(&self) -> &[EndpointCandidate] {
        &self.candidates
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl Default for EndpointSet {
    fn default() -> Self {
        Self::dashscope_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_ordered() {
        let set = EndpointSet::default();
        assert_eq!(set.len(), 2);
        assert_eq!(set.candidates()[0].address.as_str(), DASHSCOPE_WS_URL);
        assert_eq!(set.candidates()[0].ordinal, 0);
        assert_eq!(set.candidates()[1].address.as_str(), DASHSCOPE_INTL_WS_URL);
        assert_eq!(set.candidates()[1].ordinal, 1);
    }

    #[test]
    fn test_parse_list_keeps_order_and_skips_blanks() {
        let set =
            EndpointSet::parse_list(" ws://127.0.0.1:9001/a , ,wss://backup.example/b").unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.candidates()[0].address.port(), Some(9001));
        assert_eq!(set.candidates()[1].ordinal, 1);
        assert_eq!(
            set.candidates()[1].address.host_str(),
            Some("backup.example")
        );
    }

    #[test]
    fn test_invalid_candidate_rejects_whole_set() {
        assert!(EndpointSet::parse_list("wss://ok.example,http://bad.example").is_err());
    }
}
