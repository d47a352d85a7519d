//! Addresses of application entities.
//!
//! An [`AeAddr`] couples a network address with an optional
//! application entity (AE) title, using the syntax
//! `«ae_title»@«host»:«port»`.
//! The AE title part is optional,
//! so `«host»:«port»` is accepted as well.
//! The host may be an IPv4 address, a bracketed IPv6 address
//! or a domain name.
use snafu::{ensure, Backtrace, Snafu};
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

/// A error which occurred when parsing an AE address.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ParseAeAddressError {
    /// The AE title before `@` is empty
    #[snafu(display("AE title is empty"))]
    EmptyAeTitle { backtrace: Backtrace },

    /// The AE title is longer than 16 characters
    #[snafu(display("AE title `{}` is longer than 16 characters", ae_title))]
    AeTitleTooLong {
        ae_title: String,
        backtrace: Backtrace,
    },

    /// The network part has no port
    #[snafu(display("address `{}` has no port", address))]
    MissingPort {
        address: String,
        backtrace: Backtrace,
    },
}

/// A network address to a DICOM node,
/// optionally with the AE title expected at that address.
///
/// # Example
///
/// ```
/// # use netdicom_ul::AeAddr;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let addr: AeAddr = "STORE-SCP@127.0.0.1:104".parse()?;
/// assert_eq!(addr.ae_title(), Some("STORE-SCP"));
/// assert_eq!(addr.socket_addr(), "127.0.0.1:104");
///
/// let addr: AeAddr = "pacs.example.org:11112".parse()?;
/// assert_eq!(addr.ae_title(), None);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AeAddr {
    ae_title: Option<String>,
    socket_addr: String,
}

impl AeAddr {
    /// Create an AE address from its parts.
    pub fn new(ae_title: Option<String>, socket_addr: impl Into<String>) -> Self {
        AeAddr {
            ae_title,
            socket_addr: socket_addr.into(),
        }
    }

    /// The AE title, if one was given.
    pub fn ae_title(&self) -> Option<&str> {
        self.ae_title.as_deref()
    }

    /// The network address part, as `host:port`.
    pub fn socket_addr(&self) -> &str {
        &self.socket_addr
    }

    pub fn into_parts(self) -> (Option<String>, String) {
        (self.ae_title, self.socket_addr)
    }
}

impl FromStr for AeAddr {
    type Err = ParseAeAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ae_title, address) = match s.split_once('@') {
            Some((ae_title, address)) => {
                ensure!(!ae_title.is_empty(), EmptyAeTitleSnafu);
                ensure!(ae_title.len() <= 16, AeTitleTooLongSnafu { ae_title });
                (Some(ae_title.to_string()), address)
            }
            None => (None, s),
        };

        // the port follows the last colon, outside of any IPv6 brackets
        let has_port = address
            .rsplit_once(':')
            .map_or(false, |(host, port)| {
                !host.is_empty()
                    && (!host.contains(':') || host.ends_with(']'))
                    && port.parse::<u16>().is_ok()
            });
        ensure!(has_port, MissingPortSnafu { address });

        Ok(AeAddr {
            ae_title,
            socket_addr: address.to_string(),
        })
    }
}

impl fmt::Display for AeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ae_title) = &self.ae_title {
            write!(f, "{}@", ae_title)?;
        }
        f.write_str(&self.socket_addr)
    }
}

impl ToSocketAddrs for AeAddr {
    type Iter = std::vec::IntoIter<SocketAddr>;

    fn to_socket_addrs(&self) -> std::io::Result<Self::Iter> {
        self.socket_addr.to_socket_addrs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("SCP@127.0.0.1:104", Some("SCP"), "127.0.0.1:104")]
    #[case("127.0.0.1:104", None, "127.0.0.1:104")]
    #[case("ANY-SCP@[::1]:11112", Some("ANY-SCP"), "[::1]:11112")]
    #[case("pacs.example.org:4242", None, "pacs.example.org:4242")]
    fn parses_addresses(
        #[case] text: &str,
        #[case] ae_title: Option<&str>,
        #[case] socket_addr: &str,
    ) {
        let addr: AeAddr = text.parse().unwrap();
        assert_eq!(addr.ae_title(), ae_title);
        assert_eq!(addr.socket_addr(), socket_addr);
        assert_eq!(addr.to_string(), text);
    }

    #[test]
    fn rejects_bad_addresses() {
        assert_matches!(
            "@127.0.0.1:104".parse::<AeAddr>(),
            Err(ParseAeAddressError::EmptyAeTitle { .. })
        );
        assert_matches!(
            "AN-AE-TITLE-OVER-16@127.0.0.1:104".parse::<AeAddr>(),
            Err(ParseAeAddressError::AeTitleTooLong { .. })
        );
        assert_matches!(
            "SCP@127.0.0.1".parse::<AeAddr>(),
            Err(ParseAeAddressError::MissingPort { .. })
        );
        assert_matches!(
            "SCP@::1".parse::<AeAddr>(),
            Err(ParseAeAddressError::MissingPort { .. })
        );
    }

    #[test]
    fn resolves_socket_addresses() {
        let addr: AeAddr = "SCP@127.0.0.1:104".parse().unwrap();
        let resolved: Vec<_> = addr.to_socket_addrs().unwrap().collect();
        assert_eq!(resolved, vec![SocketAddr::from(([127, 0, 0, 1], 104))]);
    }
}
