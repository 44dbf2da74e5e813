//! Browser vendor selection and RPC configuration.
//!
//! The vendor is chosen once at startup and decides which transport
//! variant every role (server, client, relay) uses.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use webext_rpc::{Browser, RpcConfig};
//!
//! let config = RpcConfig::builder()
//!     .browser("firefox".parse::<Browser>()?)
//!     .call_timeout(Duration::from_secs(10))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ExtensionId;

// ============================================================================
// Constants
// ============================================================================

/// Content script injected by the background to host the relay.
pub const DEFAULT_MIDDLEWARE_SCRIPT: &str = "/content-script-middleware.js";

// ============================================================================
// Browser
// ============================================================================

/// Browser vendor.
///
/// The two vendors differ in what the page may do with extension
/// messaging: Chromium lets the page message the background directly,
/// Firefox requires every page↔background exchange to pass through the
/// content-script relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    /// Chromium-based browsers.
    Chromium,
    /// Firefox.
    Firefox,
}

impl Browser {
    /// Returns the descriptor string.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
        }
    }

    /// Returns `true` if page code can message the background process
    /// without going through the relay.
    #[inline]
    #[must_use]
    pub const fn page_reaches_background_directly(&self) -> bool {
        matches!(self, Self::Chromium)
    }

    /// Returns the URL scheme of extension resources.
    #[inline]
    #[must_use]
    pub const fn extension_scheme(&self) -> &'static str {
        match self {
            Self::Chromium => "chrome-extension",
            Self::Firefox => "moz-extension",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Browser {
    type Err = Error;

    fn from_str(descriptor: &str) -> Result<Self> {
        match descriptor {
            "chromium" => Ok(Self::Chromium),
            "firefox" => Ok(Self::Firefox),
            other => Err(Error::unsupported_browser(other)),
        }
    }
}

// ============================================================================
// ExtensionOrigin
// ============================================================================

/// Origin that serves the extension's web resources.
///
/// Parsed from a resource URL such as
/// `moz-extension://df0b610b-995b-9240-8c3b-fcaf155c9005/some-code.js`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionOrigin {
    /// Vendor implied by the URL scheme.
    pub browser: Browser,
    /// Extension ID (URL host).
    pub extension_id: ExtensionId,
}

impl ExtensionOrigin {
    /// Parses an extension resource URL.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOrigin`] if the URL is malformed or has no host
    /// - [`Error::UnsupportedBrowser`] if the scheme is not an extension scheme
    pub fn parse(resource_url: &str) -> Result<Self> {
        let url = Url::parse(resource_url).map_err(|_| Error::invalid_origin(resource_url))?;

        let browser = match url.scheme() {
            "chrome-extension" => Browser::Chromium,
            "moz-extension" => Browser::Firefox,
            other => return Err(Error::unsupported_browser(other)),
        };

        let host = url
            .host_str()
            .filter(|host| is_extension_id(host))
            .ok_or_else(|| Error::invalid_origin(resource_url))?;

        Ok(Self {
            browser,
            extension_id: ExtensionId::new(host),
        })
    }

    /// Returns the origin string, e.g. `chrome-extension://abc`.
    #[must_use]
    pub fn origin(&self) -> String {
        format!("{}://{}", self.browser.extension_scheme(), self.extension_id)
    }
}

/// Lowercase letters, digits and hyphens only.
fn is_extension_id(host: &str) -> bool {
    !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

// ============================================================================
// RpcConfig
// ============================================================================

/// Validated configuration shared by the sandbox contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    browser: Browser,
    extension_id: Option<ExtensionId>,
    call_timeout: Option<Duration>,
    middleware_script: String,
}

impl RpcConfig {
    /// Creates a new configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RpcConfigBuilder {
        RpcConfigBuilder::default()
    }

    /// Shorthand for a configuration with only the vendor set.
    #[inline]
    #[must_use]
    pub fn for_browser(browser: Browser) -> Self {
        Self {
            browser,
            extension_id: None,
            call_timeout: None,
            middleware_script: DEFAULT_MIDDLEWARE_SCRIPT.to_string(),
        }
    }

    /// Returns the browser vendor.
    #[inline]
    #[must_use]
    pub const fn browser(&self) -> Browser {
        self.browser
    }

    /// Returns the extension ID, if known.
    #[inline]
    #[must_use]
    pub fn extension_id(&self) -> Option<&ExtensionId> {
        self.extension_id.as_ref()
    }

    /// Returns the per-call timeout. `None` means calls may wait forever.
    #[inline]
    #[must_use]
    pub const fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    /// Returns the middleware content script path.
    #[inline]
    #[must_use]
    pub fn middleware_script(&self) -> &str {
        &self.middleware_script
    }
}

// ============================================================================
// RpcConfigBuilder
// ============================================================================

/// Builder for [`RpcConfig`].
#[derive(Debug, Default, Clone)]
pub struct RpcConfigBuilder {
    browser: Option<Browser>,
    extension_id: Option<ExtensionId>,
    call_timeout: Option<Duration>,
    middleware_script: Option<String>,
}

impl RpcConfigBuilder {
    /// Sets the browser vendor.
    #[inline]
    #[must_use]
    pub fn browser(mut self, browser: Browser) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Sets the extension ID.
    #[inline]
    #[must_use]
    pub fn extension_id(mut self, id: impl Into<String>) -> Self {
        self.extension_id = Some(ExtensionId::new(id));
        self
    }

    /// Sets vendor and extension ID from a parsed origin.
    #[inline]
    #[must_use]
    pub fn origin(mut self, origin: ExtensionOrigin) -> Self {
        self.browser = Some(origin.browser);
        self.extension_id = Some(origin.extension_id);
        self
    }

    /// Sets a timeout applied to every RPC call.
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Overrides the middleware content script path.
    #[inline]
    #[must_use]
    pub fn middleware_script(mut self, path: impl Into<String>) -> Self {
        self.middleware_script = Some(path.into());
        self
    }

    /// Builds the configuration with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the browser is not set
    /// - [`Error::Config`] if the timeout is zero or the script path is empty
    pub fn build(self) -> Result<RpcConfig> {
        let browser = self
            .browser
            .ok_or_else(|| Error::config("Browser vendor is required"))?;

        if self.call_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("Call timeout must be greater than zero"));
        }

        let middleware_script = self
            .middleware_script
            .unwrap_or_else(|| DEFAULT_MIDDLEWARE_SCRIPT.to_string());
        if middleware_script.is_empty() {
            return Err(Error::config("Middleware script path must not be empty"));
        }

        Ok(RpcConfig {
            browser,
            extension_id: self.extension_id,
            call_timeout: self.call_timeout,
            middleware_script,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_from_str() {
        assert_eq!("chromium".parse::<Browser>().ok(), Some(Browser::Chromium));
        assert_eq!("firefox".parse::<Browser>().ok(), Some(Browser::Firefox));

        let err = "safari".parse::<Browser>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedBrowser { ref descriptor } if descriptor == "safari"));
    }

    #[test]
    fn test_browser_capabilities() {
        assert!(Browser::Chromium.page_reaches_background_directly());
        assert!(!Browser::Firefox.page_reaches_background_directly());
    }

    #[test]
    fn test_origin_parse_chromium() {
        let origin =
            ExtensionOrigin::parse("chrome-extension://akidegfimbjmokpejlcnjagogamdiinl/some-page.html")
                .expect("parse");
        assert_eq!(origin.browser, Browser::Chromium);
        assert_eq!(origin.extension_id.as_str(), "akidegfimbjmokpejlcnjagogamdiinl");
        assert_eq!(
            origin.origin(),
            "chrome-extension://akidegfimbjmokpejlcnjagogamdiinl"
        );
    }

    #[test]
    fn test_origin_parse_firefox() {
        let origin = ExtensionOrigin::parse(
            "moz-extension://df0b610b-995b-9240-8c3b-fcaf155c9005/some-code.js",
        )
        .expect("parse");
        assert_eq!(origin.browser, Browser::Firefox);
        assert_eq!(
            origin.extension_id.as_str(),
            "df0b610b-995b-9240-8c3b-fcaf155c9005"
        );
    }

    #[test]
    fn test_origin_parse_rejects_web_urls() {
        let err = ExtensionOrigin::parse("https://example.com/page.js").unwrap_err();
        assert!(matches!(err, Error::UnsupportedBrowser { .. }));

        let err = ExtensionOrigin::parse("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidOrigin { .. }));
    }

    #[test]
    fn test_builder_requires_browser() {
        let err = RpcConfig::builder().build().unwrap_err();
        assert!(err.is_environment_error());
    }

    #[test]
    fn test_builder_defaults() {
        let config = RpcConfig::builder()
            .browser(Browser::Firefox)
            .build()
            .expect("build");
        assert_eq!(config.middleware_script(), DEFAULT_MIDDLEWARE_SCRIPT);
        assert_eq!(config.call_timeout(), None);
        assert_eq!(config, RpcConfig::for_browser(Browser::Firefox));
    }

    #[test]
    fn test_builder_rejects_zero_timeout() {
        let result = RpcConfig::builder()
            .browser(Browser::Chromium)
            .call_timeout(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_from_origin() {
        let origin = ExtensionOrigin::parse("chrome-extension://abc/x.js").expect("parse");
        let config = RpcConfig::builder().origin(origin).build().expect("build");
        assert_eq!(config.browser(), Browser::Chromium);
        assert_eq!(config.extension_id().map(ExtensionId::as_str), Some("abc"));
    }
}
