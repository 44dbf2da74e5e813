//! Type-safe identifiers for sandboxes, tabs and listeners.
//!
//! Newtype wrappers prevent mixing a receiver tag with a procedure name,
//! or a tab ID with some other counter.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ReceiverTag
// ============================================================================

/// String naming the component an envelope is addressed to.
///
/// Used as a filter, not a route: every listener on a channel sees every
/// message and keeps only those carrying its own tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiverTag(Cow<'static, str>);

impl ReceiverTag {
    /// RPC server in the background process.
    pub const BACKGROUND_SERVER: Self = Self(Cow::Borrowed("background-server"));

    /// RPC client in the background process (receives replies).
    pub const BACKGROUND_CLIENT: Self = Self(Cow::Borrowed("background-client"));

    /// Relay in the content script.
    pub const CONTENT_SCRIPT_RELAY: Self = Self(Cow::Borrowed("content-script-relay"));

    /// Injection middleware in the content script.
    pub const CONTENT_SCRIPT_MIDDLEWARE: Self = Self(Cow::Borrowed("content-script-middleware"));

    /// RPC server in the web page.
    pub const WEB_PAGE_SERVER: Self = Self(Cow::Borrowed("web-page-server"));

    /// RPC client in the web page (receives replies).
    pub const WEB_PAGE_CLIENT: Self = Self(Cow::Borrowed("web-page-client"));

    /// Creates a custom receiver tag.
    #[inline]
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    /// Returns the tag as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiverTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ReceiverTag {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

// ============================================================================
// TabId
// ============================================================================

/// Browser tab identifier.
///
/// Browsers never hand out tab 0, so the wrapper is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(NonZeroU32);

impl TabId {
    /// The first tab a browser hands out.
    pub const FIRST: Self = Self(NonZeroU32::MIN);

    /// Creates a tab ID, returning `None` for 0.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ExtensionId
// ============================================================================

/// WebExtension identifier (host part of the extension origin).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionId(String);

impl ExtensionId {
    /// Creates an extension ID.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SubscriptionId
// ============================================================================

/// Identifier of one listener registered on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generates a new random subscription ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
