//! PIN and touch policy tags

use std::fmt;

/// PIN policy enforced for a slot key.
///
/// `Unknown` is the zero value, reported for slots without a key and for
/// policy values the driver reports that we do not recognize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PinPolicy {
    #[default]
    Unknown,
    Never,
    Once,
    Always,
}

impl PinPolicy {
    /// Canonical display name. Empty for `Unknown`.
    pub fn as_str(self) -> &'static str {
        match self {
            PinPolicy::Never => "Never",
            PinPolicy::Once => "Once",
            PinPolicy::Always => "Always",
            PinPolicy::Unknown => "",
        }
    }

    /// Converts to the driver's policy type. Total: `Unknown` maps to the
    /// driver's default value, never an error.
    pub fn to_yubikey_pin_policy(self) -> yubikey::PinPolicy {
        match self {
            PinPolicy::Never => yubikey::PinPolicy::Never,
            PinPolicy::Once => yubikey::PinPolicy::Once,
            PinPolicy::Always => yubikey::PinPolicy::Always,
            PinPolicy::Unknown => yubikey::PinPolicy::Default,
        }
    }

    /// Converts from the driver's policy type, mapping anything we do not
    /// recognize to `Unknown` rather than reinterpreting the raw value.
    pub fn from_yubikey_pin_policy(policy: yubikey::PinPolicy) -> Self {
        match policy {
            yubikey::PinPolicy::Never => PinPolicy::Never,
            yubikey::PinPolicy::Once => PinPolicy::Once,
            yubikey::PinPolicy::Always => PinPolicy::Always,
            _ => PinPolicy::Unknown,
        }
    }
}

impl fmt::Display for PinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Touch policy enforced for a slot key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TouchPolicy {
    #[default]
    Unknown,
    Never,
    Always,
    Cached,
}

impl TouchPolicy {
    /// Canonical display name. Empty for `Unknown`.
    pub fn as_str(self) -> &'static str {
        match self {
            TouchPolicy::Never => "Never",
            TouchPolicy::Always => "Always",
            TouchPolicy::Cached => "Cached",
            TouchPolicy::Unknown => "",
        }
    }

    /// Converts to the driver's policy type. Total, never an error.
    pub fn to_yubikey_touch_policy(self) -> yubikey::TouchPolicy {
        match self {
            TouchPolicy::Never => yubikey::TouchPolicy::Never,
            TouchPolicy::Always => yubikey::TouchPolicy::Always,
            TouchPolicy::Cached => yubikey::TouchPolicy::Cached,
            TouchPolicy::Unknown => yubikey::TouchPolicy::Default,
        }
    }

    /// Converts from the driver's policy type, unrecognized values map to
    /// `Unknown`.
    pub fn from_yubikey_touch_policy(policy: yubikey::TouchPolicy) -> Self {
        match policy {
            yubikey::TouchPolicy::Never => TouchPolicy::Never,
            yubikey::TouchPolicy::Always => TouchPolicy::Always,
            yubikey::TouchPolicy::Cached => TouchPolicy::Cached,
            _ => TouchPolicy::Unknown,
        }
    }
}

impl fmt::Display for TouchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
