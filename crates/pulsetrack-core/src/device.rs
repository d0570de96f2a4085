//! Device classification from the user-agent string.
//!
//! Matching is case-insensitive substring search. Tablet markers are checked
//! before the generic mobile markers because most tablet user agents also
//! carry a `mobile` or `android` token.

use serde::{Deserialize, Serialize};

const TABLET_MARKERS: &[&str] = &["ipad", "tablet", "playbook", "silk"];

const MOBILE_MARKERS: &[&str] = &[
    "mobile",
    "iphone",
    "ipod",
    "android",
    "blackberry",
    "opera mini",
    "iemobile",
];

/// Coarse device class reported with every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    #[default]
    Desktop,
}

impl DeviceClass {
    /// Classify a raw user-agent string.
    #[must_use]
    pub fn from_user_agent(user_agent: &str) -> Self {
        let ua = user_agent.to_lowercase();

        let android_tablet = ua.contains("android") && !ua.contains("mobile");
        if android_tablet || TABLET_MARKERS.iter().any(|m| ua.contains(m)) {
            return Self::Tablet;
        }

        if MOBILE_MARKERS.iter().any(|m| ua.contains(m)) {
            return Self::Mobile;
        }

        Self::Desktop
    }

    /// Wire name (`mobile`, `tablet`, `desktop`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mobile => "mobile",
            Self::Tablet => "tablet",
            Self::Desktop => "desktop",
        }
    }
}

impl std::fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 \
                        (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
                          AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
                                 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                       (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    #[test]
    fn ipad_is_tablet_even_with_mobile_token() {
        assert_eq!(DeviceClass::from_user_agent(IPAD), DeviceClass::Tablet);
    }

    #[test]
    fn iphone_is_mobile() {
        assert_eq!(DeviceClass::from_user_agent(IPHONE), DeviceClass::Mobile);
    }

    #[test]
    fn android_depends_on_mobile_token() {
        assert_eq!(DeviceClass::from_user_agent(ANDROID_PHONE), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(ANDROID_TABLET), DeviceClass::Tablet);
    }

    #[test]
    fn kindle_silk_is_tablet() {
        let ua = "Mozilla/5.0 (Linux; U; en-us; KFAPWI Build/JDQ39) AppleWebKit/535.19 Silk/3.13";
        assert_eq!(DeviceClass::from_user_agent(ua), DeviceClass::Tablet);
    }

    #[test]
    fn plain_desktop_and_empty() {
        assert_eq!(DeviceClass::from_user_agent(MAC), DeviceClass::Desktop);
        assert_eq!(DeviceClass::from_user_agent(""), DeviceClass::Desktop);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&DeviceClass::Tablet).unwrap_or_default();
        assert_eq!(json, "\"tablet\"");
    }
}
