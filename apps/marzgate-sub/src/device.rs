use axum::http::{header, HeaderMap};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;

static APP_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)/([0-9.]+)").unwrap());
static DARWIN_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"darwin/(\d+)\.(\d+)").unwrap());
static ANDROID_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"android[/\s]*([0-9.]+)").unwrap());

/// Darwin kernel major version to iOS major version (approximate).
const DARWIN_TO_IOS: &[(&str, &str)] = &[
    ("25", "18"),
    ("24", "17"),
    ("23", "16"),
    ("22", "15"),
    ("21", "14"),
];

/// Best-effort classification of a VPN client from its User-Agent.
///
/// Multiple real agents can collide on the same descriptor; this is a
/// lossy heuristic consumed only for logging and analytics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceDescriptor {
    pub user_agent: String,
    pub device_name: Option<&'static str>,
    pub os_version: Option<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
}

struct Rule {
    matches: fn(&str) -> bool,
    label: &'static str,
    /// Some(_) overrides any OS version derived earlier (e.g. from Darwin).
    os_version: fn(&str) -> Option<String>,
}

// Priority order matters: an agent containing both "iphone" and "mac"
// must classify as iPhone.
const RULES: &[Rule] = &[
    Rule {
        matches: is_iphone,
        label: "iPhone",
        os_version: no_os,
    },
    Rule {
        matches: is_ipad,
        label: "iPad",
        os_version: no_os,
    },
    Rule {
        matches: is_android,
        label: "Android",
        os_version: android_os,
    },
    Rule {
        matches: is_windows,
        label: "Windows PC",
        os_version: windows_os,
    },
    Rule {
        matches: is_mac,
        label: "Mac",
        os_version: mac_os,
    },
];

fn is_iphone(ua: &str) -> bool {
    ua.contains("iphone") || ua.contains("/ios")
}

fn is_ipad(ua: &str) -> bool {
    ua.contains("ipad")
}

fn is_android(ua: &str) -> bool {
    ua.contains("android")
}

fn is_windows(ua: &str) -> bool {
    ua.contains("windows")
}

fn is_mac(ua: &str) -> bool {
    ua.contains("mac")
}

fn no_os(_ua: &str) -> Option<String> {
    None
}

fn android_os(ua: &str) -> Option<String> {
    ANDROID_VERSION
        .captures(ua)
        .map(|caps| format!("Android {}", &caps[1]))
}

fn windows_os(_ua: &str) -> Option<String> {
    Some("Windows".to_string())
}

fn mac_os(_ua: &str) -> Option<String> {
    Some("macOS".to_string())
}

impl DeviceDescriptor {
    /// Total: never fails. An empty agent yields a descriptor with every
    /// field unset except `user_agent`.
    pub fn parse(user_agent: &str) -> Self {
        let mut descriptor = DeviceDescriptor {
            user_agent: user_agent.to_string(),
            ..Default::default()
        };

        if user_agent.is_empty() {
            return descriptor;
        }

        let ua = user_agent.to_lowercase();

        // Leading "<app>/<version>" token, e.g. "Happ/3.7.0/ios ..."
        if let Some(caps) = APP_TOKEN.captures(user_agent) {
            descriptor.app_name = Some(caps[1].to_string());
            descriptor.app_version = Some(caps[2].to_string());
        }

        // Apple clients report the Darwin kernel version, not the iOS one.
        if let Some(caps) = DARWIN_TOKEN.captures(&ua) {
            descriptor.os_version = apple_os_version(&caps[1], &caps[2]);
        }

        for rule in RULES {
            if (rule.matches)(&ua) {
                descriptor.device_name = Some(rule.label);
                if let Some(os) = (rule.os_version)(&ua) {
                    descriptor.os_version = Some(os);
                }
                break;
            }
        }

        descriptor
    }
}

fn apple_os_version(darwin_major: &str, darwin_minor: &str) -> Option<String> {
    let ios_major = DARWIN_TO_IOS
        .iter()
        .find(|(darwin, _)| *darwin == darwin_major)
        .map(|(_, ios)| *ios)?;

    let minor_value: u64 = darwin_minor.parse().ok()?;
    if minor_value > 10 {
        Some(format!("iOS {}.{}", ios_major, minor_value / 100))
    } else {
        Some(format!("iOS {}.{}", ios_major, darwin_minor))
    }
}

/// Parse the device descriptor out of the inbound request headers and
/// emit one structured record per request for downstream analytics.
pub fn parse_device(headers: &HeaderMap) -> DeviceDescriptor {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let descriptor = DeviceDescriptor::parse(user_agent);

    info!(
        user_agent = %descriptor.user_agent,
        device = descriptor.device_name.unwrap_or("unknown"),
        os = descriptor.os_version.as_deref().unwrap_or("-"),
        app = descriptor.app_name.as_deref().unwrap_or("-"),
        app_version = descriptor.app_version.as_deref().unwrap_or("-"),
        "device parsed"
    );

    descriptor
}
