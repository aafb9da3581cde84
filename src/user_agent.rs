//! User-Agent string sent with every OpenRosa request.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/openrosa-rs/openrosa";

/// Default User-Agent for transport requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("openrosa/{version} (openrosa-client; +{PROJECT_UA_URL})")
}
