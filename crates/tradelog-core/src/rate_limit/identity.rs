//! Request attributes the admission check keys on.

/// Identity attributes of an inbound request.
///
/// The host framework fills this in; the admission check never looks at
/// anything else about the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestIdentity {
    /// Authenticated user, if the request carried valid credentials.
    pub user_id: Option<String>,
    /// Source IP as seen by the server (after trusted proxy headers).
    pub ip: Option<String>,
    pub method: String,
    pub path: String,
}

impl RequestIdentity {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            user_id: None,
            ip: None,
            method: method.into(),
            path: path.into(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Default identity key: `{method}:{path}:{user}:{ip}`.
    pub fn default_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.method,
            self.path,
            self.user_id.as_deref().unwrap_or("anonymous"),
            self.ip.as_deref().unwrap_or("unknown"),
        )
    }
}
