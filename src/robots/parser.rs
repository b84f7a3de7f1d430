//! Robots.txt rule evaluation
//!
//! Matching is delegated to the robotstxt crate; this module only decides what
//! to do when there is no usable file.

use robotstxt::DefaultMatcher;

/// The robots.txt decision source for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotsRules {
    /// No robots.txt (404/410) or checks bypassed: everything is allowed
    AllowAll,

    /// robots.txt could not be retrieved: nothing on the host is allowed
    DenyAll,

    /// A retrieved robots.txt body
    Parsed(String),
}

impl RobotsRules {
    /// Creates rules from a raw robots.txt body
    ///
    /// An empty body allows everything.
    pub fn from_content(content: &str) -> Self {
        if content.trim().is_empty() {
            Self::AllowAll
        } else {
            Self::Parsed(content.to_string())
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check
    /// * `user_agent` - The product token to match groups against
    ///
    /// # Returns
    ///
    /// * `true` - If fetching the URL is permitted
    /// * `false` - If the URL is disallowed or the host is denied
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        match self {
            Self::AllowAll => true,
            Self::DenyAll => false,
            Self::Parsed(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, user_agent, url)
            }
        }
    }
}
