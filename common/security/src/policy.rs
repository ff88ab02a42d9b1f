use crate::context::SecurityContext;
use crate::error::SecurityError;

/// What a route requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Role(String),
}

/// `"/api/admin/**"` matches `/api/admin` and anything below it on a segment
/// boundary; any other pattern matches exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    Exact(String),
    Prefix(String),
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix("/**") {
            Some(prefix) => PathPattern::Prefix(prefix.to_string()),
            None => PathPattern::Exact(pattern.to_string()),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Prefix(prefix) => {
                prefix.is_empty()
                    || path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub pattern: PathPattern,
    pub access: Access,
}

/// Ordered route policy table. The first matching rule wins; paths no rule
/// matches require an authenticated caller.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    rules: Vec<AccessRule>,
}

impl RoutePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, pattern: &str, access: Access) -> Self {
        self.rules.push(AccessRule {
            pattern: PathPattern::parse(pattern),
            access,
        });
        self
    }

    pub fn permit_all<'a>(self, patterns: impl IntoIterator<Item = &'a str>) -> Self {
        patterns
            .into_iter()
            .fold(self, |policy, pattern| policy.rule(pattern, Access::Public))
    }

    pub fn require_role(self, pattern: &str, role: impl Into<String>) -> Self {
        self.rule(pattern, Access::Role(role.into()))
    }

    pub fn authenticated(self, pattern: &str) -> Self {
        self.rule(pattern, Access::Authenticated)
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn access_for(&self, path: &str) -> &Access {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .map(|rule| &rule.access)
            .unwrap_or(&Access::Authenticated)
    }

    pub fn is_public(&self, path: &str) -> bool {
        matches!(self.access_for(path), Access::Public)
    }

    /// Allow, or deny with 401 (no identity) / 403 (identity lacks the role).
    pub fn evaluate(&self, ctx: &SecurityContext, path: &str) -> Result<(), SecurityError> {
        match self.access_for(path) {
            Access::Public => Ok(()),
            Access::Authenticated if ctx.is_authenticated() => Ok(()),
            Access::Role(role) if ctx.is_authenticated() => {
                if ctx.has_role(role) {
                    Ok(())
                } else {
                    Err(SecurityError::Forbidden {
                        path: path.to_string(),
                        required_role: role.clone(),
                    })
                }
            }
            Access::Authenticated | Access::Role(_) => Err(SecurityError::Unauthenticated {
                path: path.to_string(),
            }),
        }
    }
}
