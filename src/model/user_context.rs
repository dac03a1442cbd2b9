use serde::{Deserialize, Serialize};

/// Acting user extracted from request headers, used for permissions and audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    /// Codenames such as `add_person` or `change_person`
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserContext {
    /// Create a new UserContext with just a user ID
    pub fn new(user_id: String) -> Self {
        Self {
            user_id,
            user_email: None,
            user_name: None,
            is_superuser: false,
            permissions: Vec::new(),
        }
    }

    /// Create a UserContext with full user information
    pub fn with_details(user_id: String, email: Option<String>, name: Option<String>) -> Self {
        Self {
            user_id,
            user_email: email,
            user_name: name,
            is_superuser: false,
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn has_perm(&self, codename: &str) -> bool {
        self.is_superuser || self.permissions.iter().any(|p| p == codename)
    }

    /// Create a default user context for development/testing
    pub fn default_user() -> Self {
        Self {
            user_id: "dev-user".to_string(),
            user_email: Some("dev@localhost".to_string()),
            user_name: Some("Development User".to_string()),
            is_superuser: true,
            permissions: Vec::new(),
        }
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::default_user()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_lookup() {
        let ctx = UserContext::new("u1".to_string()).with_permissions(&["add_person"]);
        assert!(ctx.has_perm("add_person"));
        assert!(!ctx.has_perm("change_person"));
        assert!(ctx.clone().superuser().has_perm("change_person"));
    }
}
