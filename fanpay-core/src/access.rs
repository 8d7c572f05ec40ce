use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Platform backend calling the service API.
    Service,
    /// Human operator with access to failover, logs and reports.
    Admin,
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub subject: String,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(subject: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn admin(subject: impl Into<String>) -> Self {
        Self::new(subject, [Role::Admin])
    }

    pub fn service(subject: impl Into<String>) -> Self {
        Self::new(subject, [Role::Service])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

pub fn requires_role(principal: &Principal, role: Role) -> Result<(), EngineError> {
    if principal.has_role(role) {
        Ok(())
    } else {
        Err(EngineError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_principal_cannot_act_as_admin() {
        let service = Principal::service("backend");
        assert!(matches!(
            requires_role(&service, Role::Admin),
            Err(EngineError::Forbidden)
        ));
        assert!(requires_role(&Principal::admin("ops"), Role::Admin).is_ok());
    }
}
