//! Operation Context
//!
//! Contains metadata about the current operation for logging and tracing.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Who is allowed to perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Admin,
}

/// Context for an operation, used for authorization and tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// The authenticated actor's user ID, if any (absent for anonymous endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<Uuid>,

    /// The authenticated actor's role
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_role: Option<ActorRole>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self {
            actor_id: None,
            actor_role: None,
            correlation_id: None,
            client_ip: None,
        }
    }

    pub fn with_actor(mut self, actor_id: Uuid, role: ActorRole) -> Self {
        self.actor_id = Some(actor_id);
        self.actor_role = Some(role);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.actor_role, Some(ActorRole::Admin))
    }

    /// True when the actor is the given customer, or is an admin.
    pub fn authorizes(&self, customer_id: Uuid) -> bool {
        self.is_admin() || self.actor_id == Some(customer_id)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let actor_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_actor(actor_id, ActorRole::Customer)
            .with_correlation_id(correlation_id);

        assert_eq!(context.actor_id, Some(actor_id));
        assert_eq!(context.correlation_id, Some(correlation_id));
        assert!(!context.is_admin());
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert!(context.correlation_id.is_some());

        let id2 = context.ensure_correlation_id();
        assert_eq!(id, id2);
    }

    #[test]
    fn test_authorizes() {
        let customer_id = Uuid::new_v4();
        let other_id = Uuid::new_v4();

        let as_owner = OperationContext::new().with_actor(customer_id, ActorRole::Customer);
        assert!(as_owner.authorizes(customer_id));
        assert!(!as_owner.authorizes(other_id));

        let as_admin = OperationContext::new().with_actor(other_id, ActorRole::Admin);
        assert!(as_admin.authorizes(customer_id));
    }
}
