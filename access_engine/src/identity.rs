/// Access Kernel: Identity Context
///
/// Who is calling, as already asserted by the platform. The kernel never
/// re-derives or verifies identity.

use serde::{Deserialize, Serialize};

use crate::access::validate_id;
use crate::error::AccessResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityContext {
    /// Globally unique caller id.
    pub principal: String,
    /// Organization the caller acts as.
    pub org: String,
}

impl IdentityContext {
    pub fn new(principal: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            org: org.into(),
        }
    }

    /// The organization id for self-scoped operations.
    pub fn acting_org(&self) -> AccessResult<&str> {
        validate_id("caller organization", &self.org)?;
        Ok(&self.org)
    }
}
