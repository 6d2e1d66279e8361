//! Bounded contexts of the booking platform.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// An isolated area of the domain with its own data model and event bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundedContext {
    Accounts,
    Provider,
    Identity,
    Enrollment,
    Messaging,
    Participation,
    ProgramCatalog,
    Community,
    Support,
}

impl BoundedContext {
    /// Every context, in declaration order.
    pub const ALL: [BoundedContext; 9] = [
        BoundedContext::Accounts,
        BoundedContext::Provider,
        BoundedContext::Identity,
        BoundedContext::Enrollment,
        BoundedContext::Messaging,
        BoundedContext::Participation,
        BoundedContext::ProgramCatalog,
        BoundedContext::Community,
        BoundedContext::Support,
    ];

    /// Stable wire name (also used in topic names).
    pub const fn as_str(&self) -> &'static str {
        match self {
            BoundedContext::Accounts => "accounts",
            BoundedContext::Provider => "provider",
            BoundedContext::Identity => "identity",
            BoundedContext::Enrollment => "enrollment",
            BoundedContext::Messaging => "messaging",
            BoundedContext::Participation => "participation",
            BoundedContext::ProgramCatalog => "program_catalog",
            BoundedContext::Community => "community",
            BoundedContext::Support => "support",
        }
    }
}

impl core::fmt::Display for BoundedContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BoundedContext {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BoundedContext::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown bounded context: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_parse_back() {
        for context in BoundedContext::ALL {
            assert_eq!(context.as_str().parse::<BoundedContext>().unwrap(), context);
        }
    }

    #[test]
    fn serde_uses_snake_case_wire_name() {
        let json = serde_json::to_string(&BoundedContext::ProgramCatalog).unwrap();
        assert_eq!(json, "\"program_catalog\"");
    }

    #[test]
    fn unknown_context_is_a_validation_error() {
        assert!(matches!(
            "billing".parse::<BoundedContext>(),
            Err(DomainError::Validation(_))
        ));
    }
}
