//! Operation-to-permission table checked against the caller context.

use std::collections::HashMap;
use std::fmt;

use tidings_core::{AccessError, CallerContext, ConfigError, FeedResult};

/// Feed operations subject to a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedOperation {
    ListNotifications,
    Publish,
    ListSubscriptions,
    CreateSubscription,
}

impl FeedOperation {
    pub const ALL: [FeedOperation; 4] = [
        Self::ListNotifications,
        Self::Publish,
        Self::ListSubscriptions,
        Self::CreateSubscription,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ListNotifications => "list_notifications",
            Self::Publish => "publish",
            Self::ListSubscriptions => "list_subscriptions",
            Self::CreateSubscription => "create_subscription",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Permission a caller needs under the default table.
    pub fn default_permission(&self) -> &'static str {
        match self {
            Self::ListNotifications => "notifications:read",
            Self::Publish => "notifications:publish",
            Self::ListSubscriptions => "subscriptions:read",
            Self::CreateSubscription => "subscriptions:write",
        }
    }
}

impl fmt::Display for FeedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Required permission per operation, fixed when a scope is built.
///
/// An operation with no entry is open to every caller of the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTable {
    required: HashMap<FeedOperation, String>,
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self {
            required: FeedOperation::ALL
                .into_iter()
                .map(|op| (op, op.default_permission().to_string()))
                .collect(),
        }
    }
}

impl PermissionTable {
    /// A table that requires nothing.
    pub fn open() -> Self {
        Self {
            required: HashMap::new(),
        }
    }

    /// Default table with the listed operations opened up.
    ///
    /// `names` is a comma-separated list of operation names, or `*` for all.
    pub fn with_open_operations(names: &str) -> FeedResult<Self> {
        let mut table = Self::default();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if name == "*" {
                return Ok(Self::open());
            }
            let operation = FeedOperation::from_name(name).ok_or_else(|| {
                ConfigError::InvalidValue {
                    field: "open_operations".to_string(),
                    value: name.to_string(),
                    reason: "unknown feed operation".to_string(),
                }
            })?;
            table = table.allow_all(operation);
        }
        Ok(table)
    }

    pub fn require(mut self, operation: FeedOperation, permission: impl Into<String>) -> Self {
        self.required.insert(operation, permission.into());
        self
    }

    pub fn allow_all(mut self, operation: FeedOperation) -> Self {
        self.required.remove(&operation);
        self
    }

    pub fn required_for(&self, operation: FeedOperation) -> Option<&str> {
        self.required.get(&operation).map(String::as_str)
    }

    pub fn check(&self, caller: &CallerContext, operation: FeedOperation) -> FeedResult<()> {
        match self.required_for(operation) {
            Some(permission) if !caller.has_permission(permission) => {
                tracing::debug!(
                    user_id = %caller.user_id,
                    scope = %caller.scope,
                    operation = %operation,
                    permission,
                    "Permission denied"
                );
                Err(AccessError::PermissionDenied {
                    user_id: caller.user_id.clone(),
                    operation: operation.name().to_string(),
                }
                .into())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidings_core::FeedError;

    #[test]
    fn test_default_table_requires_permission() {
        let table = PermissionTable::default();
        let caller = CallerContext::new("u-1", "acme").with_permissions(["notifications:read"]);

        assert!(table.check(&caller, FeedOperation::ListNotifications).is_ok());
        let err = table.check(&caller, FeedOperation::Publish).unwrap_err();
        assert!(matches!(
            err,
            FeedError::Access(AccessError::PermissionDenied { ref operation, .. }) if operation == "publish"
        ));
    }

    #[test]
    fn test_open_table_allows_everyone() {
        let table = PermissionTable::open();
        let caller = CallerContext::new("u-1", "acme");
        for op in FeedOperation::ALL {
            assert!(table.check(&caller, op).is_ok());
        }
    }

    #[test]
    fn test_open_operations_from_list() {
        let table = PermissionTable::with_open_operations(" publish, list_subscriptions ,").unwrap();
        assert_eq!(table.required_for(FeedOperation::Publish), None);
        assert_eq!(table.required_for(FeedOperation::ListSubscriptions), None);
        assert_eq!(
            table.required_for(FeedOperation::ListNotifications),
            Some("notifications:read")
        );

        assert_eq!(PermissionTable::with_open_operations("*").unwrap(), PermissionTable::open());
        assert_eq!(PermissionTable::with_open_operations("").unwrap(), PermissionTable::default());
        let err = PermissionTable::with_open_operations("publish,shred").unwrap_err();
        assert!(matches!(
            err,
            FeedError::Config(ConfigError::InvalidValue { ref value, .. }) if value == "shred"
        ));
    }

    #[test]
    fn test_custom_requirement() {
        let table = PermissionTable::open().require(FeedOperation::Publish, "producer");
        let producer = CallerContext::new("svc", "acme").with_permissions(["producer"]);
        assert!(table.check(&producer, FeedOperation::Publish).is_ok());
        assert!(table
            .check(&CallerContext::new("u", "acme"), FeedOperation::Publish)
            .is_err());
        assert_eq!(table.allow_all(FeedOperation::Publish).required_for(FeedOperation::Publish), None);
    }
}
