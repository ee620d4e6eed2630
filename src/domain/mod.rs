//! Domain types shared by the store, the services and the HTTP layer.
//!
//! Identifiers follow the Newtype pattern so a user id can never be passed
//! where an integration id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Returns the underlying i32 value.
            #[must_use]
            pub const fn value(&self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self::new(id)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_i32(self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                i32::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

id_newtype!(
    /// Primary key of a row in `users`.
    UserId
);

id_newtype!(
    /// Primary key of a row in `integrations`.
    IntegrationId
);

/// Lifecycle state of an integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationStatus {
    Active,
    Inactive,
    #[default]
    Pending,
    Failed,
}

impl IntegrationStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }

    /// Status after a toggle: `active` goes to `inactive`, anything else comes back as `active`.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            _ => Self::Active,
        }
    }
}

impl fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            other => Err(format!(
                "Invalid status '{other}'. Expected one of: active, inactive, pending, failed"
            )),
        }
    }
}

/// Identity resolved from a bearer token, once per request.
///
/// Services only ever ask [`Caller::is_admin`] or [`Caller::owns`]; they never
/// see the token itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
    pub is_staff: bool,
}

impl Caller {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// True when the caller may act on a record owned by `owner`.
    #[must_use]
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin || self.user_id == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(id: i32, is_admin: bool) -> Caller {
        Caller {
            user_id: UserId::new(id),
            username: format!("user{id}"),
            is_admin,
            is_staff: false,
        }
    }

    #[test]
    fn user_id_conversions() {
        let id = UserId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(i32::from(id), 42);
        assert_eq!(UserId::from(42), id);
    }

    #[test]
    fn integration_id_serialization() {
        let id = IntegrationId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let deserialized: IntegrationId = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, id);
    }

    #[test]
    fn status_toggle_only_reaches_active_or_inactive() {
        assert_eq!(IntegrationStatus::Active.toggled(), IntegrationStatus::Inactive);
        assert_eq!(IntegrationStatus::Inactive.toggled(), IntegrationStatus::Active);
        assert_eq!(IntegrationStatus::Pending.toggled(), IntegrationStatus::Active);
        assert_eq!(IntegrationStatus::Failed.toggled(), IntegrationStatus::Active);
    }

    #[test]
    fn status_parse_round_trip() {
        for status in [
            IntegrationStatus::Active,
            IntegrationStatus::Inactive,
            IntegrationStatus::Pending,
            IntegrationStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<IntegrationStatus>(), Ok(status));
        }
        assert!("Active".parse::<IntegrationStatus>().is_err());
        assert!("".parse::<IntegrationStatus>().is_err());
    }

    #[test]
    fn caller_access_rules() {
        let admin = caller(1, true);
        let owner = caller(2, false);

        assert!(admin.can_access(UserId::new(2)));
        assert!(owner.can_access(UserId::new(2)));
        assert!(!owner.can_access(UserId::new(3)));
        assert!(admin.is_admin());
        assert!(!owner.is_admin());
    }
}
