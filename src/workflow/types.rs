//! String-backed enums for the varchar columns of the routing tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! column_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        concat!("unknown ", stringify!($name), " `{}`"),
                        other
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

column_enum! {
    pub enum DocumentType {
        Incoming => "incoming",
        Outgoing => "outgoing",
        Internal => "internal",
        Order => "order",
        Resolution => "resolution",
    }
}

impl DocumentType {
    /// Journal a completed document of this type is registered in, if any.
    pub fn journal_type(self) -> Option<JournalType> {
        match self {
            DocumentType::Incoming => Some(JournalType::Incoming),
            DocumentType::Outgoing => Some(JournalType::Outgoing),
            DocumentType::Internal | DocumentType::Order | DocumentType::Resolution => None,
        }
    }
}

column_enum! {
    pub enum DocumentStatus {
        Draft => "draft",
        InRoute => "in_route",
        Completed => "completed",
        Rejected => "rejected",
        Archived => "archived",
    }
}

impl DocumentStatus {
    pub fn is_archivable(self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Rejected)
    }
}

column_enum! {
    pub enum ScopeType {
        Department => "department",
        Global => "global",
    }
}

column_enum! {
    pub enum RouteStatus {
        Active => "active",
        Completed => "completed",
        Rejected => "rejected",
        Superseded => "superseded",
    }
}

column_enum! {
    pub enum StageType {
        Review => "review",
        Sign => "sign",
        Approve => "approve",
    }
}

column_enum! {
    pub enum AssigneeType {
        User => "user",
        Role => "role",
        DepartmentHead => "department_head",
    }
}

column_enum! {
    pub enum StageState {
        Pending => "pending",
        Active => "active",
        Done => "done",
        Skipped => "skipped",
        Escalated => "escalated",
    }
}

column_enum! {
    pub enum StageAction {
        Approve => "approve",
        Sign => "sign",
        CompleteReview => "complete_review",
        Reject => "reject",
    }
}

column_enum! {
    pub enum StageOutcome {
        Approved => "approved",
        Signed => "signed",
        Reviewed => "reviewed",
        Rejected => "rejected",
    }
}

column_enum! {
    pub enum AlertKind {
        DueSoon => "due_soon",
        Overdue => "overdue",
        Escalation => "escalation",
    }
}

column_enum! {
    pub enum AlertStatus {
        Unread => "unread",
        Read => "read",
    }
}

column_enum! {
    pub enum JournalType {
        Incoming => "incoming",
        Outgoing => "outgoing",
    }
}

column_enum! {
    pub enum RegistrationStatus {
        Registered => "registered",
        Cancelled => "cancelled",
    }
}

column_enum! {
    pub enum TimelineEventType {
        Created => "created",
        Forward => "forward",
        Assign => "assign",
        Reassign => "reassign",
        Reply => "reply",
        RouteStarted => "route_started",
        RouteAction => "route_action",
        RouteCompleted => "route_completed",
        Override => "override",
        ResponsibleReassigned => "responsible_reassigned",
        Archive => "archive",
        Registered => "registered",
        RegistrationCancelled => "registration_cancelled",
    }
}
