//! Bestätigung nach einer Einladung
//!
//! Ein eingeladener Benutzer wird namentlich genannt, mehrere werden
//! gezählt. Null Einladungen ergeben keine Bestätigung.

use crate::call_engine::InviteOutcome;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InviteNotice {
    User { first_name: String },
    Many { count: usize },
}

impl InviteNotice {
    pub fn from_outcome(outcome: &InviteOutcome) -> Option<Self> {
        match outcome {
            InviteOutcome::SingleUser(user) => Some(InviteNotice::User {
                first_name: user.first_name.clone(),
            }),
            InviteOutcome::Count(_) => match outcome.invited_count() {
                0 => None,
                count => Some(InviteNotice::Many { count }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_engine::User;

    #[test]
    fn test_notice_classification() {
        assert_eq!(
            InviteNotice::from_outcome(&InviteOutcome::SingleUser(User::new(10, "Alice"))),
            Some(InviteNotice::User {
                first_name: "Alice".to_string()
            })
        );
        assert_eq!(
            InviteNotice::from_outcome(&InviteOutcome::Count(4)),
            Some(InviteNotice::Many { count: 4 })
        );
        assert_eq!(InviteNotice::from_outcome(&InviteOutcome::Count(0)), None);
    }
}
