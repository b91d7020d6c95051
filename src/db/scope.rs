//! Owner scoping for repository reads
//!
//! Campaigns and social accounts carry an `owner_id`. Content objects,
//! publications and generation jobs are reached through their campaign, so
//! their queries join `campaigns` and filter on the campaign owner. Rows
//! outside the scope are simply not returned.

use uuid::Uuid;

/// Visibility applied to a repository read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No actor; used by background flows such as the dispatcher
    Unrestricted,
    /// Only rows owned by this user
    Owner(Uuid),
}

impl Scope {
    pub fn for_actor(actor_id: Option<Uuid>) -> Self {
        match actor_id {
            Some(id) => Scope::Owner(id),
            None => Scope::Unrestricted,
        }
    }

    pub fn owner(&self) -> Option<Uuid> {
        match self {
            Scope::Owner(id) => Some(*id),
            Scope::Unrestricted => None,
        }
    }

    /// Append ` AND <column> = ?` when the scope restricts rows.
    ///
    /// Returns the value to bind, in the position the clause was appended.
    pub(crate) fn push_filter(&self, sql: &mut String, owner_column: &str) -> Option<String> {
        self.owner().map(|id| {
            sql.push_str(" AND ");
            sql.push_str(owner_column);
            sql.push_str(" = ?");
            id.to_string()
        })
    }
}
