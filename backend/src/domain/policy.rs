//! The role authority: a pure decision table consulted before every
//! mutation.
//!
//! The document store enforces nothing on its own, so this module is the
//! single enforcement point. Services call [`authorize`] before issuing any
//! write, including paths reachable only through direct API calls.

use std::fmt;

use crate::domain::{Error, Role, Session, UserId};

/// Every gated action in the workflow engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// File a new grievance.
    CreateGrievance,
    /// Append a timeline update and move the grievance status.
    UpdateGrievanceStatus,
    /// Assign a grievance to a handler.
    AssignGrievance,
    /// Post an announcement.
    PostAnnouncement,
    /// Post an opportunity.
    PostOpportunity,
    /// Upload a resource.
    PostResource,
    /// Apply to an opportunity.
    ApplyToOpportunity,
    /// Change the status of an application.
    ChangeApplicationStatus,
    /// View the grievance inbox.
    ViewGrievanceInbox,
    /// Change another user's role.
    ChangeUserRole,
    /// List user accounts in the admin panel.
    ListUsers,
}

impl Action {
    /// Human-readable phrase used in denial messages.
    pub const fn describe(self) -> &'static str {
        match self {
            Self::CreateGrievance => "create grievances",
            Self::UpdateGrievanceStatus => "update grievance status",
            Self::AssignGrievance => "assign grievances",
            Self::PostAnnouncement => "post announcements",
            Self::PostOpportunity => "post opportunities",
            Self::PostResource => "upload resources",
            Self::ApplyToOpportunity => "apply to opportunities",
            Self::ChangeApplicationStatus => "change application status",
            Self::ViewGrievanceInbox => "view the grievance inbox",
            Self::ChangeUserRole => "change user roles",
            Self::ListUsers => "list users",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The action × role decision table.
///
/// # Examples
/// ```
/// use campushub_backend::domain::{Action, Role, permits};
///
/// assert!(permits(Role::Student, Action::ApplyToOpportunity));
/// assert!(!permits(Role::Faculty, Action::ApplyToOpportunity));
/// ```
pub const fn permits(role: Role, action: Action) -> bool {
    match action {
        Action::CreateGrievance => true,
        Action::UpdateGrievanceStatus => matches!(role, Role::Authority | Role::Admin),
        Action::AssignGrievance | Action::ChangeUserRole | Action::ListUsers => {
            matches!(role, Role::Admin)
        }
        Action::PostAnnouncement
        | Action::PostOpportunity
        | Action::PostResource
        | Action::ChangeApplicationStatus => {
            matches!(role, Role::Faculty | Role::Authority | Role::Admin)
        }
        Action::ApplyToOpportunity => matches!(role, Role::Student),
        Action::ViewGrievanceInbox => matches!(role, Role::Authority | Role::Admin),
    }
}

/// Gate an action for a session, returning `Forbidden` on deny.
pub fn authorize(session: &Session, action: Action) -> Result<(), Error> {
    if permits(session.role(), action) {
        Ok(())
    } else {
        Err(Error::forbidden(format!(
            "role {} may not {}",
            session.role(),
            action
        )))
    }
}

/// Which grievances a session may see in list views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrievanceScope {
    /// Only grievances created by this user.
    Mine(UserId),
    /// Only grievances assigned to this handler.
    AssignedTo(UserId),
    /// Every grievance.
    All,
}

impl GrievanceScope {
    /// Scope of the "my grievances" view: always the caller's own records.
    pub fn mine(session: &Session) -> Self {
        Self::Mine(session.user_id().clone())
    }

    /// Scope of the grievance inbox, denied to non-handler roles.
    pub fn inbox(session: &Session) -> Result<Self, Error> {
        authorize(session, Action::ViewGrievanceInbox)?;
        match session.role() {
            Role::Admin => Ok(Self::All),
            _ => Ok(Self::AssignedTo(session.user_id().clone())),
        }
    }
}
