//! Opportunity postings and student applications.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ports::{CollectionPath, Document, DocumentId};
use crate::domain::{EmailAddress, Error, TagList, UserId};

/// Name of the opportunities collection in the document store.
pub const OPPORTUNITIES_COLLECTION: &str = "opportunities";

/// Subcollection holding one posting's applications.
pub fn applications_collection(opportunity_id: &DocumentId) -> CollectionPath {
    CollectionPath::nested(OPPORTUNITIES_COLLECTION, opportunity_id, "applications")
}

/// Application lifecycle states.
///
/// As with grievances there is no monotonic guard: a reviewer may move an
/// application between any of the four values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    /// Submitted by the student, not yet looked at.
    Applied,
    /// Under review by the posting's managers.
    Reviewing,
    /// Accepted.
    Accepted,
    /// Rejected.
    Rejected,
}

impl ApplicationStatus {
    /// Stable name used in stored documents.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Reviewing => "reviewing",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation errors returned by the opportunity constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpportunityValidationError {
    /// Title was blank once trimmed.
    EmptyTitle,
    /// Description was blank once trimmed.
    EmptyDescription,
}

impl fmt::Display for OpportunityValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::EmptyDescription => write!(f, "description must not be empty"),
        }
    }
}

impl std::error::Error for OpportunityValidationError {}

impl From<OpportunityValidationError> for Error {
    fn from(value: OpportunityValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// Validated input for posting an opportunity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpportunityDraft {
    title: String,
    description: String,
    deadline: Option<String>,
    tags: TagList,
}

impl OpportunityDraft {
    /// Validate and construct a draft. The deadline stays a plain
    /// `yyyy-mm-dd` string; a blank value means no deadline.
    pub fn new(
        title: &str,
        description: &str,
        deadline: &str,
        tags: TagList,
    ) -> Result<Self, OpportunityValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(OpportunityValidationError::EmptyTitle);
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(OpportunityValidationError::EmptyDescription);
        }
        let deadline = deadline.trim();
        Ok(Self {
            title: title.to_owned(),
            description: description.to_owned(),
            deadline: (!deadline.is_empty()).then(|| deadline.to_owned()),
            tags,
        })
    }

    /// The trimmed title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The trimmed description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Optional deadline string.
    pub fn deadline(&self) -> Option<&str> {
        self.deadline.as_deref()
    }

    /// Tags attached to the posting.
    pub const fn tags(&self) -> &TagList {
        &self.tags
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpportunityDoc {
    title: String,
    description: String,
    deadline: Option<String>,
    tags: TagList,
    posted_by: UserId,
    posted_by_email: EmailAddress,
    created_at: DateTime<Utc>,
}

/// A persisted opportunity posting.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    /// Store identifier.
    pub id: DocumentId,
    /// Posting title.
    pub title: String,
    /// Posting body.
    pub description: String,
    /// Optional `yyyy-mm-dd` deadline.
    pub deadline: Option<String>,
    /// Tags attached at posting time.
    pub tags: TagList,
    /// The posting manager who created it.
    pub posted_by: UserId,
    /// Email of the poster at posting time.
    pub posted_by_email: EmailAddress,
    /// Store-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Opportunity {
    /// Decode a stored opportunity document.
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let decoded: OpportunityDoc = serde_json::from_value(doc.to_value())
            .map_err(|err| Error::internal(format!("malformed opportunity document: {err}")))?;
        Ok(Self {
            id: doc.id.clone(),
            title: decoded.title,
            description: decoded.description,
            deadline: decoded.deadline,
            tags: decoded.tags,
            posted_by: decoded.posted_by,
            posted_by_email: decoded.posted_by_email,
            created_at: decoded.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationDoc {
    student_id: UserId,
    student_email: EmailAddress,
    note: String,
    status: ApplicationStatus,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

/// A persisted application to an opportunity.
///
/// ## Invariants
/// - At most one application exists per (opportunity, student) pair; the
///   workflow enforces this inside the insert transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    /// Store identifier.
    pub id: DocumentId,
    /// The applying student.
    pub student_id: UserId,
    /// Email of the student at application time.
    pub student_email: EmailAddress,
    /// Free-text note accompanying the application.
    pub note: String,
    /// Current review state.
    pub status: ApplicationStatus,
    /// Store-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set whenever a manager changes the status.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Application {
    /// Decode a stored application document.
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let decoded: ApplicationDoc = serde_json::from_value(doc.to_value())
            .map_err(|err| Error::internal(format!("malformed application document: {err}")))?;
        Ok(Self {
            id: doc.id.clone(),
            student_id: decoded.student_id,
            student_email: decoded.student_email,
            note: decoded.note,
            status: decoded.status,
            created_at: decoded.created_at,
            updated_at: decoded.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "desc")]
    #[case("title", "   ")]
    fn drafts_require_title_and_description(#[case] title: &str, #[case] description: &str) {
        OpportunityDraft::new(title, description, "", TagList::default())
            .expect_err("invalid drafts must fail");
    }

    #[test]
    fn blank_deadlines_become_none() {
        let draft = OpportunityDraft::new("Intern", "Summer role", "   ", TagList::default())
            .expect("valid draft");
        assert_eq!(draft.deadline(), None);

        let dated = OpportunityDraft::new("Intern", "Summer role", "2026-01-31", TagList::default())
            .expect("valid draft");
        assert_eq!(dated.deadline(), Some("2026-01-31"));
    }

    #[test]
    fn status_serialises_lowercase() {
        let encoded = serde_json::to_string(&ApplicationStatus::Reviewing).expect("serialise");
        assert_eq!(encoded, "\"reviewing\"");
    }
}
