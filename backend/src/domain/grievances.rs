//! Grievance entities: the workflow's central record and its append-only
//! timeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ports::{CollectionPath, Document, DocumentId};
use crate::domain::{EmailAddress, Error, UserId};

/// Name of the grievances collection in the document store.
pub const GRIEVANCES_COLLECTION: &str = "grievances";

/// Subcollection holding one grievance's timeline.
pub fn updates_collection(grievance_id: &DocumentId) -> CollectionPath {
    CollectionPath::nested(GRIEVANCES_COLLECTION, grievance_id, "updates")
}

/// Grievance lifecycle states.
///
/// Any authorised actor may set any of the three values at any time: the
/// workflow deliberately does not enforce monotonic progress, so a resolved
/// grievance can be reopened by moving it back to review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrievanceStatus {
    /// Newly filed, awaiting triage.
    Submitted,
    /// Picked up by a handler.
    InReview,
    /// Closed out.
    Resolved,
}

impl GrievanceStatus {
    /// Stable name used in stored documents.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::InReview => "in_review",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for GrievanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories offered by the grievance intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrievanceCategory {
    /// Anything without a better bucket.
    General,
    /// Hostel and accommodation issues.
    Hostel,
    /// Mess and catering issues.
    Mess,
    /// Courses, grading, and teaching.
    Academics,
    /// Buildings, utilities, and equipment.
    Infrastructure,
}

impl GrievanceCategory {
    /// Parse form input leniently; unknown values fall back to `General`
    /// because the intake form only offers the fixed set.
    pub fn from_form(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "hostel" => Self::Hostel,
            "mess" => Self::Mess,
            "academics" => Self::Academics,
            "infrastructure" => Self::Infrastructure,
            _ => Self::General,
        }
    }
}

/// Validation errors returned by the grievance constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrievanceValidationError {
    /// Title was blank once trimmed.
    EmptyTitle,
    /// Description was blank once trimmed.
    EmptyDescription,
}

impl fmt::Display for GrievanceValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::EmptyDescription => write!(f, "description must not be empty"),
        }
    }
}

impl std::error::Error for GrievanceValidationError {}

impl From<GrievanceValidationError> for Error {
    fn from(value: GrievanceValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// Validated input for filing a grievance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrievanceDraft {
    title: String,
    category: GrievanceCategory,
    description: String,
}

impl GrievanceDraft {
    /// Validate and construct a draft.
    pub fn new(
        title: &str,
        category: GrievanceCategory,
        description: &str,
    ) -> Result<Self, GrievanceValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(GrievanceValidationError::EmptyTitle);
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(GrievanceValidationError::EmptyDescription);
        }
        Ok(Self {
            title: title.to_owned(),
            category,
            description: description.to_owned(),
        })
    }

    /// The trimmed title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The chosen category.
    pub const fn category(&self) -> GrievanceCategory {
        self.category
    }

    /// The trimmed description.
    pub fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrievanceDoc {
    title: String,
    category: GrievanceCategory,
    description: String,
    created_by: UserId,
    created_by_email: EmailAddress,
    status: GrievanceStatus,
    assigned_to: Option<UserId>,
    created_at: DateTime<Utc>,
}

/// A persisted grievance.
#[derive(Debug, Clone, PartialEq)]
pub struct Grievance {
    /// Store identifier.
    pub id: DocumentId,
    /// Short summary entered at intake.
    pub title: String,
    /// Intake category.
    pub category: GrievanceCategory,
    /// Full description.
    pub description: String,
    /// The filing user.
    pub created_by: UserId,
    /// Email of the filing user at intake time.
    pub created_by_email: EmailAddress,
    /// Current lifecycle state; always equal to the newest timeline entry's
    /// `new_status` once the append transaction commits.
    pub status: GrievanceStatus,
    /// Assigned handler, if any.
    pub assigned_to: Option<UserId>,
    /// Store-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Grievance {
    /// Decode a stored grievance document.
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let decoded: GrievanceDoc = serde_json::from_value(doc.to_value())
            .map_err(|err| Error::internal(format!("malformed grievance document: {err}")))?;
        Ok(Self {
            id: doc.id.clone(),
            title: decoded.title,
            category: decoded.category,
            description: decoded.description,
            created_by: decoded.created_by,
            created_by_email: decoded.created_by_email,
            status: decoded.status,
            assigned_to: decoded.assigned_to,
            created_at: decoded.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrievanceUpdateDoc {
    by: UserId,
    comment: String,
    new_status: GrievanceStatus,
    created_at: DateTime<Utc>,
}

/// One entry in a grievance's append-only timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GrievanceUpdate {
    /// Store identifier.
    pub id: DocumentId,
    /// The acting handler or admin.
    pub by: UserId,
    /// Free-text remark explaining the transition.
    pub comment: String,
    /// Status the parent grievance moved to with this entry.
    pub new_status: GrievanceStatus,
    /// Store-assigned creation timestamp; the timeline reads in ascending
    /// order of this value.
    pub created_at: DateTime<Utc>,
}

impl GrievanceUpdate {
    /// Decode a stored timeline entry.
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let decoded: GrievanceUpdateDoc = serde_json::from_value(doc.to_value())
            .map_err(|err| Error::internal(format!("malformed grievance update: {err}")))?;
        Ok(Self {
            id: doc.id.clone(),
            by: decoded.by,
            comment: decoded.comment,
            new_status: decoded.new_status,
            created_at: decoded.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "desc", GrievanceValidationError::EmptyTitle)]
    #[case("   ", "desc", GrievanceValidationError::EmptyTitle)]
    #[case("title", "", GrievanceValidationError::EmptyDescription)]
    #[case("title", "  ", GrievanceValidationError::EmptyDescription)]
    fn drafts_require_title_and_description(
        #[case] title: &str,
        #[case] description: &str,
        #[case] expected: GrievanceValidationError,
    ) {
        let err = GrievanceDraft::new(title, GrievanceCategory::General, description)
            .expect_err("invalid drafts must fail");
        assert_eq!(err, expected);
    }

    #[test]
    fn drafts_trim_their_inputs() {
        let draft = GrievanceDraft::new("  Broken AC  ", GrievanceCategory::Hostel, " no cooling ")
            .expect("valid draft");
        assert_eq!(draft.title(), "Broken AC");
        assert_eq!(draft.description(), "no cooling");
    }

    #[rstest]
    #[case("Hostel", GrievanceCategory::Hostel)]
    #[case("academics", GrievanceCategory::Academics)]
    #[case("unknown", GrievanceCategory::General)]
    fn categories_parse_leniently(#[case] input: &str, #[case] expected: GrievanceCategory) {
        assert_eq!(GrievanceCategory::from_form(input), expected);
    }

    #[test]
    fn status_serialises_snake_case() {
        let encoded = serde_json::to_string(&GrievanceStatus::InReview).expect("serialise");
        assert_eq!(encoded, "\"in_review\"");
    }
}
