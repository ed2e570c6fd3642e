//! Announcements and course resources posted to the campus bulletin board.
//!
//! Both are write-once in this core: posting-manager roles create them and
//! every authenticated session reads them; no edit or delete operation
//! exists.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::ports::{Document, DocumentId};
use crate::domain::{EmailAddress, Error, TagList, UserId};

/// Name of the announcements collection in the document store.
pub const ANNOUNCEMENTS_COLLECTION: &str = "announcements";

/// Name of the resources collection in the document store.
pub const RESOURCES_COLLECTION: &str = "resources";

/// Validation errors returned by the bulletin constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulletinValidationError {
    /// Title was blank once trimmed.
    EmptyTitle,
    /// Announcement body was blank once trimmed.
    EmptyBody,
    /// Course code was blank once trimmed.
    EmptyCourseCode,
    /// The link did not parse as an http or https URL.
    InvalidLink,
}

impl fmt::Display for BulletinValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::EmptyBody => write!(f, "content must not be empty"),
            Self::EmptyCourseCode => write!(f, "course code must not be empty"),
            Self::InvalidLink => write!(f, "link must be a valid http or https URL"),
        }
    }
}

impl std::error::Error for BulletinValidationError {}

impl From<BulletinValidationError> for Error {
    fn from(value: BulletinValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// An http/https link attached to a post.
///
/// # Examples
/// ```
/// use campushub_backend::domain::LinkUrl;
///
/// assert!(LinkUrl::new("https://forms.example.edu/f/1").is_ok());
/// assert!(LinkUrl::new("ftp://example.edu/file").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkUrl(String);

impl LinkUrl {
    /// Validate a link, accepting only http and https schemes.
    pub fn new(link: &str) -> Result<Self, BulletinValidationError> {
        let trimmed = link.trim();
        let parsed = Url::parse(trimmed).map_err(|_| BulletinValidationError::InvalidLink)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BulletinValidationError::InvalidLink);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Validate optional form input; blank means no link.
    pub fn from_optional(link: &str) -> Result<Option<Self>, BulletinValidationError> {
        let trimmed = link.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Self::new(trimmed).map(Some)
    }
}

impl AsRef<str> for LinkUrl {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for LinkUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<LinkUrl> for String {
    fn from(value: LinkUrl) -> Self {
        value.0
    }
}

impl TryFrom<String> for LinkUrl {
    type Error = BulletinValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

/// Validated input for posting an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementDraft {
    title: String,
    body: String,
    tags: TagList,
    pinned: bool,
    link_url: Option<LinkUrl>,
}

impl AnnouncementDraft {
    /// Validate and construct a draft.
    pub fn new(
        title: &str,
        body: &str,
        tags: TagList,
        pinned: bool,
        link_url: Option<LinkUrl>,
    ) -> Result<Self, BulletinValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BulletinValidationError::EmptyTitle);
        }
        let body = body.trim();
        if body.is_empty() {
            return Err(BulletinValidationError::EmptyBody);
        }
        Ok(Self {
            title: title.to_owned(),
            body: body.to_owned(),
            tags,
            pinned,
            link_url,
        })
    }

    /// The trimmed title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The trimmed body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Tags attached to the announcement.
    pub const fn tags(&self) -> &TagList {
        &self.tags
    }

    /// Whether the announcement is pinned.
    pub const fn pinned(&self) -> bool {
        self.pinned
    }

    /// Optional validated link.
    pub const fn link_url(&self) -> Option<&LinkUrl> {
        self.link_url.as_ref()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnouncementDoc {
    title: String,
    body: String,
    tags: TagList,
    pinned: bool,
    link_url: Option<LinkUrl>,
    posted_by: UserId,
    posted_by_email: EmailAddress,
    created_at: DateTime<Utc>,
}

/// A persisted announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    /// Store identifier.
    pub id: DocumentId,
    /// Headline.
    pub title: String,
    /// Announcement body.
    pub body: String,
    /// Tags attached at posting time.
    pub tags: TagList,
    /// Pinned announcements sort to the top of the board UI.
    pub pinned: bool,
    /// Optional validated link.
    pub link_url: Option<LinkUrl>,
    /// The posting manager who created it.
    pub posted_by: UserId,
    /// Email of the poster at posting time.
    pub posted_by_email: EmailAddress,
    /// Store-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Announcement {
    /// Decode a stored announcement document.
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let decoded: AnnouncementDoc = serde_json::from_value(doc.to_value())
            .map_err(|err| Error::internal(format!("malformed announcement document: {err}")))?;
        Ok(Self {
            id: doc.id.clone(),
            title: decoded.title,
            body: decoded.body,
            tags: decoded.tags,
            pinned: decoded.pinned,
            link_url: decoded.link_url,
            posted_by: decoded.posted_by,
            posted_by_email: decoded.posted_by_email,
            created_at: decoded.created_at,
        })
    }
}

/// Resource kinds offered by the upload form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceType {
    /// Lecture notes.
    Notes,
    /// Slide decks.
    Slides,
    /// Assignment sheets.
    Assignment,
    /// Lab material.
    Lab,
    /// Anything else.
    Other,
}

impl ResourceType {
    /// Parse form input leniently; unknown values fall back to `Other`.
    pub fn from_form(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "notes" => Self::Notes,
            "slides" => Self::Slides,
            "assignment" => Self::Assignment,
            "lab" => Self::Lab,
            _ => Self::Other,
        }
    }
}

/// Upper-cased course code such as `CS201`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CourseCode(String);

impl CourseCode {
    /// Trim and upper-case a course code.
    pub fn new(code: &str) -> Result<Self, BulletinValidationError> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(BulletinValidationError::EmptyCourseCode);
        }
        Ok(Self(trimmed.to_uppercase()))
    }
}

impl AsRef<str> for CourseCode {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CourseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<CourseCode> for String {
    fn from(value: CourseCode) -> Self {
        value.0
    }
}

impl TryFrom<String> for CourseCode {
    type Error = BulletinValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

/// Validated input for uploading a link-backed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDraft {
    title: String,
    course_code: CourseCode,
    kind: ResourceType,
    description: String,
    link_url: LinkUrl,
}

impl ResourceDraft {
    /// Validate and construct a draft. The description is optional; the
    /// link is required because file uploads are handled elsewhere.
    pub fn new(
        title: &str,
        course_code: &str,
        kind: ResourceType,
        description: &str,
        link_url: &str,
    ) -> Result<Self, BulletinValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BulletinValidationError::EmptyTitle);
        }
        Ok(Self {
            title: title.to_owned(),
            course_code: CourseCode::new(course_code)?,
            kind,
            description: description.trim().to_owned(),
            link_url: LinkUrl::new(link_url)?,
        })
    }

    /// The trimmed title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The normalised course code.
    pub const fn course_code(&self) -> &CourseCode {
        &self.course_code
    }

    /// The resource kind.
    pub const fn kind(&self) -> ResourceType {
        self.kind
    }

    /// The trimmed description, possibly empty.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The validated link.
    pub const fn link_url(&self) -> &LinkUrl {
        &self.link_url
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceDoc {
    title: String,
    course_code: CourseCode,
    #[serde(rename = "type")]
    kind: ResourceType,
    description: String,
    is_file: bool,
    #[serde(default)]
    link_url: Option<String>,
    #[serde(default)]
    file_url: Option<String>,
    uploaded_by: UserId,
    uploaded_by_email: EmailAddress,
    created_at: DateTime<Utc>,
}

/// A persisted course resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Store identifier.
    pub id: DocumentId,
    /// Resource title.
    pub title: String,
    /// Normalised course code.
    pub course_code: CourseCode,
    /// Resource kind.
    pub kind: ResourceType,
    /// Optional description.
    pub description: String,
    /// Whether the resource is a stored file rather than a link.
    pub is_file: bool,
    /// External link, present when `is_file` is false.
    pub link_url: Option<String>,
    /// Stored-file URL, present when `is_file` is true.
    pub file_url: Option<String>,
    /// The posting manager who uploaded it.
    pub uploaded_by: UserId,
    /// Email of the uploader at upload time.
    pub uploaded_by_email: EmailAddress,
    /// Store-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// Decode a stored resource document.
    pub fn from_document(doc: &Document) -> Result<Self, Error> {
        let decoded: ResourceDoc = serde_json::from_value(doc.to_value())
            .map_err(|err| Error::internal(format!("malformed resource document: {err}")))?;
        Ok(Self {
            id: doc.id.clone(),
            title: decoded.title,
            course_code: decoded.course_code,
            kind: decoded.kind,
            description: decoded.description,
            is_file: decoded.is_file,
            link_url: decoded.link_url,
            file_url: decoded.file_url,
            uploaded_by: decoded.uploaded_by,
            uploaded_by_email: decoded.uploaded_by_email,
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
    #[case("https://forms.example.edu/f/1", true)]
    #[case("http://example.edu/doc.pdf", true)]
    #[case("ftp://example.edu/file", false)]
    #[case("javascript:alert(1)", false)]
    #[case("not a url", false)]
    fn links_accept_only_http_schemes(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(LinkUrl::new(input).is_ok(), valid);
    }

    #[test]
    fn optional_links_treat_blank_as_none() {
        assert_eq!(LinkUrl::from_optional("   ").expect("blank is fine"), None);
        LinkUrl::from_optional("nonsense").expect_err("junk must fail");
    }

    #[test]
    fn course_codes_are_uppercased() {
        let code = CourseCode::new("  cs201 ").expect("valid code");
        assert_eq!(code.as_ref(), "CS201");
        CourseCode::new("  ").expect_err("blank must fail");
    }

    #[rstest]
    #[case("Slides", ResourceType::Slides)]
    #[case("lab", ResourceType::Lab)]
    #[case("mystery", ResourceType::Other)]
    fn resource_types_parse_leniently(#[case] input: &str, #[case] expected: ResourceType) {
        assert_eq!(ResourceType::from_form(input), expected);
    }

    #[test]
    fn announcement_drafts_require_title_and_body() {
        AnnouncementDraft::new("", "body", TagList::default(), false, None)
            .expect_err("empty title must fail");
        AnnouncementDraft::new("title", "  ", TagList::default(), false, None)
            .expect_err("empty body must fail");
    }
}
