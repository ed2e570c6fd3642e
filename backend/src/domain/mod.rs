//! Domain layer of the campus hub workflow engine.
//!
//! Entities, the role decision table, and the workflow services live here,
//! behind ports that adapters implement in `outbound`. Nothing in this
//! layer talks to a concrete store or identity backend directly.

mod bulletin_service;
mod bulletins;
mod directory;
mod error;
mod grievance_service;
mod grievances;
mod identity;
mod opportunities;
mod opportunity_service;
mod policy;
pub mod ports;
mod role;
mod session;
pub(crate) mod storage;
mod tags;
mod user;

pub use bulletin_service::BulletinService;
pub use bulletins::{
    ANNOUNCEMENTS_COLLECTION, Announcement, AnnouncementDraft, BulletinValidationError, CourseCode,
    LinkUrl, RESOURCES_COLLECTION, Resource, ResourceDraft, ResourceType,
};
pub use directory::DirectoryService;
pub use error::{Error, ErrorCode, ErrorValidationError};
pub use grievance_service::GrievanceService;
pub use grievances::{
    GRIEVANCES_COLLECTION, Grievance, GrievanceCategory, GrievanceDraft, GrievanceStatus,
    GrievanceUpdate, GrievanceValidationError, updates_collection,
};
pub use identity::IdentityService;
pub use opportunity_service::OpportunityService;
pub use opportunities::{
    Application, ApplicationStatus, OPPORTUNITIES_COLLECTION, Opportunity, OpportunityDraft,
    OpportunityValidationError, applications_collection,
};
pub use policy::{Action, GrievanceScope, authorize, permits};
pub use role::Role;
pub use session::{Principal, Session};
pub use tags::{TAG_LIMIT, TagList, TagListError};
pub use user::{DisplayName, EmailAddress, USERS_COLLECTION, User, UserId, UserValidationError};
