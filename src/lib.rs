//! Read-side listing of running content tests.
//!
//! Given a host page, [`TestListing`] enumerates the tests currently running
//! against it, resolves each one's configuration, estimates how many days it
//! still needs, measures the winning experience's effect and returns one
//! sorted, paginated page of [`TestSummary`] records.
//!
//! Every lookup goes through the collaborator traits in
//! [`optimization::collaborators`]. [`SnapshotCatalog`] and
//! [`PowerAnalysisEstimator`] are reference implementations backed by JSON
//! snapshot files.

pub mod catalog;
pub mod error;
pub mod optimization;
pub mod settings;
pub mod types;

pub use catalog::SnapshotCatalog;
pub use error::{CollaboratorError, ListingError, Result};
pub use optimization::collaborators::Collaborators;
pub use optimization::effect::EffectClass;
pub use optimization::listing::{ActiveTestsQuery, TestListPage, TestListing, TestSummary};
pub use optimization::power::PowerAnalysisEstimator;
pub use settings::ListingSettings;
pub use types::{ItemId, ItemUri};
