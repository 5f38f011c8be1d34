//! Data of the billing document pages.

use serde::Serialize;

use crate::domain::billing::{BillingStatus, Line};
use crate::domain::entity::{CremeEntity, EntityKind};

/// Billing specific parts of a document detail page.
#[derive(Debug, Serialize)]
pub struct DocumentExtras {
    pub lines: Vec<Line>,
    pub statuses: Vec<BillingStatus>,
    pub emitter: Option<CremeEntity>,
    pub receiver: Option<CremeEntity>,
    /// Kinds the document may be converted into.
    pub conversions: Vec<EntityKind>,
}
