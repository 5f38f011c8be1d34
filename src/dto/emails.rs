//! Data of the mailing list and campaign pages.

use serde::Serialize;

use crate::domain::emails::{EmailSending, LightWeightEmail};
use crate::domain::entity::CremeEntity;

#[derive(Debug, Default, Serialize)]
pub struct MailingListPageData {
    pub contacts: Vec<CremeEntity>,
    pub organisations: Vec<CremeEntity>,
    pub children: Vec<CremeEntity>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct CampaignPageData {
    pub mailing_lists: Vec<CremeEntity>,
    pub sendings: Vec<EmailSending>,
    /// Addresses a new sending would reach.
    pub recipients_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SendingPageData {
    pub sending: EmailSending,
    pub campaign: CremeEntity,
    pub mails: Vec<LightWeightEmail>,
}
