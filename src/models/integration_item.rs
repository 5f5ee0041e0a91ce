use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provider resource in provider-independent form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationItem {
    pub id: String,
    /// Source and kind tag, e.g. `hubspot_contact`.
    #[serde(rename = "type")]
    pub item_type: String,
    pub name: String,
    pub creation_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    pub url: Option<String>,
}
