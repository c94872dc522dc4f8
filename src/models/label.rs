//! Label records

use serde::{Deserialize, Serialize};

/// One label from the labels dump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: u64,
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub profile: Option<String>,
    pub data_quality: Option<String>,
    pub urls: Vec<String>,
    pub sub_labels: Vec<LabelRef>,
    /// Reference by id only, not a pointer back into the graph.
    pub parent_label: Option<LabelRef>,
}

/// Reference to another label (sublabels, parent label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRef {
    pub id: u64,
    pub name: String,
}

impl Label {
    pub(super) fn unset_field(&mut self, field: &str) -> bool {
        match field {
            "name" => self.name = None,
            "contact_info" => self.contact_info = None,
            "profile" => self.profile = None,
            "data_quality" => self.data_quality = None,
            "urls" => self.urls.clear(),
            "sub_labels" => self.sub_labels.clear(),
            "parent_label" => self.parent_label = None,
            _ => return false,
        }
        true
    }
}
