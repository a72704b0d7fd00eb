use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::locator::Locator;

/// A named rendezvous node. The identity is always the locator's signer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub name: String,
    pub locator: Locator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Root {
    pub fn identity(&self) -> &Identity {
        self.locator.identity()
    }
}
