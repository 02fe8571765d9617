//! The two user-facing languages the scanner seeds into its first user
//! message. Per spec §9's open question: language affects only
//! user-visible strings; stage ids, tool names, and report fields stay
//! English regardless.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Zh,
    En,
}

impl Default for Language {
    fn default() -> Self {
        Language::Zh
    }
}
