use serde::{Deserialize, Serialize};

/// Bilingual text value as stored on clinic catalog records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Multilingual {
    pub ar: String,
    pub en: String,
}

impl Multilingual {
    pub fn new(ar: impl Into<String>, en: impl Into<String>) -> Self {
        Self {
            ar: ar.into(),
            en: en.into(),
        }
    }
}
