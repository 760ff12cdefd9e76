use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum UiLanguage {
    #[default]
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "en")]
    English,
}

impl UiLanguage {
    pub fn code(self) -> &'static str {
        match self {
            UiLanguage::Arabic => "ar",
            UiLanguage::English => "en",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ar" => Some(UiLanguage::Arabic),
            "en" => Some(UiLanguage::English),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            UiLanguage::Arabic => UiLanguage::English,
            UiLanguage::English => UiLanguage::Arabic,
        }
    }
}

/// User-facing messages produced while resolving an id or link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveMessage {
    InvalidInput,
    BacklogItemNotFound(u64),
    UnrecognizedItem(u64),
}

impl ResolveMessage {
    pub fn localized(&self, language: UiLanguage) -> String {
        match (self, language) {
            (ResolveMessage::InvalidInput, UiLanguage::Arabic) => {
                "من فضلك أدخل رقم أو رابط صحيح.".to_string()
            }
            (ResolveMessage::InvalidInput, UiLanguage::English) => {
                "Please enter a valid id or link.".to_string()
            }
            (ResolveMessage::BacklogItemNotFound(id), UiLanguage::Arabic) => {
                format!("لم يتم إيجاد الـ Product Backlog Item برقم {}.", id)
            }
            (ResolveMessage::BacklogItemNotFound(id), UiLanguage::English) => {
                format!("Product Backlog Item {} was not found.", id)
            }
            (ResolveMessage::UnrecognizedItem(id), UiLanguage::Arabic) => {
                format!("لم يتم التعرف على نوع العنصر برقم {}.", id)
            }
            (ResolveMessage::UnrecognizedItem(id), UiLanguage::English) => {
                format!("The type of work item {} was not recognized.", id)
            }
        }
    }
}
