use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Discriminator stored in every contact document body.
pub const DOC_TYPE: &str = "Contact";

pub const ID_MAX_LEN: usize = 128;
pub const NAME_MAX_LEN: usize = 256;

/// Store-assigned document identity. Lives in store metadata (the document
/// key), never in the document body, and is immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ContactId(String);

impl ContactId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("contact id must not be empty".to_string()));
        }
        if s.len() > ID_MAX_LEN {
            return Err(ValidationError(format!(
                "contact id exceeds max length {ID_MAX_LEN}"
            )));
        }
        if s.chars().any(|c| c.is_ascii_control() || c == '/') {
            return Err(ValidationError(
                "contact id must not contain control characters or '/'".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for ContactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The persisted document body. The identity is deliberately absent here;
/// it travels as the store key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDocument {
    pub name: String,
    pub number: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
}

impl ContactDocument {
    #[must_use]
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            doc_type: DOC_TYPE.to_string(),
        }
    }

    #[must_use]
    pub fn is_contact(&self) -> bool {
        self.doc_type == DOC_TYPE
    }
}

/// A contact record as the rest of the system sees it: identity plus the
/// user-supplied fields. `id` is `None` until the store assigns one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: Option<ContactId>,
    pub name: String,
    pub number: String,
}

impl Contact {
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError("contact name must not be empty".to_string()));
        }
        if trimmed.len() > NAME_MAX_LEN {
            return Err(ValidationError(format!(
                "contact name exceeds max length {NAME_MAX_LEN}"
            )));
        }
        Ok(Self {
            id: None,
            name: trimmed.to_string(),
            number: number.into().trim().to_string(),
        })
    }

    #[must_use]
    pub fn with_id(mut self, id: ContactId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn to_document(&self) -> ContactDocument {
        ContactDocument::new(self.name.clone(), self.number.clone())
    }

    pub fn from_document(id: ContactId, doc: ContactDocument) -> Result<Self, ValidationError> {
        if !doc.is_contact() {
            return Err(ValidationError(format!(
                "document {id} has discriminator {:?}, expected {DOC_TYPE:?}",
                doc.doc_type
            )));
        }
        Ok(Self {
            id: Some(id),
            name: doc.name,
            number: doc.number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_id_rejects_empty_and_slash() {
        assert!(ContactId::parse("   ").is_err());
        assert!(ContactId::parse("a/b").is_err());
        let id = ContactId::parse(" contact-1 ").expect("trimmed id");
        assert_eq!(id.as_str(), "contact-1");
    }

    #[test]
    fn contact_id_enforces_max_length() {
        let long = "x".repeat(ID_MAX_LEN + 1);
        assert!(ContactId::parse(&long).is_err());
        assert!(ContactId::parse(&"x".repeat(ID_MAX_LEN)).is_ok());
    }

    #[test]
    fn new_contact_has_no_identity_and_trims_fields() {
        let c = Contact::new(" Alice ", " 555-0100 ").expect("valid contact");
        assert!(c.id.is_none());
        assert_eq!(c.name, "Alice");
        assert_eq!(c.number, "555-0100");
    }

    #[test]
    fn blank_name_is_a_validation_error() {
        assert!(Contact::new("   ", "555").is_err());
    }

    #[test]
    fn document_body_carries_discriminator_but_never_the_id() {
        let c = Contact::new("Alice", "555-0100").expect("contact");
        let doc = c.to_document();
        assert!(doc.is_contact());
        let body = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(body["type"], DOC_TYPE);
        assert!(body.get("id").is_none());
    }

    #[test]
    fn from_document_rejects_foreign_discriminators() {
        let id = ContactId::parse("contact-1").expect("id");
        let mut doc = ContactDocument::new("Alice", "555-0100");
        doc.doc_type = "Airline".to_string();
        assert!(Contact::from_document(id.clone(), doc).is_err());

        let ok = Contact::from_document(id, ContactDocument::new("Alice", "555-0100"))
            .expect("contact document");
        assert_eq!(ok.name, "Alice");
        assert!(ok.id.is_some());
    }
}
