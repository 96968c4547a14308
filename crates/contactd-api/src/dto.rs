// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Transfer shape of a contact. `id` is absent on a blank create form and
/// always present once the store has persisted the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub number: String,
}

impl ContactDto {
    /// The blank form template rendered by the create-form entry point.
    #[must_use]
    pub fn blank() -> Self {
        Self {
            id: None,
            name: String::new(),
            number: String::new(),
        }
    }
}

/// Create/edit submission payload. Identity comes from the route path on
/// edit and from the store on create; the `id` field only exists because
/// clients round-trip the blank form template, so an absent or empty value
/// is accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub number: String,
}

impl ContactForm {
    /// The body id a client actually asserted, if any. Absent and empty
    /// values both mean "store decides".
    #[must_use]
    pub fn asserted_id(&self) -> Option<&str> {
        self.id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListStatsDto {
    pub returned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactListDto {
    pub api_version: String,
    pub items: Vec<ContactDto>,
    pub stats: ListStatsDto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_accepts_absent_and_empty_id_as_unasserted() {
        let absent: ContactForm =
            serde_json::from_str(r#"{"name":"Alice","number":"555-0100"}"#).expect("absent id");
        assert_eq!(absent.asserted_id(), None);

        let empty: ContactForm =
            serde_json::from_str(r#"{"id":"","name":"Alice","number":"555-0100"}"#)
                .expect("empty id");
        assert_eq!(empty.asserted_id(), None);

        let blank: ContactForm =
            serde_json::from_str(r#"{"id":"  ","name":"Alice","number":"555-0100"}"#)
                .expect("whitespace id");
        assert_eq!(blank.asserted_id(), None);
    }

    #[test]
    fn form_reports_a_nonempty_body_id() {
        let form: ContactForm =
            serde_json::from_str(r#"{"id":"contact-7","name":"Alice","number":"555-0100"}"#)
                .expect("asserted id");
        assert_eq!(form.asserted_id(), Some("contact-7"));
    }
}
