// SPDX-License-Identifier: Apache-2.0

use crate::dto::{ContactDto, ContactListDto, ListStatsDto};
use crate::API_VERSION;
use contactd_model::Contact;

#[must_use]
pub fn contact_dto(contact: &Contact) -> ContactDto {
    ContactDto {
        id: contact.id.as_ref().map(|id| id.as_str().to_string()),
        name: contact.name.clone(),
        number: contact.number.clone(),
    }
}

#[must_use]
pub fn contact_list_dto(contacts: &[Contact]) -> ContactListDto {
    let items: Vec<ContactDto> = contacts.iter().map(contact_dto).collect();
    ContactListDto {
        api_version: API_VERSION.to_string(),
        stats: ListStatsDto {
            returned: items.len(),
        },
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactd_model::ContactId;

    #[test]
    fn persisted_contact_projects_its_store_id() {
        let contact = Contact::new("Alice", "555-0100")
            .expect("contact")
            .with_id(ContactId::parse("contact-1").expect("id"));
        let dto = contact_dto(&contact);
        assert_eq!(dto.id.as_deref(), Some("contact-1"));
        assert_eq!(dto.name, "Alice");
        assert_eq!(dto.number, "555-0100");
    }

    #[test]
    fn list_dto_counts_returned_rows() {
        let contacts = vec![
            Contact::new("Alice", "555-0100").expect("contact"),
            Contact::new("Bob", "555-0101").expect("contact"),
        ];
        let dto = contact_list_dto(&contacts);
        assert_eq!(dto.stats.returned, 2);
        assert_eq!(dto.api_version, "v1");
    }
}
