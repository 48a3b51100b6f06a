use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::services::{check_length, is_valid_email},
    contacts::repo_types::{Contact, ContactFields, ContactFilter},
    error::ApiError,
};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 1000;

/// Create / full-replace payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactModel {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(with = "iso_date")]
    pub birthday: Date,
    #[serde(default)]
    pub address: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ContactModel {
    /// Trims input, drops blank optionals and checks field bounds.
    pub fn into_fields(self) -> Result<ContactFields, ApiError> {
        let first_name = self.first_name.trim().to_string();
        let last_name = self.last_name.trim().to_string();
        check_length("first_name", &first_name, 2, 150)?;
        check_length("last_name", &last_name, 2, 150)?;

        let email = non_blank(self.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                return Err(ApiError::bad_request("Invalid email address"));
            }
        }
        let phone = non_blank(self.phone);
        if let Some(phone) = &phone {
            check_length("phone", phone, 1, 30)?;
        }
        let address = non_blank(self.address);
        if let Some(address) = &address {
            check_length("address", address, 1, 150)?;
        }

        Ok(ContactFields {
            first_name,
            last_name,
            email,
            phone,
            birthday: self.birthday,
            address,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(with = "iso_date")]
    pub birthday: Date,
    pub address: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub user_id: Uuid,
}

impl From<Contact> for ContactResponse {
    fn from(c: Contact) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone: c.phone,
            birthday: c.birthday,
            address: c.address,
            created_at: c.created_at,
            updated_at: c.updated_at,
            user_id: c.user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Pagination {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.offset < 0 {
            return Err(ApiError::bad_request("offset must be greater than or equal to 0"));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(ApiError::bad_request(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
        Ok(())
    }
}

/// Query string of `GET /contacts`.
#[derive(Debug, Deserialize)]
pub struct ContactSearch {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ContactSearch {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            offset: self.offset,
            limit: self.limit,
        }
    }

    pub fn filter(&self) -> ContactFilter<'_> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }
        ContactFilter {
            first_name: present(&self.first_name),
            last_name: present(&self.last_name),
            email: present(&self.email),
        }
    }
}
