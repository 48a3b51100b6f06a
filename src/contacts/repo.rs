use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::contacts::repo_types::{Contact, ContactFields, ContactFilter};

const CONTACT_COLUMNS: &str = "id, user_id, first_name, last_name, email, phone, birthday, \
     address, created_at, updated_at";

// Single-row statements bind the contact id as $1 and the owner as $2.

fn find_sql() -> String {
    format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1 AND user_id = $2")
}

fn list_all_sql() -> String {
    format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = $1 ORDER BY created_at, id")
}

fn update_sql() -> String {
    format!(
        "UPDATE contacts SET first_name = $3, last_name = $4, email = $5, phone = $6, \
         birthday = $7, address = $8, updated_at = now() \
         WHERE id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}"
    )
}

fn delete_sql() -> String {
    format!("DELETE FROM contacts WHERE id = $1 AND user_id = $2 RETURNING {CONTACT_COLUMNS}")
}

/// Substring pattern for `LIKE`, with the pattern metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Owner-scoped search; every present filter adds an `AND <column> LIKE`.
fn search_query(
    user_id: Uuid,
    filter: &ContactFilter<'_>,
    offset: i64,
    limit: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut qb =
        QueryBuilder::<Postgres>::new(format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE user_id = "));
    qb.push_bind(user_id);

    for (column, value) in [
        ("first_name", filter.first_name),
        ("last_name", filter.last_name),
        ("email", filter.email),
    ] {
        if let Some(value) = value {
            qb.push(format!(" AND {column} LIKE "))
                .push_bind(like_pattern(value));
        }
    }

    qb.push(" ORDER BY created_at, id OFFSET ")
        .push_bind(offset)
        .push(" LIMIT ")
        .push_bind(limit);
    qb
}

impl Contact {
    pub async fn search(
        db: &PgPool,
        user_id: Uuid,
        filter: &ContactFilter<'_>,
        offset: i64,
        limit: i64,
    ) -> anyhow::Result<Vec<Contact>> {
        let rows = search_query(user_id, filter, offset, limit)
            .build_query_as::<Contact>()
            .fetch_all(db)
            .await
            .context("search contacts")?;
        Ok(rows)
    }

    /// Every contact of the owner in retrieval order.
    pub async fn list_all(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query_as::<_, Contact>(&list_all_sql())
            .bind(user_id)
            .fetch_all(db)
            .await
            .context("list contacts")?;
        Ok(rows)
    }

    pub async fn find(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&find_sql())
            .bind(id)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn create(db: &PgPool, user_id: Uuid, fields: &ContactFields) -> anyhow::Result<Contact> {
        let sql = format!(
            "INSERT INTO contacts (user_id, first_name, last_name, email, phone, birthday, address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {CONTACT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Contact>(&sql)
            .bind(user_id)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.email)
            .bind(&fields.phone)
            .bind(fields.birthday)
            .bind(&fields.address)
            .fetch_one(db)
            .await?;
        Ok(row)
    }

    /// Full replace. `None` when the contact does not exist for this owner.
    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        fields: &ContactFields,
    ) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&update_sql())
            .bind(id)
            .bind(user_id)
            .bind(&fields.first_name)
            .bind(&fields.last_name)
            .bind(&fields.email)
            .bind(&fields.phone)
            .bind(fields.birthday)
            .bind(&fields.address)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Contact>> {
        let row = sqlx::query_as::<_, Contact>(&delete_sql())
            .bind(id)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
        Ok(row)
    }
}
