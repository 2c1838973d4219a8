//! SurrealDB implementation of [`CatalogStore`].
//!
//! Catalog ids are human-readable slugs chosen by the operator, so the
//! record id is the catalog id itself.

use chrono::{DateTime, Utc};
use custos_core::error::CustosResult;
use custos_core::models::catalog::{Catalog, CreateCatalog};
use custos_core::store::CatalogStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct CatalogRow {
    name: String,
    description: String,
    owner_group_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CatalogRowWithId {
    record_id: String,
    name: String,
    description: String,
    owner_group_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_owner(owner_group_id: Option<String>) -> Result<Option<Uuid>, DbError> {
    owner_group_id
        .map(|id| {
            Uuid::parse_str(&id)
                .map_err(|e| DbError::Decode(format!("invalid owner group UUID: {e}")))
        })
        .transpose()
}

fn row_to_catalog(row: CatalogRow, id: String) -> Result<Catalog, DbError> {
    Ok(Catalog {
        id,
        name: row.name,
        description: row.description,
        owner_group_id: parse_owner(row.owner_group_id)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl CatalogRowWithId {
    fn try_into_catalog(self) -> Result<Catalog, DbError> {
        Ok(Catalog {
            id: self.record_id,
            name: self.name,
            description: self.description,
            owner_group_id: parse_owner(self.owner_group_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Catalog store.
#[derive(Clone)]
pub struct SurrealCatalogStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCatalogStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CatalogStore for SurrealCatalogStore<C> {
    async fn create(&self, input: CreateCatalog) -> CustosResult<Catalog> {
        let id = input.id.clone();

        let result = self
            .db
            .query(
                "CREATE type::record('catalog', $id) SET \
                 name = $name, description = $description, \
                 owner_group_id = $owner_group_id",
            )
            .bind(("id", id.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind((
                "owner_group_id",
                input.owner_group_id.map(|g| g.to_string()),
            ))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<CatalogRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "catalog".into(),
            id: id.clone(),
        })?;

        Ok(row_to_catalog(row, id)?)
    }

    async fn get_by_id(&self, id: &str) -> CustosResult<Option<Catalog>> {
        let id_owned = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('catalog', $id)")
            .bind(("id", id_owned.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CatalogRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row_to_catalog(row, id_owned)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> CustosResult<Vec<Catalog>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM catalog \
                 ORDER BY created_at ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CatalogRowWithId> = result.take(0).map_err(DbError::from)?;

        let catalogs = rows
            .into_iter()
            .map(|row| row.try_into_catalog())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(catalogs)
    }
}
