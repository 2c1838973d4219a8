//! SurrealDB implementation of [`GroupStore`].
//!
//! Memberships are `member_of` relation edges from `user` to `group`
//! with the member's role stored on the edge.

use chrono::{DateTime, Utc};
use custos_core::error::CustosResult;
use custos_core::models::group::{
    CreateGroup, Group, GroupMembership, GroupNotificationBinding, GroupRole, UpdateGroup,
};
use custos_core::store::GroupStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    description: String,
    member_added_notifications: Vec<serde_json::Value>,
    approval_request_notifications: Vec<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    name: String,
    description: String,
    member_added_notifications: Vec<serde_json::Value>,
    approval_request_notifications: Vec<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Row struct for membership edges.
#[derive(Debug, SurrealValue)]
struct MembershipRow {
    user_id: String,
    role: String,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn role_to_str(role: GroupRole) -> &'static str {
    match role {
        GroupRole::Owner => "Owner",
        GroupRole::Member => "Member",
    }
}

fn parse_role(s: &str) -> Result<GroupRole, DbError> {
    match s {
        "Owner" => Ok(GroupRole::Owner),
        "Member" => Ok(GroupRole::Member),
        other => Err(DbError::Decode(format!("unknown group role: {other}"))),
    }
}

fn encode_bindings(bindings: Vec<GroupNotificationBinding>) -> Result<Vec<serde_json::Value>, DbError> {
    bindings
        .into_iter()
        .map(|binding| {
            serde_json::to_value(binding)
                .map_err(|e| DbError::Decode(format!("notification binding: {e}")))
        })
        .collect()
}

fn decode_bindings(values: Vec<serde_json::Value>) -> Result<Vec<GroupNotificationBinding>, DbError> {
    values
        .into_iter()
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|e| DbError::Decode(format!("notification binding: {e}")))
        })
        .collect()
}

fn row_to_group(row: GroupRow, id: Uuid) -> Result<Group, DbError> {
    Ok(Group {
        id,
        name: row.name,
        description: row.description,
        member_added_notifications: decode_bindings(row.member_added_notifications)?,
        approval_request_notifications: decode_bindings(row.approval_request_notifications)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<Group, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid group UUID: {e}")))?;
        Ok(Group {
            id,
            name: self.name,
            description: self.description,
            member_added_notifications: decode_bindings(self.member_added_notifications)?,
            approval_request_notifications: decode_bindings(self.approval_request_notifications)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// SurrealDB implementation of the Group store.
#[derive(Clone)]
pub struct SurrealGroupStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> GroupStore for SurrealGroupStore<C> {
    async fn create(&self, input: CreateGroup) -> CustosResult<Group> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let member_added = encode_bindings(input.member_added_notifications)?;
        let approval_request = encode_bindings(input.approval_request_notifications)?;

        let result = self
            .db
            .query(
                "CREATE type::record('group', $id) SET \
                 name = $name, description = $description, \
                 member_added_notifications = $member_added, \
                 approval_request_notifications = $approval_request",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("member_added", member_added))
            .bind(("approval_request", approval_request))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row_to_group(row, id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> CustosResult<Option<Group>> {
        let mut result = self
            .db
            .query("SELECT * FROM type::record('group', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row_to_group(row, id)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> CustosResult<Group> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.member_added_notifications.is_some() {
            sets.push("member_added_notifications = $member_added");
        }
        if input.approval_request_notifications.is_some() {
            sets.push("approval_request_notifications = $approval_request");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('group', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(bindings) = input.member_added_notifications {
            builder = builder.bind(("member_added", encode_bindings(bindings)?));
        }
        if let Some(bindings) = input.approval_request_notifications {
            builder = builder.bind(("approval_request", encode_bindings(bindings)?));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "group".into(),
            id: id_str,
        })?;

        Ok(row_to_group(row, id)?)
    }

    async fn delete(&self, id: Uuid) -> CustosResult<()> {
        let id_str = id.to_string();

        // Delete associated membership edges first, then the group record.
        let query = format!(
            "DELETE member_of WHERE out = group:`{id_str}`; \
             DELETE type::record('group', $id);"
        );

        self.db
            .query(query)
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self) -> CustosResult<Vec<Group>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 ORDER BY created_at ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;

        let groups = rows
            .into_iter()
            .map(|row| row.try_into_group())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(groups)
    }

    async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
    ) -> CustosResult<()> {
        let user_id_str = user_id.to_string();
        let group_id_str = group_id.to_string();

        let query =
            format!("RELATE user:`{user_id_str}` -> member_of -> group:`{group_id_str}` SET role = $role;");

        self.db
            .query(query)
            .bind(("role", role_to_str(role)))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(())
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> CustosResult<()> {
        self.db
            .query(
                "DELETE member_of WHERE \
                 in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn get_membership(
        &self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> CustosResult<Option<GroupMembership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(in) AS user_id, role FROM member_of \
                 WHERE in = type::record('user', $user_id) AND \
                 out = type::record('group', $group_id)",
            )
            .bind(("user_id", user_id.to_string()))
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(GroupMembership {
                group_id,
                user_id,
                role: parse_role(&row.role)?,
            })),
            None => Ok(None),
        }
    }

    async fn count_members(&self, group_id: Uuid) -> CustosResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM member_of \
                 WHERE out = type::record('group', $group_id) GROUP ALL",
            )
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn list_members(&self, group_id: Uuid) -> CustosResult<Vec<GroupMembership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(in) AS user_id, role FROM member_of \
                 WHERE out = type::record('group', $group_id)",
            )
            .bind(("group_id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;

        let memberships = rows
            .into_iter()
            .map(|row| {
                let user_id = Uuid::parse_str(&row.user_id)
                    .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
                Ok(GroupMembership {
                    group_id,
                    user_id,
                    role: parse_role(&row.role)?,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(memberships)
    }
}
