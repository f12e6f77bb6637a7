//! PostgreSQL adapter for pond storage.
//!
//! This adapter is the durable source of truth. The counter bump and the edge
//! append share one transaction, and conversation creation serializes on
//! per-member advisory locks so two concurrent match searches cannot both
//! claim the same candidate.

use crate::traits::{ConversationStore, InvitationStore, MemberStore};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pond_types::{Conversation, ConversationId, InvitationEdge, Member, MemberId, PhoneHandle};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

const COUNTER_KEY: &str = "invites";

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresPondStorage {
    pool: PgPool,
}

impl PostgresPondStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    ///
    /// `connect_timeout_secs` also bounds every statement on pooled
    /// connections, so no storage call can hang a request indefinitely.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let statement_timeout_ms = connect_timeout_secs.saturating_mul(1000);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(connect_timeout_secs))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query(&format!("SET statement_timeout = {statement_timeout_ms}"))
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS pond_members (
                id TEXT PRIMARY KEY,
                phone TEXT NOT NULL UNIQUE,
                created TIMESTAMPTZ NOT NULL,
                muted BOOLEAN NOT NULL DEFAULT FALSE,
                report_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS pond_counter (
                id TEXT PRIMARY KEY,
                value BIGINT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS pond_invitations (
                edge_id BIGSERIAL PRIMARY KEY,
                inviter TEXT NOT NULL,
                invitee TEXT NOT NULL,
                sequence BIGINT NOT NULL,
                created TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS pond_invitations_inviter_idx ON pond_invitations (inviter, sequence DESC)",
            "CREATE INDEX IF NOT EXISTS pond_invitations_invitee_idx ON pond_invitations (invitee, sequence DESC)",
            "CREATE INDEX IF NOT EXISTS pond_invitations_sequence_idx ON pond_invitations (sequence DESC, edge_id DESC)",
            r#"
            CREATE TABLE IF NOT EXISTS pond_conversations (
                id UUID PRIMARY KEY,
                member_a TEXT NOT NULL,
                member_b TEXT NOT NULL,
                created TIMESTAMPTZ NOT NULL,
                last_message_at TIMESTAMPTZ NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS pond_conversations_a_idx ON pond_conversations (member_a)",
            "CREATE INDEX IF NOT EXISTS pond_conversations_b_idx ON pond_conversations (member_b)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }

        sqlx::query("INSERT INTO pond_counter (id, value) VALUES ($1, 0) ON CONFLICT (id) DO NOTHING")
            .bind(COUNTER_KEY)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("counter init failed: {e}")))?;

        tracing::debug!("pond schema ready");
        Ok(())
    }
}

#[async_trait]
impl MemberStore for PostgresPondStorage {
    async fn get_member(&self, id: &MemberId) -> StorageResult<Option<Member>> {
        let row = sqlx::query(
            "SELECT id, phone, created, muted, report_count FROM pond_members WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(member_row_to_record).transpose()
    }

    async fn get_member_by_phone(&self, phone: &PhoneHandle) -> StorageResult<Option<Member>> {
        let row = sqlx::query(
            "SELECT id, phone, created, muted, report_count FROM pond_members WHERE phone = $1",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(member_row_to_record).transpose()
    }

    async fn create_member(
        &self,
        phone: &PhoneHandle,
        created: DateTime<Utc>,
    ) -> StorageResult<Member> {
        let member = Member::new(phone.clone(), created);
        sqlx::query(
            r#"
            INSERT INTO pond_members (id, phone, created, muted, report_count)
            VALUES ($1, $2, $3, FALSE, 0)
            "#,
        )
        .bind(member.id.as_str())
        .bind(member.phone.as_str())
        .bind(member.created)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(member)
    }

    async fn delete_member(&self, id: &MemberId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM pond_members WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_muted(&self, id: &MemberId, muted: bool) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE pond_members SET muted = $1 WHERE id = $2")
            .bind(muted)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_report_count(&self, id: &MemberId) -> StorageResult<bool> {
        let result =
            sqlx::query("UPDATE pond_members SET report_count = report_count + 1 WHERE id = $1")
                .bind(id.as_str())
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl InvitationStore for PostgresPondStorage {
    async fn append_invitation(
        &self,
        inviter: &MemberId,
        invitee: &MemberId,
        step: i64,
        created: DateTime<Utc>,
    ) -> StorageResult<InvitationEdge> {
        if step <= 0 {
            return Err(StorageError::InvalidInput(format!(
                "invitation step must be positive, got {step}"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let sequence: i64 = sqlx::query(
            "UPDATE pond_counter SET value = value + $1 WHERE id = $2 RETURNING value",
        )
        .bind(step)
        .bind(COUNTER_KEY)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .try_get("value")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO pond_invitations (inviter, invitee, sequence, created)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(inviter.as_str())
        .bind(invitee.as_str())
        .bind(sequence)
        .bind(created)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // Dropping an uncommitted transaction rolls the counter bump back.
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(InvitationEdge {
            inviter: inviter.clone(),
            invitee: invitee.clone(),
            sequence,
            created,
        })
    }

    async fn max_sequence_as_inviter(
        &self,
        member: &MemberId,
        min_exclusive: i64,
    ) -> StorageResult<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT sequence FROM pond_invitations
             WHERE inviter = $1 AND sequence > $2
             ORDER BY sequence DESC
             LIMIT 1
            "#,
        )
        .bind(member.as_str())
        .bind(min_exclusive)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|r| r.try_get::<i64, _>("sequence"))
            .transpose()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn max_sequence_as_invitee(
        &self,
        member: &MemberId,
        min_exclusive: i64,
    ) -> StorageResult<Option<i64>> {
        let row = sqlx::query(
            r#"
            SELECT sequence FROM pond_invitations
             WHERE invitee = $1 AND sequence > $2
             ORDER BY sequence DESC
             LIMIT 1
            "#,
        )
        .bind(member.as_str())
        .bind(min_exclusive)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|r| r.try_get::<i64, _>("sequence"))
            .transpose()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn recent_invitations(&self, limit: usize) -> StorageResult<Vec<InvitationEdge>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT inviter, invitee, sequence, created
              FROM pond_invitations
             ORDER BY sequence DESC, edge_id DESC
             LIMIT $1
            "#,
        )
        .bind(to_i64(limit)?)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(invitation_row_to_record).collect()
    }

    async fn counter(&self) -> StorageResult<i64> {
        sqlx::query("SELECT value FROM pond_counter WHERE id = $1")
            .bind(COUNTER_KEY)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .try_get("value")
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn adjust_counter(&self, delta: i64) -> StorageResult<i64> {
        sqlx::query("UPDATE pond_counter SET value = value + $1 WHERE id = $2 RETURNING value")
            .bind(delta)
            .bind(COUNTER_KEY)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .try_get("value")
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

#[async_trait]
impl ConversationStore for PostgresPondStorage {
    async fn conversations_for_member(
        &self,
        member: &MemberId,
    ) -> StorageResult<Vec<Conversation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, member_a, member_b, created, last_message_at
              FROM pond_conversations
             WHERE member_a = $1 OR member_b = $1
             ORDER BY created ASC
            "#,
        )
        .bind(member.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(conversation_row_to_record).collect()
    }

    async fn create_conversation_if_idle(
        &self,
        member_a: &MemberId,
        member_b: &MemberId,
        now: DateTime<Utc>,
    ) -> StorageResult<Conversation> {
        if member_a == member_b {
            return Err(StorageError::InvalidInput(format!(
                "member {member_a} cannot talk to themselves"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Lock in a stable order so two searches racing on the same pair
        // cannot deadlock each other.
        let mut lock_order = [member_a.as_str(), member_b.as_str()];
        lock_order.sort_unstable();
        for member in lock_order {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(member)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        let busy: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS busy FROM pond_conversations
             WHERE member_a IN ($1, $2) OR member_b IN ($1, $2)
            "#,
        )
        .bind(member_a.as_str())
        .bind(member_b.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .try_get("busy")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if busy > 0 {
            return Err(StorageError::Conflict(format!(
                "{member_a} or {member_b} is already in a conversation"
            )));
        }

        let conversation = Conversation::new(member_a.clone(), member_b.clone(), now);
        sqlx::query(
            r#"
            INSERT INTO pond_conversations (id, member_a, member_b, created, last_message_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(*conversation.id.as_uuid())
        .bind(conversation.member_a.as_str())
        .bind(conversation.member_b.as_str())
        .bind(conversation.created)
        .bind(conversation.last_message_at)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(conversation)
    }

    async fn delete_conversation(&self, id: &ConversationId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM pond_conversations WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn touch_conversation(
        &self,
        id: &ConversationId,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE pond_conversations SET last_message_at = $1 WHERE id = $2")
            .bind(at)
            .bind(*id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

fn member_row_to_record(row: PgRow) -> StorageResult<Member> {
    let report_count: i32 = row
        .try_get("report_count")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    Ok(Member {
        id: MemberId::new(
            row.try_get::<String, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        phone: PhoneHandle::new(
            row.try_get::<String, _>("phone")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        created: row
            .try_get("created")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        muted: row
            .try_get("muted")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        report_count: u32::try_from(report_count)
            .map_err(|_| StorageError::Serialization(format!("negative report count {report_count}")))?,
    })
}

fn invitation_row_to_record(row: PgRow) -> StorageResult<InvitationEdge> {
    Ok(InvitationEdge {
        inviter: MemberId::new(
            row.try_get::<String, _>("inviter")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        invitee: MemberId::new(
            row.try_get::<String, _>("invitee")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        sequence: row
            .try_get("sequence")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created: row
            .try_get("created")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn conversation_row_to_record(row: PgRow) -> StorageResult<Conversation> {
    Ok(Conversation {
        id: ConversationId::from_uuid(
            row.try_get::<Uuid, _>("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        member_a: MemberId::new(
            row.try_get::<String, _>("member_a")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        member_b: MemberId::new(
            row.try_get::<String, _>("member_b")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        created: row
            .try_get("created")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        last_message_at: row
            .try_get("last_message_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::PoolTimedOut => return StorageError::Timeout(err.to_string()),
        sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
            Some("23505") => return StorageError::Conflict(db_err.message().to_string()),
            // query_canceled, raised when statement_timeout fires
            Some("57014") => return StorageError::Timeout(db_err.message().to_string()),
            _ => {}
        },
        _ => {}
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::InvalidInput("limit too large".to_string()))
}
