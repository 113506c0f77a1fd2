//! Conversation transcript database operations

use super::{format_timestamp, parse_timestamp, parse_uuid};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool};
use utamemo_common::models::{Conversation, Message, MessageRole};
use utamemo_common::Result;
use uuid::Uuid;

pub async fn insert_conversation<'e, E>(executor: E, conversation: &Conversation) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO conversations (id, user_id, song_id, title, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(conversation.id.to_string())
        .bind(&conversation.user_id)
        .bind(conversation.song_id.map(|id| id.to_string()))
        .bind(&conversation.title)
        .bind(format_timestamp(&conversation.created_at))
        .execute(executor)
        .await?;

    Ok(())
}

pub async fn insert_message<'e, E>(executor: E, message: &Message) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO messages (id, conversation_id, seq, role, content, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(message.id.to_string())
    .bind(message.conversation_id.to_string())
    .bind(i64::from(message.seq))
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(format_timestamp(&message.created_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Conversation row plus all its messages
pub async fn insert_transcript(
    conn: &mut SqliteConnection,
    conversation: &Conversation,
    messages: &[Message],
) -> Result<()> {
    insert_conversation(&mut *conn, conversation).await?;
    for message in messages {
        insert_message(&mut *conn, message).await?;
    }
    Ok(())
}

pub async fn get_conversation(pool: &SqlitePool, id: Uuid) -> Result<Option<Conversation>> {
    let row = sqlx::query("SELECT id, user_id, song_id, title, created_at FROM conversations WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(conversation_from_row).transpose()
}

/// Conversations recorded for a song, oldest first
pub async fn list_conversations_for_song(pool: &SqlitePool, song_id: Uuid) -> Result<Vec<Conversation>> {
    let rows = sqlx::query(
        "SELECT id, user_id, song_id, title, created_at FROM conversations
         WHERE song_id = ? ORDER BY created_at, rowid",
    )
    .bind(song_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(conversation_from_row).collect()
}

/// Messages of a conversation in sequence order
pub async fn list_messages(pool: &SqlitePool, conversation_id: Uuid) -> Result<Vec<Message>> {
    let rows = sqlx::query(
        "SELECT id, conversation_id, seq, role, content, created_at FROM messages
         WHERE conversation_id = ? ORDER BY seq",
    )
    .bind(conversation_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(message_from_row).collect()
}

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation> {
    let id: String = row.get("id");
    let song_id: Option<String> = row.get("song_id");
    let created_at: String = row.get("created_at");

    Ok(Conversation {
        id: parse_uuid(&id)?,
        user_id: row.get("user_id"),
        song_id: song_id.as_deref().map(parse_uuid).transpose()?,
        title: row.get("title"),
        created_at: parse_timestamp(&created_at)?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let id: String = row.get("id");
    let conversation_id: String = row.get("conversation_id");
    let seq: i64 = row.get("seq");
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");

    Ok(Message {
        id: parse_uuid(&id)?,
        conversation_id: parse_uuid(&conversation_id)?,
        seq: seq as u32,
        role: role.parse::<MessageRole>()?,
        content: row.get("content"),
        created_at: parse_timestamp(&created_at)?,
    })
}
