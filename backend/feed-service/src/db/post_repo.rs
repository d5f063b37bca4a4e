use crate::models::Post;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const POST_COLUMNS: &str = "id, author_id, organization_id, feed_type, content, image_key, \
     pdf_key, video_key, video_preview_key, group_id, event_id, link_preview, tags, \
     created_at, updated_at, deleted_at";

/// Fields of a post to be inserted. Media keys may hold pending placeholders
/// that are rewritten once the background upload finishes.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: Uuid,
    pub organization_id: Uuid,
    pub feed_type: String,
    pub content: String,
    pub image_key: Option<String>,
    pub pdf_key: Option<String>,
    pub video_key: Option<String>,
    pub video_preview_key: Option<String>,
    pub group_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub link_preview: Option<serde_json::Value>,
    pub tags: Vec<String>,
}

/// Search filters for the feed listing. `query` holds already-split OR terms.
#[derive(Debug, Clone, Default)]
pub struct PostSearch {
    pub feed_type: Option<String>,
    pub organization_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub event_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub terms: Vec<String>,
    pub viewer: Option<Uuid>,
    pub staff: bool,
    pub limit: i64,
    pub offset: i64,
}

pub async fn create_post(
    tx: &mut Transaction<'_, Postgres>,
    new: &NewPost,
) -> Result<Post, sqlx::Error> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (author_id, organization_id, feed_type, content, image_key,
                           pdf_key, video_key, video_preview_key, group_id, event_id,
                           link_preview, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id, author_id, organization_id, feed_type, content, image_key,
                  pdf_key, video_key, video_preview_key, group_id, event_id,
                  link_preview, tags, created_at, updated_at, deleted_at
        "#,
    )
    .bind(new.author_id)
    .bind(new.organization_id)
    .bind(&new.feed_type)
    .bind(&new.content)
    .bind(&new.image_key)
    .bind(&new.pdf_key)
    .bind(&new.video_key)
    .bind(&new.video_preview_key)
    .bind(new.group_id)
    .bind(new.event_id)
    .bind(&new.link_preview)
    .bind(&new.tags)
    .fetch_one(&mut **tx)
    .await?;

    Ok(post)
}

/// Find a post by ID (excluding soft-deleted posts)
pub async fn find_post_by_id(pool: &PgPool, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND deleted_at IS NULL"
    );
    let post = sqlx::query_as::<_, Post>(&sql)
        .bind(post_id)
        .fetch_optional(pool)
        .await?;

    Ok(post)
}

/// Update the text content of a post
pub async fn update_post_content(
    tx: &mut Transaction<'_, Postgres>,
    post_id: Uuid,
    content: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET content = $1, updated_at = NOW()
        WHERE id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(content)
    .bind(post_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Soft delete a post
pub async fn soft_delete_post(pool: &PgPool, post_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE posts
        SET deleted_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(post_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Search visible posts, newest first.
///
/// Rejected posts are hidden from everyone. Non-staff viewers additionally
/// only see approved posts plus their own.
pub async fn search_posts(pool: &PgPool, search: &PostSearch) -> Result<Vec<Post>, sqlx::Error> {
    let posts = search_query(search)
        .build_query_as::<Post>()
        .fetch_all(pool)
        .await?;

    Ok(posts)
}

fn search_query(search: &PostSearch) -> QueryBuilder<'static, Postgres> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT p.id, p.author_id, p.organization_id, p.feed_type, p.content, \
         p.image_key, p.pdf_key, p.video_key, p.video_preview_key, p.group_id, \
         p.event_id, p.link_preview, p.tags, p.created_at, p.updated_at, p.deleted_at \
         FROM posts p \
         LEFT JOIN post_moderation m ON m.post_id = p.id \
         WHERE p.deleted_at IS NULL \
         AND COALESCE(m.status, 'pending') <> 'rejected'",
    );

    if !search.staff {
        qb.push(" AND (m.status = 'approved'");
        if let Some(viewer) = search.viewer {
            qb.push(" OR p.author_id = ").push_bind(viewer);
        }
        qb.push(")");
    }

    if let Some(feed_type) = &search.feed_type {
        qb.push(" AND p.feed_type = ").push_bind(feed_type.clone());
    }
    if let Some(org_id) = search.organization_id {
        qb.push(" AND p.organization_id = ").push_bind(org_id);
    }
    if let Some(group_id) = search.group_id {
        qb.push(" AND p.group_id = ").push_bind(group_id);
    }
    if let Some(event_id) = search.event_id {
        qb.push(" AND p.event_id = ").push_bind(event_id);
    }
    if !search.tags.is_empty() {
        qb.push(" AND p.tags && ").push_bind(search.tags.clone());
    }
    if let Some(from) = search.created_from {
        qb.push(" AND p.created_at >= ").push_bind(from);
    }
    if let Some(to) = search.created_to {
        qb.push(" AND p.created_at <= ").push_bind(to);
    }

    // Free-text terms are OR-ed; the words inside a term must all match,
    // each against the content or a tag substring.
    if !search.terms.is_empty() {
        qb.push(" AND (");
        for (i, term) in search.terms.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(");
            for (j, word) in term.split_whitespace().enumerate() {
                if j > 0 {
                    qb.push(" AND ");
                }
                let pattern = format!("%{}%", word);
                qb.push("(p.content ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR EXISTS (SELECT 1 FROM unnest(p.tags) AS tag WHERE tag ILIKE ")
                    .push_bind(pattern)
                    .push("))");
            }
            qb.push(")");
        }
        qb.push(")");
    }

    qb.push(" ORDER BY p.created_at DESC LIMIT ")
        .push_bind(search.limit)
        .push(" OFFSET ")
        .push_bind(search.offset);

    qb
}

/// Rewrite the image placeholder of every post referencing a pending upload.
pub async fn resolve_pending_image(
    tx: &mut Transaction<'_, Postgres>,
    placeholder: &str,
    key: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET image_key = $1, updated_at = NOW()
        WHERE image_key = $2
        "#,
    )
    .bind(key)
    .bind(placeholder)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Rewrite the pdf placeholder of every post referencing a pending upload.
pub async fn resolve_pending_pdf(
    tx: &mut Transaction<'_, Postgres>,
    placeholder: &str,
    key: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET pdf_key = $1, updated_at = NOW()
        WHERE pdf_key = $2
        "#,
    )
    .bind(key)
    .bind(placeholder)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Rewrite the video placeholder, attaching the extracted preview frame when
/// one was produced.
pub async fn resolve_pending_video(
    tx: &mut Transaction<'_, Postgres>,
    placeholder: &str,
    key: &str,
    preview_key: Option<&str>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE posts
        SET video_key = $1, video_preview_key = COALESCE($2, video_preview_key),
            updated_at = NOW()
        WHERE video_key = $3
        "#,
    )
    .bind(key)
    .bind(preview_key)
    .bind(placeholder)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

/// Recent posts carrying a given tag within one organization.
pub async fn recent_posts_with_tag(
    pool: &PgPool,
    organization_id: Uuid,
    tag: &str,
    limit: i64,
) -> Result<Vec<Post>, sqlx::Error> {
    let sql = format!(
        "SELECT {POST_COLUMNS} FROM posts \
         WHERE organization_id = $1 AND $2 = ANY(tags) AND deleted_at IS NULL \
         ORDER BY created_at DESC LIMIT $3"
    );
    let posts = sqlx::query_as::<_, Post>(&sql)
        .bind(organization_id)
        .bind(tag)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search_with_terms(terms: &[&str]) -> PostSearch {
        PostSearch {
            terms: terms.iter().map(|t| t.to_string()).collect(),
            limit: 20,
            ..PostSearch::default()
        }
    }

    #[test]
    fn words_inside_a_term_are_all_required() {
        let sql = search_query(&search_with_terms(&["town hall"])).into_sql();

        // Two word conditions joined by AND, each matching content or a tag.
        assert_eq!(sql.matches("p.content ILIKE").count(), 2);
        assert_eq!(sql.matches(" AND (p.content ILIKE").count(), 1);
        assert_eq!(sql.matches("unnest(p.tags)").count(), 2);
    }

    #[test]
    fn terms_are_alternatives() {
        let sql = search_query(&search_with_terms(&["music", "festival"])).into_sql();

        assert_eq!(sql.matches("p.content ILIKE").count(), 2);
        assert_eq!(sql.matches(") OR (").count(), 1);
    }

    #[test]
    fn rejected_posts_are_always_filtered() {
        let sql = search_query(&search_with_terms(&[])).into_sql();
        assert!(sql.contains("COALESCE(m.status, 'pending') <> 'rejected'"));
    }
}
