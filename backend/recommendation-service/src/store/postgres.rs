use super::CatalogStore;
use crate::error::{AppError, Result};
use crate::models::{
    Artwork, ArtworkId, ArtworkSimilarity, BehaviorEvent, InteractionKind, NewInteraction,
    Placement, Recommendation, UserId, UserSimilarity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::{Json, JsonValue};
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;

const ARTWORK_SELECT: &str = r#"
    SELECT a.id, a.title, a.description, a.style, a.theme, a.primary_color,
           a.popularity::FLOAT8 AS popularity,
           COALESCE(
               array_agg(t.tag ORDER BY t.tag) FILTER (WHERE t.tag IS NOT NULL),
               ARRAY[]::TEXT[]
           ) AS tags
    FROM artworks a
    LEFT JOIN artwork_tags t ON t.artwork_id = a.id
"#;

const BEHAVIOR_COLUMNS: &str = r#"
    id, user_id, artwork_id, interaction_type, timestamp,
    duration::BIGINT AS duration_secs, rating::SMALLINT AS rating, context
"#;

/// Makes `%`, `_` and `\` match literally inside an `ILIKE ... ESCAPE '\'` pattern.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, FromRow)]
struct ArtworkRow {
    id: i64,
    title: String,
    description: Option<String>,
    style: Option<String>,
    theme: Option<String>,
    primary_color: Option<String>,
    popularity: f64,
    tags: Vec<String>,
}

impl From<ArtworkRow> for Artwork {
    fn from(row: ArtworkRow) -> Self {
        Artwork {
            id: row.id,
            title: row.title,
            description: row.description,
            style: row.style,
            theme: row.theme,
            primary_color: row.primary_color,
            tags: row.tags.into_iter().collect(),
            popularity: row.popularity.max(0.0),
        }
    }
}

#[derive(Debug, FromRow)]
struct BehaviorRow {
    id: i64,
    user_id: i64,
    artwork_id: i64,
    interaction_type: String,
    timestamp: DateTime<Utc>,
    duration_secs: i64,
    rating: Option<i16>,
    context: JsonValue,
}

impl TryFrom<BehaviorRow> for BehaviorEvent {
    type Error = AppError;

    fn try_from(row: BehaviorRow) -> Result<Self> {
        let kind = row
            .interaction_type
            .parse::<InteractionKind>()
            .map_err(AppError::Database)?;
        let context = match row.context {
            JsonValue::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        Ok(BehaviorEvent {
            id: row.id,
            user_id: row.user_id,
            artwork_id: row.artwork_id,
            kind,
            timestamp: row.timestamp,
            duration_secs: row.duration_secs,
            rating: row.rating,
            context,
        })
    }
}

#[derive(Debug, FromRow)]
struct UserSimilarityRow {
    user_a: i64,
    user_b: i64,
    score: f64,
    algorithm: String,
    common_interactions: i32,
    features: JsonValue,
}

impl From<UserSimilarityRow> for UserSimilarity {
    fn from(row: UserSimilarityRow) -> Self {
        UserSimilarity {
            user_a: row.user_a,
            user_b: row.user_b,
            score: row.score.clamp(0.0, 1.0),
            algorithm: row.algorithm,
            common_interactions: row.common_interactions,
            features: row.features,
        }
    }
}

fn kind_names(kinds: &[InteractionKind]) -> Vec<String> {
    kinds.iter().map(|k| k.as_str().to_string()).collect()
}

/// Postgres-backed catalog and behavior store
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_artworks(
        &self,
        sql: String,
        ids: Vec<i64>,
        limit: i64,
    ) -> Result<Vec<Artwork>> {
        let rows = sqlx::query_as::<_, ArtworkRow>(&sql)
            .bind(ids)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Artwork::from).collect())
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_artwork(&self, id: ArtworkId) -> Result<Option<Artwork>> {
        let mut artworks = self.get_artworks(&[id]).await?;
        Ok(artworks.pop())
    }

    async fn get_artworks(&self, ids: &[ArtworkId]) -> Result<Vec<Artwork>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "{} WHERE a.id = ANY($1) GROUP BY a.id ORDER BY a.id LIMIT $2",
            ARTWORK_SELECT
        );
        self.fetch_artworks(sql, ids.to_vec(), ids.len() as i64).await
    }

    async fn list_artworks(
        &self,
        exclude: &HashSet<ArtworkId>,
        limit: usize,
    ) -> Result<Vec<Artwork>> {
        let sql = format!(
            "{} WHERE NOT (a.id = ANY($1)) GROUP BY a.id ORDER BY a.id LIMIT $2",
            ARTWORK_SELECT
        );
        self.fetch_artworks(sql, exclude.iter().copied().collect(), limit as i64)
            .await
    }

    async fn search_artworks(&self, term: &str, limit: usize) -> Result<Vec<Artwork>> {
        let sql = format!(
            r#"{}
            WHERE a.theme ILIKE $1 ESCAPE '\' OR a.style ILIKE $1 ESCAPE '\'
               OR EXISTS (
                   SELECT 1 FROM artwork_tags st
                   WHERE st.artwork_id = a.id AND st.tag ILIKE $1 ESCAPE '\'
               )
            GROUP BY a.id
            ORDER BY a.id
            LIMIT $2"#,
            ARTWORK_SELECT
        );
        let pattern = format!("%{}%", escape_like(term.trim()));

        let rows = sqlx::query_as::<_, ArtworkRow>(&sql)
            .bind(pattern)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Artwork::from).collect())
    }

    async fn get_user_favorites(&self, user: UserId) -> Result<Vec<ArtworkId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT artwork_id FROM user_favorites
            WHERE user_id = $1
            ORDER BY added_at ASC, artwork_id ASC
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn get_user_viewed(&self, user: UserId) -> Result<HashSet<ArtworkId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT artwork_id FROM user_views
            WHERE user_id = $1
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn get_search_history(&self, user: UserId) -> Result<Vec<String>> {
        let terms: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT term FROM user_search_history
            WHERE user_id = $1
            ORDER BY searched_at ASC
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(terms)
    }

    async fn get_behaviors(
        &self,
        user: UserId,
        kinds: &[InteractionKind],
    ) -> Result<Vec<BehaviorEvent>> {
        let sql = format!(
            r#"SELECT {} FROM user_behaviors
            WHERE user_id = $1 AND interaction_type = ANY($2)
            ORDER BY timestamp DESC, id DESC"#,
            BEHAVIOR_COLUMNS
        );

        let rows = sqlx::query_as::<_, BehaviorRow>(&sql)
            .bind(user)
            .bind(kind_names(kinds))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(BehaviorEvent::try_from).collect()
    }

    async fn get_user_similarities(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<UserSimilarity>> {
        let rows = sqlx::query_as::<_, UserSimilarityRow>(
            r#"
            SELECT user1_id AS user_a, user2_id AS user_b,
                   similarity_score::FLOAT8 AS score, algorithm,
                   common_interactions, features
            FROM user_similarities
            WHERE user1_id = $1 OR user2_id = $1
            ORDER BY similarity_score DESC
            LIMIT $2
            "#,
        )
        .bind(user)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserSimilarity::from).collect())
    }

    async fn find_latest_behavior(
        &self,
        user: UserId,
        artwork: ArtworkId,
        kind: InteractionKind,
    ) -> Result<Option<BehaviorEvent>> {
        let sql = format!(
            r#"SELECT {} FROM user_behaviors
            WHERE user_id = $1 AND artwork_id = $2 AND interaction_type = $3
            ORDER BY timestamp DESC, id DESC
            LIMIT 1"#,
            BEHAVIOR_COLUMNS
        );

        let row = sqlx::query_as::<_, BehaviorRow>(&sql)
            .bind(user)
            .bind(artwork)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(BehaviorEvent::try_from).transpose()
    }

    async fn insert_behavior(
        &self,
        interaction: &NewInteraction,
        at: DateTime<Utc>,
    ) -> Result<BehaviorEvent> {
        let sql = format!(
            r#"INSERT INTO user_behaviors
                (user_id, artwork_id, interaction_type, timestamp, duration, rating, context)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}"#,
            BEHAVIOR_COLUMNS
        );

        let row = sqlx::query_as::<_, BehaviorRow>(&sql)
            .bind(interaction.user_id)
            .bind(interaction.artwork_id)
            .bind(interaction.kind.as_str())
            .bind(at)
            .bind(interaction.duration_secs)
            .bind(interaction.rating)
            .bind(Json(&interaction.context))
            .fetch_one(&self.pool)
            .await?;

        BehaviorEvent::try_from(row)
    }

    async fn update_behavior(&self, event: &BehaviorEvent) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_behaviors
            SET duration = $2, rating = $3, context = $4
            WHERE id = $1
            "#,
        )
        .bind(event.id)
        .bind(event.duration_secs)
        .bind(event.rating)
        .bind(Json(&event.context))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("behavior {}", event.id)));
        }
        Ok(())
    }

    async fn list_users_with_interactions(
        &self,
        kinds: &[InteractionKind],
        limit: usize,
    ) -> Result<Vec<UserId>> {
        let users: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT user_id FROM user_behaviors
            WHERE interaction_type = ANY($1)
            ORDER BY user_id
            LIMIT $2
            "#,
        )
        .bind(kind_names(kinds))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn upsert_user_similarity(&self, row: &UserSimilarity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_similarities
                (user1_id, user2_id, similarity_score, algorithm, common_interactions,
                 features, calculated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (user1_id, user2_id, algorithm) DO UPDATE
            SET similarity_score = EXCLUDED.similarity_score,
                common_interactions = EXCLUDED.common_interactions,
                features = EXCLUDED.features,
                calculated_at = EXCLUDED.calculated_at
            "#,
        )
        .bind(row.user_a)
        .bind(row.user_b)
        .bind(row.score)
        .bind(&row.algorithm)
        .bind(row.common_interactions)
        .bind(Json(&row.features))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_artwork_similarity(&self, row: &ArtworkSimilarity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artwork_similarities
                (artwork1_id, artwork2_id, similarity_score, algorithm, similarity_type,
                 features, calculated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (artwork1_id, artwork2_id, algorithm, similarity_type) DO UPDATE
            SET similarity_score = EXCLUDED.similarity_score,
                features = EXCLUDED.features,
                calculated_at = EXCLUDED.calculated_at
            "#,
        )
        .bind(row.artwork_a)
        .bind(row.artwork_b)
        .bind(row.score)
        .bind(&row.algorithm)
        .bind(row.similarity_type.as_str())
        .bind(Json(&row.features))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_recommendations(
        &self,
        user: UserId,
        recommendations: &[Recommendation],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM artwork_recommendations WHERE user_id = $1")
            .bind(user)
            .execute(&mut *tx)
            .await?;

        for rec in recommendations {
            sqlx::query(
                r#"
                INSERT INTO artwork_recommendations
                    (user_id, artwork_id, score, algorithm, reason, created_at,
                     expires_at, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(rec.user_id)
            .bind(rec.artwork_id)
            .bind(rec.score)
            .bind(&rec.algorithm)
            .bind(&rec.reason)
            .bind(rec.created_at)
            .bind(rec.expires_at)
            .bind(rec.is_active)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn save_layout(&self, resource: &str, placements: &[Placement]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM gallery_layouts WHERE resource = $1")
            .bind(resource)
            .execute(&mut *tx)
            .await?;

        for placement in placements {
            sqlx::query(
                r#"
                INSERT INTO gallery_layouts
                    (resource, artwork_id, position, rotation, scale, group_label)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(resource)
            .bind(placement.artwork_id)
            .bind(Json(&placement.position))
            .bind(Json(&placement.rotation))
            .bind(placement.scale)
            .bind(placement.group.as_deref())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_treats_wildcards_literally() {
        assert_eq!(escape_like("seascape"), "seascape");
        assert_eq!(escape_like("_"), r"\_");
        assert_eq!(escape_like("100%"), r"100\%");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(format!("%{}%", escape_like("blue_period")), r"%blue\_period%");
    }
}
