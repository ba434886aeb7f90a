use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Album, AlbumMember, AlbumRole, Image, NewImage, NewUser, User};
use super::store::{strips_last_owner, AlbumImageStats, Store, LAST_OWNER};
use crate::pagination::{PageRequest, Position};

const USER_COLUMNS: &str = "id, email, password_hash, name, avatar_url, onboarded, created_at";
const IMAGE_COLUMNS: &str = "i.id, i.user_id, i.url, i.storage_key, i.filename, i.content_type, \
     i.size_bytes, i.width, i.height, i.derived_from, i.effects, i.created_at";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations in `migrations/`
    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn parse_role(raw: &str) -> Result<AlbumRole, DatabaseError> {
    raw.parse().map_err(DatabaseError::QueryError)
}

/// Locks the album row for the rest of the transaction and returns its owners.
/// Concurrent membership changes on the same album queue behind the lock.
async fn lock_owners(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    album_id: Uuid,
) -> Result<Vec<Uuid>, DatabaseError> {
    let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM albums WHERE id = $1 FOR UPDATE")
        .bind(album_id)
        .fetch_optional(&mut **tx)
        .await?;
    if locked.is_none() {
        return Err(DatabaseError::NotFound("Album not found".to_string()));
    }

    let owners = sqlx::query_scalar("SELECT user_id FROM album_members WHERE album_id = $1 AND role = 'OWNER'")
        .bind(album_id)
        .fetch_all(&mut **tx)
        .await?;
    Ok(owners)
}

fn member_from_row(row: &PgRow) -> Result<AlbumMember, DatabaseError> {
    let role: String = row.try_get("role")?;
    Ok(AlbumMember {
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        role: parse_role(&role)?,
        created_at: row.try_get("created_at")?,
    })
}

/// `(offset, cursor)` binds for a page request
fn page_binds(page: &PageRequest) -> (i64, Option<crate::pagination::Cursor>) {
    match page.position {
        Position::Start => (0, None),
        Position::Offset(n) => (n.min(i64::MAX as u64) as i64, None),
        Position::After(cursor) => (0, Some(cursor)),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e, "Email is already registered"))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(email).fetch_optional(&self.pool).await?)
    }

    async fn find_users_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DatabaseError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(ids).fetch_all(&self.pool).await?)
    }

    async fn find_users_by_names(&self, names: &[String]) -> Result<Vec<User>, DatabaseError> {
        if names.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!("SELECT {} FROM users WHERE name = ANY($1)", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).bind(names).fetch_all(&self.pool).await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: &str,
        avatar_url: Option<&str>,
    ) -> Result<User, DatabaseError> {
        let sql = format!(
            "UPDATE users SET name = $2, avatar_url = $3, onboarded = TRUE WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(avatar_url)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e, "Username is already taken"))
    }

    async fn create_album(
        &self,
        name: &str,
        members: &[(Uuid, AlbumRole)],
    ) -> Result<Album, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let album = sqlx::query_as::<_, Album>(
            "INSERT INTO albums (id, name) VALUES ($1, $2) RETURNING id, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

        for (user_id, role) in members {
            sqlx::query("INSERT INTO album_members (album_id, user_id, role) VALUES ($1, $2, $3)")
                .bind(album.id)
                .bind(user_id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::from_sqlx(e, "Duplicate album member"))?;
        }

        tx.commit().await?;
        debug!("Created album {} with {} members", album.id, members.len());
        Ok(album)
    }

    async fn find_album(&self, id: Uuid) -> Result<Option<Album>, DatabaseError> {
        Ok(sqlx::query_as::<_, Album>("SELECT id, name, created_at FROM albums WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_album_by_name(
        &self,
        user_id: Uuid,
        name: &str,
        role: AlbumRole,
    ) -> Result<Option<Album>, DatabaseError> {
        Ok(sqlx::query_as::<_, Album>(
            r#"
            SELECT a.id, a.name, a.created_at
            FROM albums a
            JOIN album_members m ON m.album_id = a.id
            WHERE m.user_id = $1 AND m.role = $2 AND a.name = $3
            ORDER BY a.created_at, a.id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn rename_album(&self, id: Uuid, name: &str) -> Result<Album, DatabaseError> {
        sqlx::query_as::<_, Album>("UPDATE albums SET name = $2 WHERE id = $1 RETURNING id, name, created_at")
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Album not found".to_string()))
    }

    async fn delete_album(&self, id: Uuid) -> Result<Vec<Image>, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let linked: Vec<Uuid> = sqlx::query_scalar("SELECT image_id FROM album_images WHERE album_id = $1")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

        // memberships and album_images go with the album (ON DELETE CASCADE)
        let deleted = sqlx::query("DELETE FROM albums WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Album not found".to_string()));
        }

        let sql = format!(
            r#"
            DELETE FROM images i
            WHERE i.id = ANY($1)
            AND NOT EXISTS (SELECT 1 FROM album_images l WHERE l.image_id = i.id)
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        );
        let orphans = sqlx::query_as::<_, Image>(&sql)
            .bind(&linked)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(orphans)
    }

    async fn list_albums_for_user(
        &self,
        user_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<Album>, DatabaseError> {
        let (offset, cursor) = page_binds(page);
        let rows = match cursor {
            Some(cursor) => {
                sqlx::query_as::<_, Album>(
                    r#"
                    SELECT a.id, a.name, a.created_at
                    FROM albums a
                    JOIN album_members m ON m.album_id = a.id
                    WHERE m.user_id = $1 AND (a.created_at, a.id) < ($2, $3)
                    ORDER BY a.created_at DESC, a.id DESC
                    LIMIT $4
                    "#,
                )
                .bind(user_id)
                .bind(cursor.created_at)
                .bind(cursor.id)
                .bind(page.fetch_limit())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Album>(
                    r#"
                    SELECT a.id, a.name, a.created_at
                    FROM albums a
                    JOIN album_members m ON m.album_id = a.id
                    WHERE m.user_id = $1
                    ORDER BY a.created_at DESC, a.id DESC
                    LIMIT $2 OFFSET $3
                    "#,
                )
                .bind(user_id)
                .bind(page.fetch_limit())
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn member_role(&self, album_id: Uuid, user_id: Uuid) -> Result<Option<AlbumRole>, DatabaseError> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM album_members WHERE album_id = $1 AND user_id = $2")
                .bind(album_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        role.as_deref().map(parse_role).transpose()
    }

    async fn list_members(&self, album_id: Uuid) -> Result<Vec<AlbumMember>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT m.user_id, u.name, m.role, m.created_at
            FROM album_members m
            JOIN users u ON u.id = m.user_id
            WHERE m.album_id = $1
            ORDER BY m.created_at, m.user_id
            "#,
        )
        .bind(album_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(member_from_row).collect()
    }

    async fn add_members(&self, album_id: Uuid, members: &[(Uuid, AlbumRole)]) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        for (user_id, role) in members {
            sqlx::query(
                r#"
                INSERT INTO album_members (album_id, user_id, role)
                VALUES ($1, $2, $3)
                ON CONFLICT (album_id, user_id) DO NOTHING
                "#,
            )
            .bind(album_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e, "Duplicate album member"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn set_member_role(&self, album_id: Uuid, user_id: Uuid, role: AlbumRole) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let owners = lock_owners(&mut tx, album_id).await?;
        if strips_last_owner(&owners, user_id, Some(role)) {
            return Err(DatabaseError::Conflict(LAST_OWNER.to_string()));
        }

        let result = sqlx::query("UPDATE album_members SET role = $3 WHERE album_id = $1 AND user_id = $2")
            .bind(album_id)
            .bind(user_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Member not found".to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove_member(&self, album_id: Uuid, user_id: Uuid) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let owners = lock_owners(&mut tx, album_id).await?;
        if strips_last_owner(&owners, user_id, None) {
            return Err(DatabaseError::Conflict(LAST_OWNER.to_string()));
        }

        let result = sqlx::query("DELETE FROM album_members WHERE album_id = $1 AND user_id = $2")
            .bind(album_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Member not found".to_string()));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_image(&self, image: NewImage, album_id: Uuid) -> Result<Image, DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO images AS i
                (id, user_id, url, storage_key, filename, content_type,
                 size_bytes, width, height, derived_from, effects)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        );
        let row = sqlx::query_as::<_, Image>(&sql)
            .bind(image.id)
            .bind(image.user_id)
            .bind(&image.url)
            .bind(&image.storage_key)
            .bind(&image.filename)
            .bind(&image.content_type)
            .bind(image.size_bytes)
            .bind(image.width)
            .bind(image.height)
            .bind(image.derived_from)
            .bind(&image.effects)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e, "Image already exists"))?;

        sqlx::query("INSERT INTO album_images (album_id, image_id, user_id) VALUES ($1, $2, $3)")
            .bind(album_id)
            .bind(row.id)
            .bind(row.user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx(e, "Image is already in this album"))?;

        tx.commit().await?;
        Ok(row)
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<Image>, DatabaseError> {
        let sql = format!("SELECT {} FROM images i WHERE i.id = $1", IMAGE_COLUMNS);
        Ok(sqlx::query_as::<_, Image>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn image_albums(&self, image_id: Uuid) -> Result<Vec<Uuid>, DatabaseError> {
        Ok(sqlx::query_scalar(
            "SELECT album_id FROM album_images WHERE image_id = $1 ORDER BY created_at, album_id",
        )
        .bind(image_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_album_images(
        &self,
        album_id: Uuid,
        page: &PageRequest,
    ) -> Result<Vec<Image>, DatabaseError> {
        let (offset, cursor) = page_binds(page);
        let rows = match cursor {
            Some(cursor) => {
                let sql = format!(
                    r#"
                    SELECT {}
                    FROM images i
                    JOIN album_images l ON l.image_id = i.id
                    WHERE l.album_id = $1 AND (i.created_at, i.id) < ($2, $3)
                    ORDER BY i.created_at DESC, i.id DESC
                    LIMIT $4
                    "#,
                    IMAGE_COLUMNS
                );
                sqlx::query_as::<_, Image>(&sql)
                    .bind(album_id)
                    .bind(cursor.created_at)
                    .bind(cursor.id)
                    .bind(page.fetch_limit())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    r#"
                    SELECT {}
                    FROM images i
                    JOIN album_images l ON l.image_id = i.id
                    WHERE l.album_id = $1
                    ORDER BY i.created_at DESC, i.id DESC
                    LIMIT $2 OFFSET $3
                    "#,
                    IMAGE_COLUMNS
                );
                sqlx::query_as::<_, Image>(&sql)
                    .bind(album_id)
                    .bind(page.fetch_limit())
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn album_image_stats(&self, album_id: Uuid) -> Result<AlbumImageStats, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album_images WHERE album_id = $1")
            .bind(album_id)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            r#"
            SELECT {}
            FROM images i
            JOIN album_images l ON l.image_id = i.id
            WHERE l.album_id = $1
            ORDER BY i.created_at DESC, i.id DESC
            LIMIT 1
            "#,
            IMAGE_COLUMNS
        );
        let latest = sqlx::query_as::<_, Image>(&sql)
            .bind(album_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(AlbumImageStats { count, latest })
    }

    async fn delete_image(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM images WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Image not found".to_string()));
        }
        Ok(())
    }
}
