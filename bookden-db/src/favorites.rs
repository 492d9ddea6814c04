//! Favorite folder list.

use rusqlite::params;

use crate::error::DbError;
use crate::store::LibraryDb;

/// A pinned folder shown at the top of the file browser.
#[derive(Debug, Clone)]
pub struct FavoriteFolder {
    pub id: Option<i64>,
    pub path: String,
    pub position: i64,
}

impl LibraryDb {
    /// All favorites in display order.
    pub fn load_favorite_folders(&self) -> Result<Vec<FavoriteFolder>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, path, position FROM favorite_folders ORDER BY position, path")?;
        let rows = stmt.query_map([], |row| {
            Ok(FavoriteFolder {
                id: Some(row.get(0)?),
                path: row.get(1)?,
                position: row.get(2)?,
            })
        })?;
        let mut list = Vec::new();
        for row in rows {
            list.push(row?);
        }
        Ok(list)
    }

    /// Insert a favorite and fill in its generated id.
    pub fn create_favorites_folder(&mut self, folder: &mut FavoriteFolder) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO favorite_folders (id, path, position) VALUES (NULL, ?1, ?2)",
            params![folder.path, folder.position],
        )?;
        folder.id = Some(self.conn.last_insert_rowid());
        Ok(())
    }

    pub fn update_favorite_folder(&mut self, folder: &FavoriteFolder) -> Result<(), DbError> {
        let Some(id) = folder.id else {
            return Ok(());
        };
        self.conn.execute(
            "UPDATE favorite_folders SET position = ?1, path = ?2 WHERE id = ?3",
            params![folder.position, folder.path, id],
        )?;
        Ok(())
    }

    pub fn delete_favorite_folder(&mut self, id: i64) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM favorite_folders WHERE id = ?1", params![id])?;
        Ok(())
    }
}
