//! SQLite implementation of [`CacheStorage`].

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::{CacheEntryMeta, CacheStorage};
use crate::Error;
use crate::http::{CachedRequest, CachedResponse};

fn ensure_store(conn: &rusqlite::Connection, name: &str, now: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
        params![name, now],
    )?;
    Ok(())
}

fn store_exists(conn: &rusqlite::Connection, name: &str) -> Result<bool, Error> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
        params![name],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn encode_headers(response: &CachedResponse) -> Result<String, Error> {
    serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(format!("failed to encode headers: {e}")))
}

fn upsert_entry(
    conn: &rusqlite::Connection, name: &str, request: &CachedRequest, response: &CachedResponse, headers_json: &str,
    now: &str,
) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO cache_entries (
            store_name, key, method, url, status, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(store_name, key) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            name,
            request.key(),
            &request.method,
            &request.url,
            response.status,
            headers_json,
            response.body.as_ref(),
            now,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { ensure_store(conn, &name, &now) })
            .await
            .map_err(Error::from)
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> { store_exists(conn, &name) })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, name: &str, entries: Vec<(CachedRequest, CachedResponse)>) -> Result<(), Error> {
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();
        let rows = entries
            .into_iter()
            .map(|(request, response)| {
                let headers_json = encode_headers(&response)?;
                Ok((request, response, headers_json))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &name, &now)?;
                for (request, response, headers_json) in &rows {
                    upsert_entry(&tx, &name, request, response, headers_json, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn put_existing(
        &self, name: &str, request: &CachedRequest, response: &CachedResponse,
    ) -> Result<bool, Error> {
        let name = name.to_string();
        let now = Utc::now().to_rfc3339();
        let headers_json = encode_headers(response)?;
        let (request, response) = (request.clone(), response.clone());

        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                if !store_exists(&tx, &name)? {
                    return Ok(false);
                }
                upsert_entry(&tx, &name, &request, &response, &headers_json, &now)?;
                tx.commit()?;
                Ok(true)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, name: &str, request: &CachedRequest) -> Result<Option<CachedResponse>, Error> {
        let name = name.to_string();
        let key = request.key();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let result = conn.query_row(
                    "SELECT status, headers_json, body FROM cache_entries WHERE store_name = ?1 AND key = ?2",
                    params![name, key],
                    |row| Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                );

                match result {
                    Ok((status, headers_json, body)) => {
                        let headers = serde_json::from_str(&headers_json)
                            .map_err(|e| Error::CorruptEntry(format!("bad headers for {key}: {e}")))?;
                        Ok(Some(CachedResponse { status, headers, body: body.into() }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, name: &str) -> Result<Vec<CacheEntryMeta>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CacheEntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status, stored_at, length(body)
                     FROM cache_entries WHERE store_name = ?1
                     ORDER BY stored_at ASC, url ASC",
                )?;
                let entries = stmt
                    .query_map(params![name], |row| {
                        Ok(CacheEntryMeta {
                            key: row.get(0)?,
                            method: row.get(1)?,
                            url: row.get(2)?,
                            status: row.get(3)?,
                            stored_at: row.get(4)?,
                            body_len: row.get::<_, i64>(5)? as usize,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORE: &str = "reelmind-v1.0.0";

    fn index_request() -> CachedRequest {
        CachedRequest::get("https://app.reelmind.ai/index.html")
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = CachedResponse::new(200, "<html>reelmind</html>").with_header("content-type", "text/html");

        db.put(STORE, &index_request(), &response).await.unwrap();

        let stored = db.match_request(STORE, &index_request()).await.unwrap().unwrap();
        assert_eq!(stored, response);
        assert_eq!(stored.body.as_ref(), b"<html>reelmind</html>");
    }

    #[tokio::test]
    async fn test_match_missing_store_is_miss() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.match_request("nope", &index_request()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put(STORE, &index_request(), &CachedResponse::new(200, "old")).await.unwrap();
        db.put(STORE, &index_request(), &CachedResponse::new(200, "new")).await.unwrap();

        let stored = db.match_request(STORE, &index_request()).await.unwrap().unwrap();
        assert_eq!(stored.body.as_ref(), b"new");
        assert_eq!(db.entries(STORE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put("reelmind-v0.9.0", &index_request(), &CachedResponse::new(200, "stale"))
            .await
            .unwrap();
        db.open(STORE).await.unwrap();

        assert!(db.delete("reelmind-v0.9.0").await.unwrap());
        assert!(!db.delete("reelmind-v0.9.0").await.unwrap());
        assert_eq!(db.keys().await.unwrap(), vec![STORE.to_string()]);
        assert!(db.entries("reelmind-v0.9.0").await.unwrap().is_empty());

        let orphans: i64 = db
            .conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn test_put_existing_skips_deleted_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let response = CachedResponse::new(200, "<html>v1</html>");

        assert!(!db.put_existing(STORE, &index_request(), &response).await.unwrap());
        assert!(db.keys().await.unwrap().is_empty());

        db.open(STORE).await.unwrap();
        assert!(db.put_existing(STORE, &index_request(), &response).await.unwrap());
        assert_eq!(db.match_request(STORE, &index_request()).await.unwrap(), Some(response.clone()));

        db.delete(STORE).await.unwrap();
        assert!(!db.put_existing(STORE, &index_request(), &response).await.unwrap());
        assert!(!db.has(STORE).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open(STORE).await.unwrap();
        db.open(STORE).await.unwrap();
        assert!(db.has(STORE).await.unwrap());
        assert!(!db.has("reelmind-v2.0.0").await.unwrap());
        assert_eq!(db.keys().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_entries_meta() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let batch = vec![
            (CachedRequest::get("https://app.reelmind.ai/"), CachedResponse::new(200, "root")),
            (index_request(), CachedResponse::new(200, "index!")),
        ];
        db.put_all(STORE, batch).await.unwrap();

        let entries = db.entries(STORE).await.unwrap();
        assert_eq!(entries.len(), 2);
        let index = entries.iter().find(|e| e.url.ends_with("/index.html")).unwrap();
        assert_eq!(index.method, "GET");
        assert_eq!(index.status, 200);
        assert_eq!(index.body_len, 6);
        assert_eq!(index.key, index_request().key());
    }
}
