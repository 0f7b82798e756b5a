use anyhow::Result;
use rusqlite::Connection;

const DB_PATH: &str = "data/captures.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS pages (
            id         INTEGER PRIMARY KEY,
            url        TEXT UNIQUE NOT NULL,
            visited    BOOLEAN NOT NULL DEFAULT 0,
            visited_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pages_visited ON pages(visited);

        CREATE TABLE IF NOT EXISTS page_data (
            id         INTEGER PRIMARY KEY,
            page_id    INTEGER NOT NULL REFERENCES pages(id),
            url        TEXT NOT NULL,
            html       TEXT,
            status     INTEGER,
            error      TEXT,
            latency_ms INTEGER,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_page_data_url ON page_data(url);

        -- One row per extraction: either the four fields + full_address,
        -- or an error. Delivery bookkeeping lives alongside.
        CREATE TABLE IF NOT EXISTS captures (
            id             INTEGER PRIMARY KEY,
            page_data_id   INTEGER NOT NULL REFERENCES page_data(id),
            url            TEXT NOT NULL,
            street         TEXT,
            city           TEXT,
            state          TEXT,
            zip            TEXT,
            full_address   TEXT,
            error          TEXT,
            delivered      BOOLEAN NOT NULL DEFAULT 0,
            delivered_at   TEXT,
            delivery_error TEXT,
            extracted_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_captures_page ON captures(page_data_id);
        CREATE INDEX IF NOT EXISTS idx_captures_delivered ON captures(delivered);
        ",
    )?;
    Ok(())
}

// ── Queue ──

pub fn insert_pages(conn: &Connection, urls: &[String]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare("INSERT OR IGNORE INTO pages (url) VALUES (?1)")?;
        for url in urls {
            count += stmt.execute(rusqlite::params![url])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_unvisited(conn: &Connection, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let sql = match limit {
        Some(n) => format!(
            "SELECT id, url FROM pages WHERE visited = 0 ORDER BY id LIMIT {}",
            n
        ),
        None => "SELECT id, url FROM pages WHERE visited = 0 ORDER BY id".to_string(),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct FetchRow {
    pub page_id: i64,
    pub url: String,
    pub html: Option<String>,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

// ── Extraction ──

pub struct FetchedPage {
    pub page_data_id: i64,
    pub url: String,
    pub html: String,
}

pub fn fetch_unextracted(conn: &Connection, limit: Option<usize>) -> Result<Vec<FetchedPage>> {
    let sql = format!(
        "SELECT pd.id, pd.url, pd.html
         FROM page_data pd
         LEFT JOIN captures c ON c.page_data_id = pd.id
         WHERE pd.html IS NOT NULL AND c.id IS NULL
         ORDER BY pd.id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(FetchedPage {
                page_data_id: row.get(0)?,
                url: row.get(1)?,
                html: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct CaptureRow {
    pub page_data_id: i64,
    pub url: String,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub full_address: Option<String>,
    pub error: Option<String>,
}

pub fn save_captures(conn: &Connection, rows: &[CaptureRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO captures
             (page_data_id, url, street, city, state, zip, full_address, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for r in rows {
            stmt.execute(rusqlite::params![
                r.page_data_id, r.url, r.street, r.city, r.state, r.zip,
                r.full_address, r.error,
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Delivery ──

pub struct PendingDelivery {
    pub capture_id: i64,
    pub url: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub full_address: String,
}

/// Successful captures not yet delivered. A failed delivery stays pending,
/// so rerunning `send` retries it.
pub fn fetch_undelivered(conn: &Connection, limit: Option<usize>) -> Result<Vec<PendingDelivery>> {
    let sql = format!(
        "SELECT id, url, street, city, state, zip, full_address
         FROM captures
         WHERE error IS NULL AND delivered = 0
         ORDER BY id{}",
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PendingDelivery {
                capture_id: row.get(0)?,
                url: row.get(1)?,
                street: row.get(2)?,
                city: row.get(3)?,
                state: row.get(4)?,
                zip: row.get(5)?,
                full_address: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn mark_delivery(conn: &Connection, capture_id: i64, error: Option<&str>) -> Result<()> {
    match error {
        None => {
            conn.execute(
                "UPDATE captures
                 SET delivered = 1, delivered_at = datetime('now'), delivery_error = NULL
                 WHERE id = ?1",
                rusqlite::params![capture_id],
            )?;
        }
        Some(e) => {
            conn.execute(
                "UPDATE captures SET delivery_error = ?2 WHERE id = ?1",
                rusqlite::params![capture_id, e],
            )?;
        }
    }
    Ok(())
}

// ── Stats ──

pub struct Stats {
    pub total: i64,
    pub visited: i64,
    pub unvisited: i64,
    pub fetched: i64,
    pub fetch_errors: i64,
    pub captured: i64,
    pub failed: i64,
    pub delivered: i64,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };
    Ok(Stats {
        total: count("SELECT COUNT(*) FROM pages")?,
        visited: count("SELECT COUNT(*) FROM pages WHERE visited = 1")?,
        unvisited: count("SELECT COUNT(*) FROM pages WHERE visited = 0")?,
        fetched: count("SELECT COUNT(*) FROM page_data WHERE html IS NOT NULL")?,
        fetch_errors: count("SELECT COUNT(*) FROM page_data WHERE error IS NOT NULL")?,
        captured: count("SELECT COUNT(*) FROM captures WHERE error IS NULL")?,
        failed: count("SELECT COUNT(*) FROM captures WHERE error IS NOT NULL")?,
        delivered: count("SELECT COUNT(*) FROM captures WHERE delivered = 1")?,
    })
}
