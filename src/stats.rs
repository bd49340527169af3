//! Store statistics.
//!
//! Summarizes what the configured collection holds: record count, a
//! per-kind breakdown, and when it was last written. Used by
//! `ragchat stats`.

use anyhow::Result;
use sqlx::Row;

use ragchat_core::store::Store;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

struct KindStats {
    kind: String,
    records: i64,
    last_write: Option<i64>,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let store = SqliteStore::open(config).await?;
    let total = store.count().await?;

    let rows = sqlx::query(
        r#"
        SELECT COALESCE(kind, 'other') AS kind,
               COUNT(*) AS records,
               MAX(updated_at) AS last_write
        FROM records
        WHERE collection = ?
        GROUP BY COALESCE(kind, 'other')
        ORDER BY records DESC, kind ASC
        "#,
    )
    .bind(store.collection())
    .fetch_all(store.pool())
    .await?;

    let kinds: Vec<KindStats> = rows
        .iter()
        .map(|row| KindStats {
            kind: row.get("kind"),
            records: row.get("records"),
            last_write: row.get("last_write"),
        })
        .collect();

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("ragchat store stats");
    println!("===================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", store.collection());
    println!("  Records:     {}", total);

    if !kinds.is_empty() {
        println!();
        println!("  {:<12} {:>8}   {}", "KIND", "RECORDS", "LAST WRITE");
        println!("  {}", "-".repeat(40));
        for k in &kinds {
            let when = match k.last_write {
                Some(ts) => format_ts_relative(ts),
                None => "never".to_string(),
            };
            println!("  {:<12} {:>8}   {}", k.kind, k.records, when);
        }
    }

    println!();

    store.pool().close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Relative time for recent timestamps, a date otherwise.
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;
    let plural = |n: i64| if n == 1 { "" } else { "s" };

    match delta {
        d if d < 0 => format_ts_iso(ts),
        d if d < 60 => "just now".to_string(),
        d if d < 3600 => format!("{} min{} ago", d / 60, plural(d / 60)),
        d if d < 86400 => format!("{} hour{} ago", d / 3600, plural(d / 3600)),
        d if d < 86400 * 30 => format!("{} day{} ago", d / 86400, plural(d / 86400)),
        _ => format_ts_iso(ts),
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn recent_timestamps_are_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 120), "2 mins ago");
        assert_eq!(format_ts_relative(now - 3600), "1 hour ago");
        assert_eq!(format_ts_relative(0), "1970-01-01 00:00");
    }
}
