//! JSON-lines persistence for scraped and extracted records.
//!
//! One JSON object per line, UTF-8, with non-ASCII text written as-is
//! (`serde_json` never escapes it):
//!
//! ```text
//! {"url":"https://www.thairath.co.th/news/crime/...","title":"ตำรวจ...",...}
//! {"url":"https://www.thairath.co.th/news/crime/...","title":"จับกุม...",...}
//! ```

use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Read every non-blank line of `path` as a `T`.
///
/// A malformed line fails the whole read with its 1-based line number.
#[instrument(level = "info", skip_all, fields(%path))]
pub async fn read_jsonl<T: DeserializeOwned>(path: &str) -> Result<Vec<T>> {
    let text = fs::read_to_string(path).await?;
    let records = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| Error::Record { line: i + 1, source })
        })
        .collect::<Result<Vec<T>>>()?;

    info!(count = records.len(), "Total of news loaded");
    Ok(records)
}

/// Write `records` to `path`, one per line, creating parent directories.
#[instrument(level = "info", skip_all, fields(%path, count = records.len()))]
pub async fn write_jsonl<T: Serialize>(records: &[T], path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }

    fs::write(path, out).await?;
    info!("Wrote JSON-lines file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleRecord, ExtractedRecord};
    use serde_json::{Value, json};

    fn record(title: &str) -> ArticleRecord {
        ArticleRecord {
            url: "https://www.thairath.co.th/news/crime/1".to_string(),
            section: "news".to_string(),
            topic: "crime".to_string(),
            title: title.to_string(),
            r#abstract: "สรุป".to_string(),
            content: "เนื้อหา\n\nย่อหน้า".to_string(),
            publish_time: "2024-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_creates_dirs_and_keeps_thai() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/news.jsonl");
        let path = path.to_str().unwrap();

        write_jsonl(&[record("ชิงทรัพย์"), record("ฆาตกรรม")], path)
            .await
            .unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("ชิงทรัพย์"));
        assert!(!lines[0].contains("\\u"));
        assert!(text.ends_with('\n'));

        let back: Vec<ArticleRecord> = read_jsonl(path).await.unwrap();
        assert_eq!(back, vec![record("ชิงทรัพย์"), record("ฆาตกรรม")]);
    }

    #[tokio::test]
    async fn test_extracted_records_are_flat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed.jsonl");
        let path = path.to_str().unwrap();

        let Value::Object(response) = json!({"incident_datetime": "1/2/2024", "num_victims": 2})
        else {
            unreachable!()
        };
        let extracted = ExtractedRecord::merge(&record("t"), response).unwrap();
        write_jsonl(&[extracted], path).await.unwrap();

        let line: Value = serde_json::from_str(std::fs::read_to_string(path).unwrap().trim()).unwrap();
        assert_eq!(line["title"], "t");
        assert_eq!(line["num_victims"], 2);
        assert_eq!(line["incident_datetime"], "1/2/2024");
    }

    #[tokio::test]
    async fn test_read_skips_blank_lines_and_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.jsonl");
        let good = serde_json::to_string(&record("a")).unwrap();
        std::fs::write(&path, format!("{good}\n\n{good}\n")).unwrap();

        let records: Vec<ArticleRecord> = read_jsonl(path.to_str().unwrap()).await.unwrap();
        assert_eq!(records.len(), 2);

        std::fs::write(&path, format!("{good}\n{{\"url\": 1}}\n")).unwrap();
        let err = read_jsonl::<ArticleRecord>(path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Record { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let err = read_jsonl::<ArticleRecord>("/nonexistent/news.jsonl")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
