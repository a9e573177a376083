use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use herald_types::models::UserId;

/// Newline-delimited recipient ids: one per line, each at most once.
pub fn render_listing(ids: &[UserId]) -> String {
    let mut seen = HashSet::with_capacity(ids.len());
    let mut out = String::with_capacity(ids.len() * 12);
    for id in ids {
        if seen.insert(*id) {
            out.push_str(&id.to_string());
            out.push('\n');
        }
    }
    out
}

/// Write the listing to a uniquely named file under `dir`. The caller owns
/// the file and removes it once delivered.
pub async fn write_listing(dir: &Path, ids: &[UserId]) -> Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let path = dir.join(format!("recipients-{}.txt", Uuid::new_v4()));

    let mut file = fs::File::create(&path).await?;
    file.write_all(render_listing(ids).as_bytes()).await?;
    file.flush().await?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_id_per_line() {
        assert_eq!(render_listing(&[3, 1, 2]), "3\n1\n2\n");
    }

    #[test]
    fn duplicates_are_dropped() {
        assert_eq!(render_listing(&[1, 2, 1]), "1\n2\n");
    }

    #[test]
    fn empty_directory_is_empty_file() {
        assert_eq!(render_listing(&[]), "");
    }

    #[tokio::test]
    async fn listing_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_listing(dir.path(), &[10, -20]).await.unwrap();

        assert!(path.starts_with(dir.path()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10\n-20\n");
    }
}
