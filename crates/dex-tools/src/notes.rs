use chrono::Utc;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NoteStoreError {
    #[error("failed to access notes directory: {0}")]
    Io(#[from] std::io::Error),
}

/// One Markdown file per note under `notes/`, front matter then body —
/// the simplest durable format that a human can also open directly.
pub struct NoteStore {
    dir: PathBuf,
}

impl NoteStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub async fn create(&self, title: &str, body: &str) -> Result<Note, NoteStoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();
        let contents = format!(
            "---\ntitle: {title}\ncreated: {created_at}\n---\n\n{body}\n"
        );
        let path = self.dir.join(format!("{id}.md"));
        tokio::fs::write(&path, contents).await?;
        Ok(Note { id, title: title.to_string(), body: body.to_string(), created_at })
    }

    pub async fn list(&self) -> Result<Vec<Note>, NoteStoreError> {
        let mut notes = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(notes),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Ok(raw) = tokio::fs::read_to_string(&path).await else { continue };
            let (title, created_at, body) = parse_front_matter(&raw);
            let id = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            notes.push(Note { id, title, body, created_at });
        }
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notes)
    }
}

fn parse_front_matter(raw: &str) -> (String, String, String) {
    let mut title = String::new();
    let mut created_at = String::new();
    if let Some(rest) = raw.strip_prefix("---\n") {
        if let Some(end) = rest.find("\n---\n") {
            let header = &rest[..end];
            for line in header.lines() {
                if let Some(value) = line.strip_prefix("title: ") {
                    title = value.to_string();
                } else if let Some(value) = line.strip_prefix("created: ") {
                    created_at = value.to_string();
                }
            }
            let body = rest[end + 5..].trim_start_matches('\n').to_string();
            return (title, created_at, body);
        }
    }
    (title, created_at, raw.to_string())
}
