//! Per-tool draft persistence.
//!
//! Drafts are stored as `{ "schemaVersion": N, "payload": {...} }` under a namespaced key.
//! Older payloads are migrated forward on load. A draft that cannot be read for any reason is
//! reported as absent; losing a draft is never fatal.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::service::GenerateMode;
use arbora_core::{DiagramDocument, ParserKind, RenderConfig};

pub const DRAFT_SCHEMA_VERSION: u32 = 2;

pub fn draft_key(tool_id: &str) -> String {
    format!("arbora:{tool_id}:draft")
}

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("draft I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("draft JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported draft schema version {found} (current is {DRAFT_SCHEMA_VERSION})")]
    UnsupportedVersion { found: u32 },
    #[error("draft migration from version {from} failed: {message}")]
    Migration { from: u32, message: String },
}

pub type Result<T> = std::result::Result<T, DraftError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub input: String,
    #[serde(default)]
    pub mode: GenerateMode,
    #[serde(default)]
    pub config: RenderConfig,
    #[serde(default)]
    pub parser_kind: ParserKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DiagramDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    schema_version: u32,
    payload: Value,
}

type Migration = fn(Value) -> Result<Value>;

/// `(from_version, step)`; each step lifts a payload by exactly one version.
const MIGRATIONS: &[(u32, Migration)] = &[(1, migrate_v1)];

/// v1 stored only `{ input, document }`.
fn migrate_v1(mut payload: Value) -> Result<Value> {
    let obj = payload.as_object_mut().ok_or_else(|| DraftError::Migration {
        from: 1,
        message: "payload is not an object".to_string(),
    })?;
    if !obj.get("input").is_some_and(Value::is_string) {
        return Err(DraftError::Migration {
            from: 1,
            message: "missing `input`".to_string(),
        });
    }
    obj.entry("config")
        .or_insert(serde_json::to_value(RenderConfig::default())?);
    obj.entry("mode")
        .or_insert(Value::String("manual".to_string()));
    if let Some(kind) = obj
        .get("document")
        .and_then(|doc| doc.get("parserKind"))
        .cloned()
    {
        obj.entry("parserKind").or_insert(kind);
    }
    Ok(payload)
}

fn upgrade(mut version: u32, mut payload: Value) -> Result<Value> {
    if version > DRAFT_SCHEMA_VERSION || version == 0 {
        return Err(DraftError::UnsupportedVersion { found: version });
    }
    while version < DRAFT_SCHEMA_VERSION {
        let (_, step) = MIGRATIONS
            .iter()
            .find(|(from, _)| *from == version)
            .ok_or(DraftError::UnsupportedVersion { found: version })?;
        payload = step(payload)?;
        version += 1;
    }
    Ok(payload)
}

/// Decodes a stored envelope, migrating older payloads.
pub fn decode_draft(raw: &str) -> Result<Draft> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    let payload = upgrade(envelope.schema_version, envelope.payload)?;
    Ok(serde_json::from_value(payload)?)
}

pub fn encode_draft(draft: &Draft) -> Result<String> {
    let envelope = Envelope {
        schema_version: DRAFT_SCHEMA_VERSION,
        payload: serde_json::to_value(draft)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// String key-value storage for drafts.
pub trait DraftStore {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryDraftStore {
    entries: FxHashMap<String, String>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DraftStore for MemoryDraftStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per draft inside `dir`; `:` in keys becomes `_`.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| match c {
                ':' | '/' | '\\' => '_',
                c => c,
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

impl DraftStore for FileDraftStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DraftError::Io { path, source }),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        std::fs::create_dir_all(&self.dir).map_err(|source| DraftError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, value).map_err(|source| DraftError::Io { path, source })
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DraftError::Io { path, source }),
        }
    }
}

pub fn save_draft(store: &mut dyn DraftStore, tool_id: &str, draft: &Draft) -> Result<()> {
    let encoded = encode_draft(draft)?;
    store.write(&draft_key(tool_id), &encoded)?;
    tracing::debug!(tool = tool_id, bytes = encoded.len(), "saved draft");
    Ok(())
}

/// Returns the stored draft for `tool_id`, or `None` when there is none or it is unusable.
pub fn load_draft(store: &dyn DraftStore, tool_id: &str) -> Option<Draft> {
    let raw = match store.read(&draft_key(tool_id)) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(err) => {
            tracing::warn!(tool = tool_id, %err, "could not read draft");
            return None;
        }
    };
    match decode_draft(&raw) {
        Ok(draft) => Some(draft),
        Err(err) => {
            tracing::warn!(tool = tool_id, %err, "ignoring unusable draft");
            None
        }
    }
}

pub fn clear_draft(store: &mut dyn DraftStore, tool_id: &str) -> Result<()> {
    store.remove(&draft_key(tool_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{LayoutOptions, layout_text_sync};

    fn sample() -> Draft {
        Draft {
            input: "a\n  b".to_string(),
            mode: GenerateMode::Ai,
            config: RenderConfig {
                zoom: 1.5,
                ..RenderConfig::default()
            },
            parser_kind: ParserKind::Mind,
            document: Some(
                layout_text_sync(ParserKind::Mind, "a\n  b", &LayoutOptions::default()).unwrap(),
            ),
        }
    }

    #[test]
    fn keys_are_namespaced_per_tool() {
        assert_eq!(draft_key("mind-map"), "arbora:mind-map:draft");
        assert_ne!(draft_key("er-diagram"), draft_key("mind-map"));
    }

    #[test]
    fn memory_store_keeps_tools_apart() {
        let mut store = MemoryDraftStore::new();
        save_draft(&mut store, "mind-map", &sample()).unwrap();
        assert_eq!(load_draft(&store, "mind-map"), Some(sample()));
        assert_eq!(load_draft(&store, "er-diagram"), None);

        clear_draft(&mut store, "mind-map").unwrap();
        assert_eq!(load_draft(&store, "mind-map"), None);
    }

    #[test]
    fn envelope_carries_schema_version() {
        let raw = encode_draft(&sample()).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["schemaVersion"], DRAFT_SCHEMA_VERSION);
        assert_eq!(value["payload"]["mode"], "ai");
        assert_eq!(value["payload"]["parserKind"], "mind");
    }

    #[test]
    fn v1_payloads_are_migrated() {
        let document = sample().document.unwrap();
        let raw = serde_json::json!({
            "schemaVersion": 1,
            "payload": { "input": "a\n  b", "document": document },
        })
        .to_string();
        let draft = decode_draft(&raw).unwrap();
        assert_eq!(draft.mode, GenerateMode::Manual);
        assert_eq!(draft.config, RenderConfig::default());
        assert_eq!(draft.parser_kind, ParserKind::Mind);
        assert_eq!(draft.document, Some(document));
    }

    #[test]
    fn unusable_payloads_read_as_no_draft() {
        let mut store = MemoryDraftStore::new();
        let key = draft_key("t");
        let cases = [
            "{not json".to_string(),
            serde_json::json!({ "schemaVersion": 99, "payload": {} }).to_string(),
            serde_json::json!({ "schemaVersion": 1, "payload": [1, 2] }).to_string(),
            serde_json::json!({ "schemaVersion": 2, "payload": { "input": 3 } }).to_string(),
        ];
        for raw in cases {
            store.write(&key, &raw).unwrap();
            assert_eq!(load_draft(&store, "t"), None, "{raw}");
        }
        assert!(matches!(
            decode_draft(&serde_json::json!({ "schemaVersion": 99, "payload": {} }).to_string()),
            Err(DraftError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn file_store_round_trips_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileDraftStore::new(dir.path().join("drafts"));
        assert_eq!(load_draft(&store, "feature-structure"), None);

        save_draft(&mut store, "feature-structure", &sample()).unwrap();
        assert!(
            store
                .dir()
                .join("arbora_feature-structure_draft.json")
                .is_file()
        );
        assert_eq!(load_draft(&store, "feature-structure"), Some(sample()));

        clear_draft(&mut store, "feature-structure").unwrap();
        clear_draft(&mut store, "feature-structure").unwrap();
        assert_eq!(load_draft(&store, "feature-structure"), None);
    }
}
