//! Telegram Desktop export import
//!
//! Replays a `result.json` chat export into the store: the chat is enabled under
//! the export's name, every author becomes a peer and member, and every text
//! message is upserted. Run it against a database opened with the bulk-import
//! storage profile.
//!
//! Exports of large groups run to gigabytes, so [`import_file`] never holds the
//! whole document. A blocking task walks the JSON and hands messages one at a
//! time over a bounded channel; the header fields must come before `messages`,
//! which is how Telegram Desktop writes them.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::{Duration, Instant};

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::chat::ChatRepository;
use crate::domain::format::to_bot_chat_id;
use crate::domain::membership::MembershipRegistry;
use crate::domain::message::{MessageStore, NewMessage};
use crate::error::{Error, Result};
use crate::storage::Database;

/// Log progress every this many imported messages
pub const PROGRESS_INTERVAL: u64 = 10_000;
/// Parsed messages buffered between the reader and the store
pub const STREAM_BUFFER: usize = 1_024;

/// Chat-level fields of an export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportHeader {
    pub name: String,
    pub kind: String,
    /// Chat id without the `-100` prefix
    pub id: i64,
}

impl ExportHeader {
    pub fn chat_id(&self) -> i64 {
        to_bot_chat_id(self.id)
    }
}

/// A fully parsed export, for callers that already hold it in memory
#[derive(Debug, Clone, Deserialize)]
pub struct ChatExport {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub messages: Vec<ExportMessage>,
}

impl ChatExport {
    pub fn header(&self) -> ExportHeader {
        ExportHeader {
            name: self.name.clone(),
            kind: self.kind.clone(),
            id: self.id,
        }
    }

    pub fn chat_id(&self) -> i64 {
        to_bot_chat_id(self.id)
    }
}

/// One entry of the export's `messages` array
#[derive(Debug, Clone, Deserialize)]
pub struct ExportMessage {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub date_unixtime: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub from_id: Option<String>,
    #[serde(default)]
    pub full_text: Option<ExportText>,
    #[serde(default)]
    pub text: Option<ExportText>,
}

impl ExportMessage {
    /// Plain text of the message, preferring `full_text`
    pub fn plain_text(&self) -> String {
        self.full_text
            .as_ref()
            .or(self.text.as_ref())
            .map(ExportText::plain)
            .unwrap_or_default()
    }
}

/// Message text: a string, or a list of plain strings and formatted runs
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExportText {
    Plain(String),
    Parts(Vec<TextPart>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextPart {
    Plain(String),
    Entity { text: String },
}

impl ExportText {
    pub fn plain(&self) -> String {
        match self {
            Self::Plain(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    TextPart::Plain(text) | TextPart::Entity { text } => text.as_str(),
                })
                .collect(),
        }
    }
}

/// Resolve an export author reference (`user<N>` or `channel<N>`) to a peer id
pub fn parse_from_id(raw: &str) -> Option<i64> {
    if let Some(id) = raw.strip_prefix("user") {
        return id.parse().ok();
    }
    if let Some(id) = raw.strip_prefix("channel") {
        return id.parse().ok().map(to_bot_chat_id);
    }
    None
}

/// Counters reported after an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub chat_id: i64,
    pub chat_name: String,
    pub imported: u64,
    pub skipped: u64,
    pub peers: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

/// What the reader task hands to the store, in document order
#[derive(Debug)]
enum ExportItem {
    Header(ExportHeader),
    Message(ExportMessage),
}

/// Walks the top-level export object, emitting the header then each message
struct ExportVisitor<'a> {
    tx: &'a mpsc::Sender<ExportItem>,
}

impl ExportVisitor<'_> {
    fn send<E: de::Error>(&self, item: ExportItem) -> std::result::Result<(), E> {
        self.tx
            .blocking_send(item)
            .map_err(|_| E::custom("import aborted by the store"))
    }
}

impl<'de> Visitor<'de> for ExportVisitor<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a Telegram Desktop chat export object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut name = String::new();
        let mut kind = String::new();
        let mut id: Option<i64> = None;
        let mut header_sent = false;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "name" => name = map.next_value::<Option<String>>()?.unwrap_or_default(),
                "type" => kind = map.next_value()?,
                "id" => id = Some(map.next_value()?),
                "messages" if !header_sent => {
                    let id = id.ok_or_else(|| {
                        <A::Error as de::Error>::custom("`id` must precede `messages`")
                    })?;
                    self.send::<A::Error>(ExportItem::Header(ExportHeader {
                        name: name.clone(),
                        kind: kind.clone(),
                        id,
                    }))?;
                    header_sent = true;
                    map.next_value_seed(MessagesSeed { tx: self.tx })?;
                }
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        if !header_sent {
            let id = id.ok_or_else(|| <A::Error as de::Error>::missing_field("id"))?;
            self.send::<A::Error>(ExportItem::Header(ExportHeader { name, kind, id }))?;
        }
        Ok(())
    }
}

/// Streams the `messages` array element by element
struct MessagesSeed<'a> {
    tx: &'a mpsc::Sender<ExportItem>,
}

impl<'de> DeserializeSeed<'de> for MessagesSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for MessagesSeed<'_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an array of export messages")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(message) = seq.next_element::<ExportMessage>()? {
            self.tx
                .blocking_send(ExportItem::Message(message))
                .map_err(|_| <A::Error as de::Error>::custom("import aborted by the store"))?;
        }
        Ok(())
    }
}

/// Parse an export from `reader`, sending items over `tx`. Blocks; run it off the runtime.
fn read_export<R: Read>(reader: R, tx: &mpsc::Sender<ExportItem>) -> Result<()> {
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    (&mut deserializer).deserialize_map(ExportVisitor { tx })?;
    deserializer.end()?;
    Ok(())
}

/// Per-import state: repositories, counters and the peers seen so far
struct Importer {
    registry: MembershipRegistry,
    store: MessageStore,
    summary: ImportSummary,
    seen_peers: HashSet<i64>,
    started: Instant,
}

impl Importer {
    async fn start(db: &Database, header: &ExportHeader) -> Result<Self> {
        let pool = db.pool().clone();
        let chat_id = header.chat_id();
        if chat_id == header.id {
            return Err(Error::InvalidInput(format!(
                "export chat id {} cannot be mapped to a group id",
                header.id
            )));
        }

        ChatRepository::new(pool.clone())
            .upsert(chat_id, &header.name, true)
            .await?;
        info!(chat_id, name = %header.name, kind = %header.kind, "Importing chat export");

        Ok(Self {
            registry: MembershipRegistry::new(pool.clone()),
            store: MessageStore::new(pool),
            summary: ImportSummary {
                chat_id,
                chat_name: header.name.clone(),
                ..Default::default()
            },
            seen_peers: HashSet::new(),
            started: Instant::now(),
        })
    }

    async fn apply(&mut self, message: &ExportMessage) -> Result<()> {
        let chat_id = self.summary.chat_id;
        let text = message.plain_text();
        if message.kind != "message" || text.is_empty() {
            self.summary.skipped += 1;
            return Ok(());
        }

        let Some(from_id) = message.from_id.as_deref().and_then(parse_from_id) else {
            warn!(msg_id = message.id, from_id = ?message.from_id, "Unknown author reference, skipping");
            self.summary.skipped += 1;
            return Ok(());
        };
        let Ok(timestamp) = message.date_unixtime.parse::<i64>() else {
            warn!(msg_id = message.id, date = %message.date_unixtime, "Unparsable date, skipping");
            self.summary.skipped += 1;
            return Ok(());
        };

        if self.seen_peers.insert(from_id) {
            let name = message.from.as_deref().unwrap_or_default();
            self.registry.upsert_peer(from_id, name, "").await?;
            self.registry.record_join_or_post(chat_id, from_id).await?;
            self.summary.peers += 1;
        }

        self.store
            .upsert(&NewMessage::new(chat_id, from_id, message.id, text, timestamp))
            .await?;
        self.summary.imported += 1;

        if self.summary.imported % PROGRESS_INTERVAL == 0 {
            info!(imported = self.summary.imported, "Import progress");
        }
        Ok(())
    }

    fn finish(mut self) -> ImportSummary {
        self.summary.elapsed = self.started.elapsed();
        info!(
            chat_id = self.summary.chat_id,
            imported = self.summary.imported,
            skipped = self.summary.skipped,
            peers = self.summary.peers,
            elapsed_secs = self.summary.elapsed.as_secs(),
            "Chat export imported"
        );
        self.summary
    }
}

/// Stream an export file into `db`
pub async fn import_file(db: &Database, path: &Path) -> Result<ImportSummary> {
    let reader = BufReader::new(File::open(path)?);
    let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
    let parser = tokio::task::spawn_blocking(move || read_export(reader, &tx));

    let mut importer: Option<Importer> = None;
    while let Some(item) = rx.recv().await {
        match item {
            ExportItem::Header(header) => importer = Some(Importer::start(db, &header).await?),
            ExportItem::Message(message) => {
                let Some(importer) = importer.as_mut() else {
                    return Err(Error::InvalidInput(
                        "export message arrived before its header".to_string(),
                    ));
                };
                importer.apply(&message).await?;
            }
        }
    }

    parser
        .await
        .map_err(|e| Error::Other(format!("export reader task failed: {e}")))??;
    let importer = importer
        .ok_or_else(|| Error::InvalidInput("export has no chat header".to_string()))?;
    Ok(importer.finish())
}

/// Import an already-parsed export into `db`
pub async fn import_export(db: &Database, export: &ChatExport) -> Result<ImportSummary> {
    let mut importer = Importer::start(db, &export.header()).await?;
    for message in &export.messages {
        importer.apply(message).await?;
    }
    Ok(importer.finish())
}
