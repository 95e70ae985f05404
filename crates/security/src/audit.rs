//! Audit trail: where security events end up.
//!
//! Sinks:
//! - [`MemorySink`]: bounded in-memory buffer, for tests and `/health`-style introspection
//! - [`TracingSink`]: one structured `tracing` record per event
//! - [`JsonlAuditSink`]: append-only JSONL file with a tamper-evident hash chain
//! - [`FanoutSink`]: delivers to several sinks, reporting partial failure
//!
//! Every JSONL record carries `seq`, `prev_hash` and `hash`. The hash is an
//! HMAC-SHA256 over the canonical JSON of the record without `hash`, keyed
//! by the audit secret, or a plain SHA-256 when no secret is configured.
//! [`verify_chain`] replays a file and reports the first broken link.

use forgegate_core::{SecurityEvent, SecurityEventSink, SinkError};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type HmacSha256 = Hmac<Sha256>;

/// `prev_hash` of the first record in a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// In-memory sink keeping the most recent events.
pub struct MemorySink {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl std::fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySink")
            .field("event_count", &self.count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MemorySink {
    /// Keep at most `capacity` events; the oldest is dropped first.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// All retained events, oldest first.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Retained events whose wire tag is `name` (e.g. `"waf_blocked"`).
    pub fn events_of(&self, name: &str) -> Vec<SecurityEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.name() == name)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl SecurityEventSink for MemorySink {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".into()))?;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}

/// Logs every event through `tracing` under the `forgegate::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl SecurityEventSink for TracingSink {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        tracing::warn!(
            target: "forgegate::audit",
            event_type = event.kind.name(),
            detail = ?event.kind,
            path = %event.path,
            ip = %event.ip,
            user_agent = ?event.user_agent,
            "SECURITY"
        );
        Ok(())
    }
}

/// Delivers each event to every inner sink.
///
/// All sinks are attempted even when an earlier one fails.
pub struct FanoutSink {
    sinks: Vec<Box<dyn SecurityEventSink>>,
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn SecurityEventSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl SecurityEventSink for FanoutSink {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        let mut failed = 0;
        let mut first = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event) {
                failed += 1;
                first.get_or_insert_with(|| e.to_string());
            }
        }
        match first {
            None => Ok(()),
            Some(first) => Err(SinkError::Partial {
                failed,
                total: self.sinks.len(),
                first,
            }),
        }
    }
}

#[derive(Serialize)]
struct UnsealedRecord<'a> {
    seq: u64,
    prev_hash: &'a str,
    #[serde(flatten)]
    event: &'a SecurityEvent,
}

struct ChainState {
    file: File,
    seq: u64,
    last_hash: String,
}

/// Append-only JSONL audit file with a hash chain.
///
/// Opening an existing file continues its chain from the last intact
/// record. A damaged trailing line (a torn write) is left in place for
/// [`verify_chain`] to report rather than blocking startup.
pub struct JsonlAuditSink {
    path: PathBuf,
    key: Option<Vec<u8>>,
    state: Mutex<ChainState>,
}

impl std::fmt::Debug for JsonlAuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlAuditSink")
            .field("path", &self.path)
            .field("keyed", &self.key.is_some())
            .finish()
    }
}

impl JsonlAuditSink {
    /// Open (or create) the audit file. An empty `key` counts as none.
    pub fn open(path: impl Into<PathBuf>, key: Option<&[u8]>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let tail = read_tail(&path)?;
        let (seq, last_hash) = tail
            .link
            .unwrap_or_else(|| (0, GENESIS_HASH.to_string()));

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if let Some(line) = tail.torn_line {
            tracing::warn!(
                path = %path.display(),
                line,
                resume_seq = seq,
                "Audit trail ends with a damaged record, appending after the last intact one"
            );
        }
        if tail.unterminated {
            file.write_all(b"\n")?;
        }
        tracing::info!(path = %path.display(), records = seq, "Audit trail opened");

        Ok(Self {
            path,
            key: key.filter(|k| !k.is_empty()).map(<[u8]>::to_vec),
            state: Mutex::new(ChainState {
                file,
                seq,
                last_hash,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecurityEventSink for JsonlAuditSink {
    fn record(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SinkError::Unavailable("audit file lock poisoned".into()))?;

        let seq = state.seq + 1;
        let mut record = serde_json::to_value(UnsealedRecord {
            seq,
            prev_hash: &state.last_hash,
            event,
        })?;
        let hash = seal(self.key.as_deref(), &record)?;
        if let Value::Object(map) = &mut record {
            map.insert("hash".into(), Value::String(hash.clone()));
        }

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        state.file.write_all(line.as_bytes())?;
        state.file.flush()?;

        state.seq = seq;
        state.last_hash = hash;
        Ok(())
    }
}

/// Hash of a record that does not yet carry its own `hash` field.
fn seal(key: Option<&[u8]>, unsealed: &Value) -> Result<String, SinkError> {
    // serde_json maps are ordered, so this is canonical.
    let canonical = serde_json::to_vec(unsealed)?;
    match key {
        Some(key) => {
            let mut mac = HmacSha256::new_from_slice(key)
                .map_err(|e| SinkError::Unavailable(format!("invalid audit key: {e}")))?;
            mac.update(&canonical);
            Ok(hex::encode(mac.finalize().into_bytes()))
        }
        None => Ok(hex::encode(Sha256::digest(&canonical))),
    }
}

/// Where an existing file's chain left off.
#[derive(Debug, Default)]
struct Tail {
    /// `(seq, hash)` of the last intact record.
    link: Option<(u64, String)>,
    /// 1-based line of a trailing record that is not a chain link.
    torn_line: Option<usize>,
    /// The file does not end with a newline.
    unterminated: bool,
}

fn chain_link(line: &str) -> Option<(u64, String)> {
    let value: Value = serde_json::from_str(line).ok()?;
    let seq = value.get("seq").and_then(Value::as_u64)?;
    let hash = value.get("hash").and_then(Value::as_str)?;
    Some((seq, hash.to_string()))
}

fn read_tail(path: &Path) -> Result<Tail, SinkError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Tail::default()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut tail = Tail::default();
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        tail.unterminated = buf.last() != Some(&b'\n');

        let text = String::from_utf8_lossy(&buf);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match chain_link(text) {
            Some(link) => {
                tail.link = Some(link);
                tail.torn_line = None;
            }
            None => tail.torn_line = Some(line_no),
        }
    }
    Ok(tail)
}

/// Why an audit file failed verification. Lines are 1-based.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Failed to read audit file: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: malformed record: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: expected seq {expected}, found {found}")]
    SeqGap { line: usize, expected: u64, found: u64 },

    #[error("line {line}: prev_hash does not match the preceding record")]
    BrokenLink { line: usize },

    #[error("line {line}: record hash does not match its contents")]
    Tampered { line: usize },
}

/// Replay an audit file and check every link. Returns the record count.
pub fn verify_chain(path: &Path, key: Option<&[u8]>) -> Result<u64, ChainError> {
    let key = key.filter(|k| !k.is_empty());
    let reader = BufReader::new(File::open(path)?);

    let mut expected_seq = 1;
    let mut prev_hash = GENESIS_HASH.to_string();

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let malformed = |reason: String| ChainError::Malformed {
            line: line_no,
            reason,
        };

        let mut record: Value = serde_json::from_str(&line).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(map) = &mut record else {
            return Err(malformed("not a JSON object".into()));
        };
        let hash = match map.remove("hash") {
            Some(Value::String(h)) => h,
            _ => return Err(malformed("missing hash".into())),
        };
        let seq = map
            .get("seq")
            .and_then(Value::as_u64)
            .ok_or_else(|| malformed("missing seq".into()))?;
        let claimed_prev = map
            .get("prev_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing prev_hash".into()))?;

        if seq != expected_seq {
            return Err(ChainError::SeqGap {
                line: line_no,
                expected: expected_seq,
                found: seq,
            });
        }
        if claimed_prev != prev_hash {
            return Err(ChainError::BrokenLink { line: line_no });
        }
        let recomputed = seal(key, &record).map_err(|e| malformed(e.to_string()))?;
        if recomputed != hash {
            return Err(ChainError::Tampered { line: line_no });
        }

        prev_hash = hash;
        expected_seq += 1;
    }

    Ok(expected_seq - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgegate_core::{AttackCategory, SecurityEventKind};
    use std::sync::Arc;

    fn honeypot(path: &str) -> SecurityEvent {
        SecurityEvent::new(SecurityEventKind::HoneypotAccess, path, "203.0.113.7", None)
    }

    fn waf() -> SecurityEvent {
        SecurityEvent::new(
            SecurityEventKind::WafBlocked {
                category: AttackCategory::Xss,
                pattern: "script-tag".into(),
            },
            "/search",
            "203.0.113.7",
            Some("curl/8.4".into()),
        )
    }

    struct Down;

    impl SecurityEventSink for Down {
        fn record(&self, _event: &SecurityEvent) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("down".into()))
        }
    }

    #[test]
    fn memory_sink_keeps_most_recent() {
        let sink = MemorySink::new(2);
        sink.record(&honeypot("/a")).unwrap();
        sink.record(&honeypot("/b")).unwrap();
        sink.record(&waf()).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].path, "/b");
        assert_eq!(sink.events_of("waf_blocked").len(), 1);

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn tracing_sink_never_fails() {
        assert!(TracingSink.record(&waf()).is_ok());
    }

    #[test]
    fn fanout_reaches_every_sink_despite_failure() {
        let memory = Arc::new(MemorySink::default());
        let sinks: Vec<Box<dyn SecurityEventSink>> = vec![
            Box::new(Down),
            Box::new(memory.clone()),
            Box::new(TracingSink),
        ];
        let fanout = FanoutSink::new(sinks);

        match fanout.record(&honeypot("/.env")) {
            Err(SinkError::Partial { failed, total, .. }) => {
                assert_eq!(failed, 1);
                assert_eq!(total, 3);
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        assert_eq!(memory.count(), 1);
    }

    #[test]
    fn jsonl_chain_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit/trail.jsonl");
        let sink = JsonlAuditSink::open(&path, Some(b"secret")).unwrap();
        sink.record(&honeypot("/.env")).unwrap();
        sink.record(&waf()).unwrap();

        assert_eq!(verify_chain(&path, Some(b"secret")).unwrap(), 2);

        let first: Value =
            serde_json::from_str(std::fs::read_to_string(&path).unwrap().lines().next().unwrap())
                .unwrap();
        assert_eq!(first["type"], "honeypot_access");
        assert_eq!(first["seq"], 1);
        assert_eq!(first["prev_hash"], GENESIS_HASH);
    }

    #[test]
    fn reopened_file_continues_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");
        {
            let sink = JsonlAuditSink::open(&path, None).unwrap();
            sink.record(&honeypot("/admin")).unwrap();
        }
        let sink = JsonlAuditSink::open(&path, None).unwrap();
        sink.record(&waf()).unwrap();

        assert_eq!(verify_chain(&path, None).unwrap(), 2);
    }

    #[test]
    fn torn_tail_does_not_block_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");
        {
            let sink = JsonlAuditSink::open(&path, None).unwrap();
            sink.record(&honeypot("/admin")).unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"seq":2,"prev_ha"#).unwrap();
        drop(file);

        let sink = JsonlAuditSink::open(&path, None).unwrap();
        sink.record(&waf()).unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        let appended: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(appended["seq"], 2);
        assert_eq!(appended["prev_hash"], first["hash"]);

        // The damaged line stays visible to verification.
        assert!(matches!(
            verify_chain(&path, None),
            Err(ChainError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn edited_record_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");
        let sink = JsonlAuditSink::open(&path, Some(b"k")).unwrap();
        sink.record(&honeypot("/wp-admin")).unwrap();
        sink.record(&honeypot("/.git")).unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replacen("/wp-admin", "/pricing", 1)).unwrap();

        assert!(matches!(
            verify_chain(&path, Some(b"k")),
            Err(ChainError::Tampered { line: 1 })
        ));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");
        let sink = JsonlAuditSink::open(&path, Some(b"right")).unwrap();
        sink.record(&waf()).unwrap();
        drop(sink);

        assert!(verify_chain(&path, Some(b"wrong")).is_err());
    }

    #[test]
    fn deleted_record_breaks_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trail.jsonl");
        let sink = JsonlAuditSink::open(&path, None).unwrap();
        for p in ["/a", "/b", "/c"] {
            sink.record(&honeypot(p)).unwrap();
        }
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        std::fs::write(&path, format!("{}\n{}\n", lines[0], lines[2])).unwrap();

        assert!(matches!(
            verify_chain(&path, None),
            Err(ChainError::SeqGap { line: 2, expected: 2, found: 3 })
        ));
    }

    #[test]
    fn debug_does_not_leak_key() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::open(dir.path().join("t.jsonl"), Some(b"hunter2")).unwrap();
        let debug = format!("{sink:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("keyed: true"));
    }
}
