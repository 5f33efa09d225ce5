/// Event sourcing and replay engine.
///
/// Records every dispatched event into an append-only log, supports
/// checkpoint snapshots with hash-based validation, and provides
/// export/import for deterministic replay verification.

use std::io::{self, BufRead, Write};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventId, EventType};
use crate::runtime::{Packet, PacketId};
use crate::time::VirtualTime;
use crate::topology::{IfIndex, NodeId};

const HEADER: &str = "# REROUTE EVENT LOG v1";

// ── Hash utility ──────────────────────────────────────────────────────

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Hash a byte slice deterministically (FNV-1a variant).
pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325;
    for &b in data {
        h ^= b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    h
}

// ── Checkpoint ────────────────────────────────────────────────────────

/// A snapshot of the simulation state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Checkpoint {
    /// Number of events processed when this checkpoint was taken.
    pub event_index: u64,
    pub time: VirtualTime,
    /// The handler's state hash.
    pub state_hash: u64,
}

// ── Event Log ─────────────────────────────────────────────────────────

/// Append-only log of dispatched events with optional checkpointing.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventLog {
    events: Vec<Event>,
    checkpoints: Vec<Checkpoint>,
    checkpoint_interval: Option<u64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an event log with automatic checkpointing every `n` events.
    pub fn with_checkpoint_interval(n: u64) -> Self {
        EventLog {
            checkpoint_interval: Some(n),
            ..Self::default()
        }
    }

    /// Record a dispatched event.
    pub fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn add_checkpoint(&mut self, event_index: u64, time: VirtualTime, state_hash: u64) {
        self.checkpoints.push(Checkpoint {
            event_index,
            time,
            state_hash,
        });
    }

    /// Check if a checkpoint should be taken at this event count.
    pub fn should_checkpoint(&self, events_processed: u64) -> bool {
        match self.checkpoint_interval {
            Some(n) if n > 0 => events_processed % n == 0,
            _ => false,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Compute a deterministic hash of the entire event log.
    pub fn log_hash(&self) -> u64 {
        let mut h: u64 = 0;
        for event in &self.events {
            h = hash_combine(h, event.id.raw());
            h = hash_combine(h, event.scheduled_at.ticks());
            h = hash_combine(h, event_type_hash(&event.payload));
        }
        h
    }

    // ── Export / Import ───────────────────────────────────────────

    /// Export the event log to a writer in a deterministic text format.
    pub fn export<W: Write>(&self, w: &mut W) -> SimResult<()> {
        writeln!(w, "{}", HEADER)?;
        writeln!(w, "# events: {}", self.events.len())?;
        writeln!(w, "# checkpoints: {}", self.checkpoints.len())?;

        for event in &self.events {
            write!(w, "E {} {} ", event.id.raw(), event.scheduled_at.ticks())?;
            serialize_event_type(w, &event.payload)?;
            writeln!(w)?;
        }

        for cp in &self.checkpoints {
            writeln!(
                w,
                "C {} {} {:016x}",
                cp.event_index,
                cp.time.ticks(),
                cp.state_hash
            )?;
        }

        Ok(())
    }

    pub fn export_to_file(&self, path: impl AsRef<Path>) -> SimResult<()> {
        let mut f = io::BufWriter::new(std::fs::File::create(path)?);
        self.export(&mut f)?;
        f.flush()?;
        Ok(())
    }

    /// Import an event log from a reader. Blank lines and `#` comments
    /// are skipped; anything else must be an event or checkpoint line.
    pub fn import<R: BufRead>(r: R) -> SimResult<Self> {
        let mut log = EventLog::new();

        for (index, line) in r.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            let parse_err = |reason: String| SimError::LogParse {
                line: index + 1,
                reason,
            };

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with("E ") {
                log.events.push(deserialize_event(line).map_err(parse_err)?);
            } else if line.starts_with("C ") {
                log.checkpoints
                    .push(deserialize_checkpoint(line).map_err(parse_err)?);
            } else {
                return Err(parse_err(format!("unrecognised line: {}", line)));
            }
        }

        Ok(log)
    }

    pub fn import_from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let f = std::fs::File::open(path)?;
        Self::import(io::BufReader::new(f))
    }
}

// ── Verification ──────────────────────────────────────────────────────

/// Compare two event logs for identical event ordering and payloads.
pub fn logs_match(a: &EventLog, b: &EventLog) -> bool {
    if a.events.len() != b.events.len() {
        return false;
    }
    a.events.iter().zip(b.events.iter()).all(|(ea, eb)| {
        ea.id == eb.id && ea.scheduled_at == eb.scheduled_at && ea.payload == eb.payload
    })
}

/// Compare checkpoints between two logs.
pub fn checkpoints_match(a: &EventLog, b: &EventLog) -> bool {
    a.checkpoints == b.checkpoints
}

// ── Serialization helpers ─────────────────────────────────────────────

/// Hex with `-` for empty input, so fields never collapse.
fn encode_bytes(data: &[u8]) -> String {
    if data.is_empty() {
        "-".into()
    } else {
        hex::encode(data)
    }
}

fn decode_bytes(s: &str) -> Result<Vec<u8>, String> {
    if s == "-" {
        return Ok(Vec::new());
    }
    hex::decode(s).map_err(|e| format!("hex: {}", e))
}

fn serialize_packet<W: Write>(w: &mut W, p: &Packet) -> io::Result<()> {
    write!(
        w,
        "{} {} {} {} {}",
        p.id.raw(),
        p.destination,
        p.size,
        p.ttl,
        encode_bytes(&p.payload)
    )
}

fn deserialize_packet(fields: &[&str]) -> Result<Packet, String> {
    let [id, dst, size, ttl, payload] = fields else {
        return Err(format!("packet needs 5 fields, got {}", fields.len()));
    };
    Ok(Packet {
        id: PacketId::new(id.parse().map_err(|e| format!("packet id: {}", e))?),
        destination: dst
            .parse::<Ipv4Addr>()
            .map_err(|e| format!("destination: {}", e))?,
        size: size.parse().map_err(|e| format!("size: {}", e))?,
        ttl: ttl.parse().map_err(|e| format!("ttl: {}", e))?,
        payload: decode_bytes(payload)?,
    })
}

fn serialize_event_type<W: Write>(w: &mut W, et: &EventType) -> io::Result<()> {
    match et {
        EventType::Noop => write!(w, "Noop"),
        EventType::Log(msg) => write!(w, "Log {}", encode_bytes(msg.as_bytes())),
        EventType::InterfaceDown { node, interface } => {
            write!(w, "Down {} {}", node.raw(), interface.raw())
        }
        EventType::InterfaceUp { node, interface } => {
            write!(w, "Up {} {}", node.raw(), interface.raw())
        }
        EventType::PacketSend { node, packet } => {
            write!(w, "Send {} ", node.raw())?;
            serialize_packet(w, packet)
        }
        EventType::PacketArrival {
            node,
            interface,
            packet,
        } => {
            write!(w, "Arrive {} {} ", node.raw(), interface.raw())?;
            serialize_packet(w, packet)
        }
        EventType::DumpRoutes => write!(w, "Dump"),
    }
}

fn deserialize_event(line: &str) -> Result<Event, String> {
    let parts: Vec<&str> = line.splitn(4, ' ').collect();
    if parts.len() < 4 || parts[0] != "E" {
        return Err(format!("invalid event line: {}", line));
    }

    let id: u64 = parts[1].parse().map_err(|e| format!("id: {}", e))?;
    let time: u64 = parts[2].parse().map_err(|e| format!("time: {}", e))?;
    let payload = deserialize_event_type(parts[3])?;

    Ok(Event::new(EventId::new(id), VirtualTime::new(time), payload))
}

fn deserialize_event_type(s: &str) -> Result<EventType, String> {
    let parts: Vec<&str> = s.split(' ').collect();

    match parts[0] {
        "Noop" => Ok(EventType::Noop),
        "Log" => {
            let hex = parts.get(1).ok_or("missing log text")?;
            let text = String::from_utf8(decode_bytes(hex)?)
                .map_err(|e| format!("utf8: {}", e))?;
            Ok(EventType::Log(text))
        }
        "Down" => Ok(EventType::InterfaceDown {
            node: parse_node_id(parts.get(1))?,
            interface: parse_if_index(parts.get(2))?,
        }),
        "Up" => Ok(EventType::InterfaceUp {
            node: parse_node_id(parts.get(1))?,
            interface: parse_if_index(parts.get(2))?,
        }),
        "Send" => Ok(EventType::PacketSend {
            node: parse_node_id(parts.get(1))?,
            packet: deserialize_packet(parts.get(2..).unwrap_or_default())?,
        }),
        "Arrive" => Ok(EventType::PacketArrival {
            node: parse_node_id(parts.get(1))?,
            interface: parse_if_index(parts.get(2))?,
            packet: deserialize_packet(parts.get(3..).unwrap_or_default())?,
        }),
        "Dump" => Ok(EventType::DumpRoutes),
        other => Err(format!("unknown event type: {}", other)),
    }
}

fn deserialize_checkpoint(line: &str) -> Result<Checkpoint, String> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 4 || parts[0] != "C" {
        return Err(format!("invalid checkpoint: {}", line));
    }
    let event_index: u64 = parts[1].parse().map_err(|e| format!("index: {}", e))?;
    let time: u64 = parts[2].parse().map_err(|e| format!("time: {}", e))?;
    let state_hash = u64::from_str_radix(parts[3], 16).map_err(|e| format!("hash: {}", e))?;
    Ok(Checkpoint {
        event_index,
        time: VirtualTime::new(time),
        state_hash,
    })
}

fn parse_node_id(s: Option<&&str>) -> Result<NodeId, String> {
    let raw: u32 = s
        .ok_or("missing node")?
        .parse()
        .map_err(|e| format!("node: {}", e))?;
    Ok(NodeId::new(raw))
}

fn parse_if_index(s: Option<&&str>) -> Result<IfIndex, String> {
    let raw: u32 = s
        .ok_or("missing interface")?
        .parse()
        .map_err(|e| format!("interface: {}", e))?;
    Ok(IfIndex::new(raw))
}

fn packet_hash(p: &Packet) -> u64 {
    let mut h = hash_combine(p.id.raw(), u64::from(u32::from(p.destination)));
    h = hash_combine(h, u64::from(p.size));
    h = hash_combine(h, u64::from(p.ttl));
    hash_combine(h, hash_bytes(&p.payload))
}

fn event_type_hash(et: &EventType) -> u64 {
    match et {
        EventType::Noop => 1,
        EventType::Log(s) => hash_combine(2, hash_bytes(s.as_bytes())),
        EventType::InterfaceDown { node, interface } => hash_combine(
            3,
            hash_combine(u64::from(node.raw()), u64::from(interface.raw())),
        ),
        EventType::InterfaceUp { node, interface } => hash_combine(
            4,
            hash_combine(u64::from(node.raw()), u64::from(interface.raw())),
        ),
        EventType::PacketSend { node, packet } => {
            hash_combine(hash_combine(5, u64::from(node.raw())), packet_hash(packet))
        }
        EventType::PacketArrival {
            node,
            interface,
            packet,
        } => {
            let mut h = hash_combine(6, u64::from(node.raw()));
            h = hash_combine(h, u64::from(interface.raw()));
            hash_combine(h, packet_hash(packet))
        }
        EventType::DumpRoutes => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(id: u64) -> Packet {
        Packet::with_payload(PacketId::new(id), Ipv4Addr::new(10, 1, 3, 2), vec![0xab; 4])
    }

    #[test]
    fn test_hash_determinism() {
        let h1 = hash_combine(42, 99);
        let h2 = hash_combine(42, 99);
        assert_eq!(h1, h2);

        // Different inputs → different hashes.
        let h3 = hash_combine(42, 100);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_event_roundtrip() {
        let events = vec![
            Event::new(EventId::new(0), VirtualTime::new(0), EventType::Noop),
            Event::new(
                EventId::new(1),
                VirtualTime::new(5),
                EventType::Log("test log".into()),
            ),
            Event::new(EventId::new(2), VirtualTime::new(6), EventType::Log(String::new())),
            Event::new(
                EventId::new(3),
                VirtualTime::from_secs(6),
                EventType::InterfaceDown {
                    node: NodeId::new(6),
                    interface: IfIndex::new(0),
                },
            ),
            Event::new(
                EventId::new(4),
                VirtualTime::from_secs(8),
                EventType::InterfaceUp {
                    node: NodeId::new(6),
                    interface: IfIndex::new(0),
                },
            ),
            Event::new(
                EventId::new(5),
                VirtualTime::from_millis(1_200),
                EventType::PacketSend {
                    node: NodeId::new(1),
                    packet: packet(0),
                },
            ),
            Event::new(
                EventId::new(6),
                VirtualTime::from_millis(1_202),
                EventType::PacketArrival {
                    node: NodeId::new(6),
                    interface: IfIndex::new(0),
                    packet: Packet::new(PacketId::new(1), Ipv4Addr::new(172, 16, 1, 2), 78),
                },
            ),
            Event::new(EventId::new(7), VirtualTime::from_secs(12), EventType::DumpRoutes),
        ];

        let mut log = EventLog::new();
        for e in &events {
            log.record(e.clone());
        }
        log.add_checkpoint(8, VirtualTime::from_secs(12), 0xDEADBEEF);

        let mut buf = Vec::new();
        log.export(&mut buf).unwrap();
        assert!(buf.starts_with(HEADER.as_bytes()));

        let imported = EventLog::import(io::BufReader::new(buf.as_slice())).unwrap();
        assert!(logs_match(&log, &imported), "export/import roundtrip failed");
        assert!(checkpoints_match(&log, &imported));
        assert_eq!(log.log_hash(), imported.log_hash());
    }

    #[test]
    fn test_import_reports_line_number() {
        let text = "# REROUTE EVENT LOG v1\nE 0 0 Noop\nE 1 5 Warp 3\n";
        let err = EventLog::import(io::BufReader::new(text.as_bytes())).unwrap_err();
        match err {
            SimError::LogParse { line, reason } => {
                assert_eq!(line, 3);
                assert!(reason.contains("Warp"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_import_rejects_short_packet() {
        let text = "E 0 0 Send 1 0 10.1.3.2 78\n";
        assert!(EventLog::import(io::BufReader::new(text.as_bytes())).is_err());
    }

    #[test]
    fn test_log_hash_distinguishes_payloads() {
        let mut a = EventLog::new();
        let mut b = EventLog::new();
        a.record(Event::new(
            EventId::new(0),
            VirtualTime::new(0),
            EventType::PacketSend {
                node: NodeId::new(1),
                packet: packet(0),
            },
        ));
        b.record(Event::new(
            EventId::new(0),
            VirtualTime::new(0),
            EventType::PacketSend {
                node: NodeId::new(1),
                packet: packet(1),
            },
        ));
        assert_ne!(a.log_hash(), b.log_hash());
    }

    #[test]
    fn test_should_checkpoint() {
        let log = EventLog::with_checkpoint_interval(5);
        assert!(!log.should_checkpoint(1));
        assert!(!log.should_checkpoint(4));
        assert!(log.should_checkpoint(5));
        assert!(log.should_checkpoint(10));
        assert!(!log.should_checkpoint(7));
        assert!(!EventLog::new().should_checkpoint(5));
    }

    #[test]
    fn test_file_roundtrip() {
        let mut log = EventLog::new();
        log.record(Event::new(EventId::new(0), VirtualTime::new(3), EventType::DumpRoutes));
        let path = std::env::temp_dir().join(format!("reroute-log-{}.txt", std::process::id()));
        log.export_to_file(&path).unwrap();
        let imported = EventLog::import_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(logs_match(&log, &imported));
    }
}
