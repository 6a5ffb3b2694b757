use std::fmt::Write as _;
use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ojnet_packet::{channel_name, kind::is_reserved, Packet, PacketKind};
use serde::Serialize;

use crate::exit::{CliError, CliResult, USAGE};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    kind: &'static str,
    id: String,
    #[serde(flatten)]
    fields: PacketFields<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer_id: Option<u64>,
    timestamp: String,
}

#[derive(Serialize)]
#[serde(untagged)]
enum PacketFields<'a> {
    ConnectionRequest {
        client_id: u64,
        protocol_version: u8,
    },
    ConnectionAccepted {
        server_id: u64,
    },
    ConnectionRejected {
        reason: String,
        reason_code: u8,
    },
    Acknowledge {
        count: usize,
        sequence_ids: &'a [u32],
    },
    ChannelOperation {
        operation: String,
        channel: u8,
        channel_name: &'static str,
    },
    Container {
        channel: u8,
        channel_name: &'static str,
        sequence_id: Option<u32>,
        ordered_id: Option<u16>,
        compressed: bool,
        payload_size: usize,
        payload: String,
    },
}

impl<'a> PacketFields<'a> {
    fn of(packet: &'a Packet) -> Self {
        match packet {
            Packet::ConnectionRequest(p) => PacketFields::ConnectionRequest {
                client_id: p.client_id,
                protocol_version: p.protocol_version,
            },
            Packet::ConnectionAccepted(p) => PacketFields::ConnectionAccepted {
                server_id: p.server_id,
            },
            Packet::ConnectionRejected(p) => PacketFields::ConnectionRejected {
                reason: p.reason.to_string(),
                reason_code: p.reason as u8,
            },
            Packet::Acknowledge(p) => PacketFields::Acknowledge {
                count: p.len(),
                sequence_ids: &p.sequence_ids,
            },
            Packet::ChannelOperation(p) => PacketFields::ChannelOperation {
                operation: p.operation.to_string(),
                channel: p.channel,
                channel_name: channel_name(p.channel),
            },
            Packet::Container(p) => PacketFields::Container {
                channel: p.channel,
                channel_name: channel_name(p.channel),
                sequence_id: p.sequence_id,
                ordered_id: p.ordered_id,
                compressed: p.compressed,
                payload_size: p.payload.len(),
                payload: payload_preview(&p.payload),
            },
        }
    }
}

pub fn print_packet(packet: &Packet, peer_id: Option<u64>, format: OutputFormat) {
    if let OutputFormat::Raw = format {
        match packet {
            Packet::Container(container) => print_raw(&container.payload),
            other => {
                if let Ok(wire) = other.encode() {
                    print_raw(&wire);
                }
            }
        }
        return;
    }

    let out = PacketOutput {
        kind: packet.kind().name(),
        id: format!("{:#04x}", packet.kind().id()),
        fields: PacketFields::of(packet),
        peer_id,
        timestamp: now_unix_seconds(),
    };
    print_record(&out, format);
}

#[derive(Serialize)]
struct KindOutput {
    id: String,
    name: &'static str,
    min_len: usize,
    size: &'static str,
}

pub fn print_kinds(format: OutputFormat) {
    let kinds: Vec<KindOutput> = PacketKind::ALL
        .iter()
        .map(|kind| KindOutput {
            id: format!("{:#04x}", kind.id()),
            name: kind.name(),
            min_len: kind.min_len(),
            size: if kind.is_fixed_size() {
                "fixed"
            } else {
                "variable"
            },
        })
        .collect();
    let reserved: Vec<String> = (0..=u8::MAX)
        .filter(|id| is_reserved(*id))
        .map(|id| format!("{id:#04x}"))
        .collect();

    match format {
        OutputFormat::Json => {
            let out = serde_json::json!({ "kinds": kinds, "reserved": reserved });
            println!("{out}");
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "NAME", "MIN LEN", "SIZE"]);
            for kind in &kinds {
                table.add_row(vec![
                    kind.id.clone(),
                    kind.name.to_string(),
                    kind.min_len.to_string(),
                    kind.size.to_string(),
                ]);
            }
            println!("{table}");
            println!("reserved: {}", reserved.join(", "));
        }
        OutputFormat::Pretty => {
            for kind in &kinds {
                println!(
                    "{} {} min_len={} {}",
                    kind.id, kind.name, kind.min_len, kind.size
                );
            }
        }
        OutputFormat::Raw => {
            for kind in &kinds {
                println!("{}", kind.name);
            }
        }
    }
}

#[derive(Serialize)]
struct EncodedOutput {
    kind: &'static str,
    len: usize,
    hex: String,
}

pub fn print_encoded(kind: PacketKind, wire: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Raw => print_raw(wire),
        OutputFormat::Pretty => println!("{}", to_hex(wire)),
        _ => print_record(
            &EncodedOutput {
                kind: kind.name(),
                len: wire.len(),
                hex: to_hex(wire),
            },
            format,
        ),
    }
}

/// Print one flat record as a JSON line, a FIELD/VALUE table, or `key=value` pairs.
fn print_record<T: Serialize>(record: &T, format: OutputFormat) {
    let value = serde_json::to_value(record).unwrap_or_default();
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, field) in fields(&value) {
                table.add_row(vec![key, field]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            let line: Vec<String> = fields(&value)
                .into_iter()
                .map(|(key, field)| format!("{key}={field}"))
                .collect();
            println!("{}", line.join(" "));
        }
    }
}

fn fields(value: &serde_json::Value) -> Vec<(String, String)> {
    let Some(map) = value.as_object() else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, field)| {
            let rendered = match field {
                serde_json::Value::String(text) => text.clone(),
                serde_json::Value::Null => "-".to_string(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Lowercase hex without separators.
pub fn to_hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for byte in data {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Parse hex, ignoring whitespace, `:` separators and a leading `0x`.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex input has an odd number of digits"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).unwrap_or("??");
            u8::from_str_radix(text, 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex byte '{text}'")))
        })
        .collect()
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("0x{}", to_hex(payload)),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
