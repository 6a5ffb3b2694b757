use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use ojnet_packet::{Operation, RejectReason};
use ojnet_peer::PeerError;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod echo;
pub mod encode;
pub mod kinds;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List packet kinds and their wire sizes.
    Kinds,
    /// Decode one datagram and print the packet.
    Decode(DecodeArgs),
    /// Encode a packet and print its bytes.
    #[command(subcommand)]
    Encode(EncodeCommand),
    /// Connect to a server and send one container.
    Send(SendArgs),
    /// Accept peers and print received packets.
    Listen(ListenArgs),
    /// Accept peers, acknowledge reliable containers, and echo payloads.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// How often blocking loops wake up to check for Ctrl-C.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Longest duration accepted on the command line.
pub const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Kinds => kinds::run(format),
        Command::Decode(args) => decode::run(args, format),
        Command::Encode(command) => encode::run(command, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Datagram as hex (e.g. 0c0100000568656c6c6f).
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,
    /// Read the datagram bytes from a file.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Largest decompressed container payload accepted, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_decompressed: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// ConnectionRequest (0x01).
    Request {
        #[arg(long)]
        client_id: u64,
        #[arg(long, default_value_t = ojnet_packet::PROTOCOL_VERSION)]
        protocol_version: u8,
    },
    /// ConnectionAccepted (0x02).
    Accepted {
        #[arg(long)]
        server_id: u64,
    },
    /// ConnectionRejected (0x03).
    Rejected {
        #[arg(long, value_enum)]
        reason: RejectArg,
    },
    /// Acknowledge (0x0A).
    Ack {
        /// Sequence ids (comma-separated, 1 to 255 of them).
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<u32>,
    },
    /// ChannelOperation (0x0B).
    ChannelOp {
        #[arg(long, value_enum)]
        operation: OperationArg,
        #[arg(long)]
        channel: u8,
    },
    /// Container (0x0C).
    Container(ContainerArgs),
}

#[derive(Args, Debug)]
pub struct ContainerArgs {
    #[arg(long, short = 'c', default_value = "0")]
    pub channel: u8,
    #[arg(long)]
    pub sequence_id: Option<u32>,
    #[arg(long)]
    pub ordered_id: Option<u16>,
    #[arg(long)]
    pub compressed: bool,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug, Default)]
pub struct PayloadArgs {
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex payload.
    #[arg(long = "hex", conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    /// Resolve the payload bytes; empty when no source is given.
    pub fn resolve(&self) -> CliResult<Vec<u8>> {
        if let Some(data) = &self.data {
            return Ok(data.as_bytes().to_vec());
        }
        if let Some(hex) = &self.hex {
            return crate::output::parse_hex(hex);
        }
        if let Some(path) = &self.file {
            return std::fs::read(path).map_err(|err| {
                crate::exit::io_error(&format!("failed reading {}", path.display()), err)
            });
        }
        Ok(Vec::new())
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum RejectArg {
    IncompatibleProtocolVersion,
    MaxConnectionsReached,
    RateLimited,
}

impl From<RejectArg> for RejectReason {
    fn from(arg: RejectArg) -> Self {
        match arg {
            RejectArg::IncompatibleProtocolVersion => RejectReason::IncompatibleProtocolVersion,
            RejectArg::MaxConnectionsReached => RejectReason::MaxConnectionsReached,
            RejectArg::RateLimited => RejectReason::RateLimited,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OperationArg {
    Open,
    Close,
    ResetOrderedIds,
}

impl From<OperationArg> for Operation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Open => Operation::OpenChannel,
            OperationArg::Close => Operation::CloseChannel,
            OperationArg::ResetOrderedIds => Operation::ResetOrderedIds,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Server address (e.g. 127.0.0.1:7777).
    pub addr: SocketAddr,
    /// Channel to send on. Application channels are opened first.
    #[arg(long, short = 'c', default_value = "1")]
    pub channel: u8,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Assign a sequence id.
    #[arg(long)]
    pub reliable: bool,
    /// Assign an ordered id.
    #[arg(long)]
    pub ordered: bool,
    /// Compress the payload.
    #[arg(long)]
    pub compressed: bool,
    /// Wait for one reply container and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
    /// Time between handshake resends (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub connect_timeout: String,
    /// Handshake attempts before giving up.
    #[arg(long, default_value = "5")]
    pub attempts: u32,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to bind (e.g. 0.0.0.0:7777).
    pub addr: SocketAddr,
    /// Only print containers on these channels (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<u8>>,
    /// Exit after printing N packets.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to bind (e.g. 0.0.0.0:7777).
    pub addr: SocketAddr,
    /// Only echo containers on these channels (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub channels: Option<Vec<u8>>,
    /// Maximum simultaneous connections.
    #[arg(long, default_value = "64")]
    pub max_connections: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    let duration = if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    };
    if duration > MAX_DURATION {
        return Err(CliError::new(
            USAGE,
            format!("duration must be at most {}s: {input}", MAX_DURATION.as_secs()),
        ));
    }
    Ok(duration)
}

/// What a serving loop does after a failed `accept`/`recv`.
#[derive(Debug)]
pub enum RecvErrorDisposition {
    /// Poll interval elapsed; check for shutdown and try again.
    Idle,
    /// The connection is over.
    Break,
    Fatal(PeerError),
}

pub fn classify_recv_error(err: PeerError) -> RecvErrorDisposition {
    match err {
        PeerError::Timeout(_) => RecvErrorDisposition::Idle,
        PeerError::Disconnected(_) => RecvErrorDisposition::Break,
        other => RecvErrorDisposition::Fatal(other),
    }
}

/// Returns a flag that flips to false on Ctrl-C.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}
