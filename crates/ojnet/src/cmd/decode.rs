use ojnet_packet::{kind::is_reserved, CodecConfig, PacketCodec, PacketError};

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, packet_error, CliResult, SUCCESS};
use crate::output::{parse_hex, print_packet, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let datagram = match (&args.hex, &args.file) {
        (Some(hex), _) => parse_hex(hex)?,
        (None, Some(path)) => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => Vec::new(),
    };

    let mut config = CodecConfig::default();
    if let Some(max) = args.max_decompressed {
        config.max_decompressed_payload = max;
    }
    let codec = PacketCodec::with_config(config);

    let packet = codec.decode_datagram(&datagram).map_err(|err| {
        let context = match err {
            PacketError::UnknownKind(id) if is_reserved(id) => "decode failed (reserved kind id)",
            _ => "decode failed",
        };
        packet_error(context, err)
    })?;
    print_packet(&packet, None, format);
    Ok(SUCCESS)
}
