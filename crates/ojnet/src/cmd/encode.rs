use ojnet_packet::{
    Acknowledge, ChannelOperation, ConnectionAccepted, ConnectionRejected, ConnectionRequest,
    Container, Packet,
};

use crate::cmd::EncodeCommand;
use crate::exit::{packet_error, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(command: EncodeCommand, format: OutputFormat) -> CliResult<i32> {
    let packet = build(command)?;
    let wire = packet
        .encode()
        .map_err(|err| packet_error("encode failed", err))?;
    print_encoded(packet.kind(), &wire, format);
    Ok(SUCCESS)
}

fn build(command: EncodeCommand) -> CliResult<Packet> {
    let packet = match command {
        EncodeCommand::Request {
            client_id,
            protocol_version,
        } => ConnectionRequest {
            client_id,
            protocol_version,
        }
        .into(),
        EncodeCommand::Accepted { server_id } => ConnectionAccepted::new(server_id).into(),
        EncodeCommand::Rejected { reason } => ConnectionRejected::new(reason.into()).into(),
        EncodeCommand::Ack { ids } => Acknowledge::new(ids).into(),
        EncodeCommand::ChannelOp { operation, channel } => {
            ChannelOperation::new(operation.into(), channel).into()
        }
        EncodeCommand::Container(args) => {
            let mut container = Container::new(args.channel, args.payload.resolve()?);
            container.sequence_id = args.sequence_id;
            container.ordered_id = args.ordered_id;
            container.compressed = args.compressed;
            container.into()
        }
    };
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::{ContainerArgs, OperationArg, PayloadArgs, RejectArg};

    fn wire(command: EncodeCommand) -> Vec<u8> {
        build(command).unwrap().encode().unwrap().to_vec()
    }

    #[test]
    fn request_layout() {
        let bytes = wire(EncodeCommand::Request {
            client_id: 42,
            protocol_version: 0,
        });
        assert_eq!(bytes, vec![0x01, 0, 0, 0, 0, 0, 0, 0, 42, 0]);
    }

    #[test]
    fn rejected_and_channel_op_layout() {
        assert_eq!(
            wire(EncodeCommand::Rejected {
                reason: RejectArg::RateLimited
            }),
            vec![0x03, 0x02]
        );
        assert_eq!(
            wire(EncodeCommand::ChannelOp {
                operation: OperationArg::ResetOrderedIds,
                channel: 5
            }),
            vec![0x0B, 0x02, 0x05]
        );
    }

    #[test]
    fn container_layout() {
        let bytes = wire(EncodeCommand::Container(ContainerArgs {
            channel: 1,
            sequence_id: Some(7),
            ordered_id: None,
            compressed: false,
            payload: PayloadArgs {
                data: Some("hi".to_string()),
                ..PayloadArgs::default()
            },
        }));
        assert_eq!(bytes, vec![0x0C, 0x01, 0x01, 0, 0, 0, 7, 0, 2, b'h', b'i']);
    }

    #[test]
    fn too_many_ack_ids_fail_to_encode() {
        let packet = build(EncodeCommand::Ack {
            ids: (0..256).collect(),
        })
        .unwrap();
        let err = packet_error("encode failed", packet.encode().unwrap_err());
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }
}
