//! Fuzz-style property tests for the wire codec.
//!
//! Decoders must handle arbitrary network input gracefully, and verification
//! must catch every non-finite transform that survives decoding.

use crazycanvas_core::AmmoType;
use crazycanvas_net::{
    ClientPacket, FlagPacket, MessageEnvelope, NetworkUid, PlayerAction, SchemaHash, ServerPacket,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn arbitrary_bytes_dont_crash_server_packet_decode(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _ = postcard::from_bytes::<ServerPacket>(&random_bytes);
    }

    #[test]
    fn arbitrary_bytes_dont_crash_client_packet_decode(
        random_bytes in prop::collection::vec(any::<u8>(), 0..2000),
    ) {
        let _ = postcard::from_bytes::<ClientPacket>(&random_bytes);
    }

    #[test]
    fn envelopes_roundtrip(tick in any::<u64>(), fired in any::<bool>(), reload in any::<bool>()) {
        let action = PlayerAction {
            fired_ammo: fired.then_some(AmmoType::Water),
            started_reload: reload,
        };
        let envelope = MessageEnvelope::dev(ClientPacket::Action(action), tick);
        let bytes = postcard::to_allocvec(&envelope).expect("Failed to encode");
        let decoded: MessageEnvelope<ClientPacket> =
            postcard::from_bytes(&bytes).expect("Failed to decode");
        prop_assert_eq!(decoded.schema, SchemaHash::DEV);
        prop_assert_eq!(decoded.tick, tick);
        prop_assert_eq!(decoded.payload, ClientPacket::Action(action));
    }

    #[test]
    fn verification_tracks_finiteness_through_the_codec(
        x in any::<f32>(), y in any::<f32>(), z in any::<f32>(),
    ) {
        let packet = ServerPacket::Flag {
            flag: NetworkUid(1),
            packet: FlagPacket::dropped([x, y, z]),
        };
        let bytes = postcard::to_allocvec(&packet).expect("Failed to encode");
        let decoded: ServerPacket = postcard::from_bytes(&bytes).expect("Failed to decode");
        prop_assert_eq!(
            decoded.verify().is_ok(),
            [x, y, z].iter().all(|c| c.is_finite())
        );
    }
}
