use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use nfq_mutator::modification::{Duplicate, Ipv6Frag, registry};
use nfq_mutator::packet::ipv6::NEXT_UDP;
use nfq_mutator::packet::{fragment6, reassemble6};
use nfq_mutator::{Layer, Mod, Packet, PacketList, parse_mod_spec};

fn udp6(payload_len: usize, fill: u8) -> Packet {
    Packet::ipv6(
        NEXT_UDP,
        Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1),
        Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2),
        &vec![fill; payload_len],
    )
    .unwrap()
}

fn udp4(payload_len: usize) -> Packet {
    let payload = vec![7; payload_len];
    Packet::ipv4(17, Ipv4Addr::new(192, 0, 2, 1), Ipv4Addr::new(192, 0, 2, 2), &payload).unwrap()
}

fn sample_list() -> PacketList {
    let mut list = PacketList::new();
    list.add_delayed_packet(udp6(64, 1), Duration::from_millis(1));
    list.add_delayed_packet(udp4(64), Duration::from_millis(2));
    list.add_delayed_packet(udp6(64, 3), Duration::from_millis(3));
    list
}

#[test]
fn every_mod_leaves_an_empty_list_empty() {
    for entry in registry::entries() {
        let args: Vec<String> = match entry.name {
            "duplicate" => vec!["random".into()],
            _ => vec!["1280".into()],
        };
        let m = (entry.build)(&args).unwrap();
        assert!(m.apply(PacketList::new()).unwrap().is_empty(), "{}", entry.name);
    }
}

#[test]
fn fixed_duplicate_grows_the_list_by_one() {
    for index in -3..3 {
        let list = sample_list();
        let out = Duplicate::parse_args(&[index.to_string()]).unwrap().apply(list.clone()).unwrap();
        assert_eq!(out.len(), list.len() + 1);

        let pos = list.resolve_index(index).unwrap() as isize;
        assert_eq!(out.get(pos).unwrap().packet, out.get(pos + 1).unwrap().packet);
        assert_eq!(out.get(pos).unwrap().packet, list.get(pos).unwrap().packet);
    }
}

#[test]
fn out_of_range_duplicate_changes_nothing() {
    for index in ["3", "-4", "1000"] {
        let out = Duplicate::parse_args(&[index]).unwrap().apply(sample_list()).unwrap();
        assert_eq!(out, sample_list());
    }
}

#[test]
fn random_duplicate_of_single_packet() {
    let m = parse_mod_spec("duplicate random").unwrap();
    assert_eq!(m.get_params()["duplicate_index"], "random");
    for _ in 0..20 {
        let out = m.apply(std::iter::once(udp6(10, 9)).collect()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(0).unwrap().packet, out.get(1).unwrap().packet);
    }
}

#[test]
fn fragmentation_is_identity_when_nothing_is_oversized() {
    let list = sample_list();
    let out = Ipv6Frag::new(1280).apply(list.clone()).unwrap();
    assert_eq!(out, list);
}

#[test]
fn three_fragments_keep_the_wait_on_the_first() {
    let mut list = PacketList::new();
    list.add_delayed_packet(udp6(3000, 0x42), Duration::from_millis(5));

    let out = parse_mod_spec("ipv6_frag 1280").unwrap().apply(list).unwrap();
    assert_eq!(out.len(), 3);
    let delays: Vec<Duration> = out.iter().map(|p| p.delay).collect();
    assert_eq!(delays, vec![Duration::from_millis(5), Duration::ZERO, Duration::ZERO]);
    assert_eq!(out.total_delay(), Duration::from_millis(5));
}

#[test]
fn fragments_reassemble_to_the_original() {
    let original = udp6(4000, 0x17);
    let mut list = PacketList::new();
    list.add_packet(original.clone());
    list.add_packet(udp4(1500));

    let out = Ipv6Frag::new(1000).apply(list).unwrap();
    let fragments: Vec<Packet> = out
        .iter()
        .map(|p| p.packet.clone())
        .filter(|p| p.has_layer(Layer::Ipv6Fragment))
        .collect();

    assert!(fragments.len() > 1);
    assert!(fragments.iter().all(|f| f.len() <= 1000));
    assert_eq!(reassemble6(&fragments).unwrap(), original);
    assert!(!out.get(-1).unwrap().packet.is_ipv6());
}

#[test]
fn fragment_and_frag_mod_agree() {
    let packet = udp6(2500, 5);
    let direct = fragment6(&packet, 700).unwrap();
    let via_mod: Vec<Packet> = Ipv6Frag::new(700)
        .apply(std::iter::once(packet).collect())
        .unwrap()
        .into_iter()
        .map(|p| p.packet)
        .collect();
    assert_eq!(direct, via_mod);
}

#[test]
fn chained_mods_compose() {
    let mods = [
        parse_mod_spec("ipv6_frag 600").unwrap(),
        parse_mod_spec("duplicate first").unwrap(),
    ];
    let mut list = PacketList::new();
    list.add_delayed_packet(udp6(1000, 2), Duration::from_millis(4));

    let out = mods.iter().try_fold(list, |list, m| m.apply(list)).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out.get(0).unwrap().delay, Duration::from_millis(4));
    assert_eq!(out.get(1).unwrap().delay, Duration::ZERO);
    assert_eq!(out.get(0).unwrap().packet, out.get(1).unwrap().packet);
    assert!(mods.iter().all(|m| m.is_deterministic()));
}
