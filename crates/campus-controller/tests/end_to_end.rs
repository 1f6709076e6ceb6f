//! Packet-in to flow-mod scenarios over the built-in campus topology.

use campus_controller::{
    CampusConfig, Controller, ControllerError, Disposition, FloodScope, FlowDecision, FlowSink,
    PacketIn, ProtocolSelector,
};
use campus_openflow::{
    ArpHeader, BufferId, DatapathId, EtherType, FlowAction, FlowMatch, FlowMod, FrameBuilder,
    Packet, PortNo, Segment,
};
use campus_types::{Ipv4Address, MacAddress};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::thread;

const CORE: DatapathId = DatapathId::new(1);
const DATA_CENTER: DatapathId = DatapathId::new(2);
const FLOOR1_S1: DatapathId = DatapathId::new(3);
const FLOOR2_S1: DatapathId = DatapathId::new(5);
const AIR_GAP: DatapathId = DatapathId::new(6);

const SERVER: Ipv4Address = Ipv4Address::new(30, 1, 4, 66);
const LAPTOP: Ipv4Address = Ipv4Address::new(20, 2, 1, 10);
const DEVICE1: Ipv4Address = Ipv4Address::new(20, 2, 1, 30);
const HOST1: Ipv4Address = Ipv4Address::new(10, 2, 7, 10);
const TRUSTED: Ipv4Address = Ipv4Address::new(104, 24, 32, 100);
const UNTRUSTED: Ipv4Address = Ipv4Address::new(108, 44, 83, 103);

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(DatapathId, FlowMod)>>,
}

impl FlowSink for RecordingSink {
    fn send_flow_mod(&self, dpid: DatapathId, flow_mod: &FlowMod) -> Result<(), String> {
        self.sent
            .lock()
            .map_err(|e| e.to_string())?
            .push((dpid, flow_mod.clone()));
        Ok(())
    }
}

fn controller() -> Controller {
    Controller::from_config(&CampusConfig::default()).unwrap()
}

fn frames() -> FrameBuilder {
    FrameBuilder::new(
        MacAddress::new([0, 0, 0, 0, 0, 1]),
        MacAddress::new([0, 0, 0, 0, 0, 2]),
    )
}

fn icmp(src: Ipv4Address, dst: Ipv4Address) -> Vec<u8> {
    frames().ipv4(src, dst, Segment::Icmp { icmp_type: 8, code: 0 })
}

fn tcp(src: Ipv4Address, dst: Ipv4Address) -> Vec<u8> {
    frames().ipv4(
        src,
        dst,
        Segment::Tcp {
            src_port: 51000,
            dst_port: 22,
        },
    )
}

fn udp(src: Ipv4Address, dst: Ipv4Address) -> Vec<u8> {
    frames().ipv4(
        src,
        dst,
        Segment::Udp {
            src_port: 5353,
            dst_port: 53,
        },
    )
}

fn dispatch(controller: &Controller, dpid: DatapathId, in_port: u16, data: Vec<u8>) -> Disposition {
    controller
        .dispatch(&PacketIn::new(dpid, PortNo::new(in_port), data))
        .unwrap()
}

#[test]
fn arp_is_flooded_on_every_switch() {
    let controller = controller();
    let frame = frames().arp(ArpHeader::REQUEST, UNTRUSTED, MacAddress::ZERO, SERVER);

    for dpid in 1..=7 {
        let disposition = dispatch(&controller, DatapathId::new(dpid), 2, frame.clone());
        assert_eq!(disposition.decision, FlowDecision::flood(FloodScope::Arp));

        let flow_mod = disposition.flow_mod.unwrap();
        assert_eq!(flow_mod.flow_match, FlowMatch::new().with_dl_type(EtherType::ARP));
        assert_eq!(flow_mod.actions, vec![FlowAction::Flood]);
    }
}

#[test]
fn non_ip_traffic_gets_an_exact_flood() {
    let frame = frames().ethertype(EtherType::LLDP, &[0u8; 32]);
    let disposition = dispatch(&controller(), FLOOR1_S1, 3, frame);

    assert_eq!(disposition.decision, FlowDecision::flood(FloodScope::ExactPacket));
    let flow_mod = disposition.flow_mod.unwrap();
    assert_eq!(flow_mod.flow_match.in_port, Some(PortNo::new(3)));
    assert_eq!(flow_mod.flow_match.dl_type, Some(EtherType::LLDP));
    assert_eq!(flow_mod.flow_match.dl_src, Some(MacAddress::new([0, 0, 0, 0, 0, 1])));
    assert_eq!(flow_mod.actions, vec![FlowAction::Flood]);
}

#[test]
fn untrusted_icmp_to_internal_a_is_denied_at_core() {
    let disposition = dispatch(&controller(), CORE, 7, icmp(UNTRUSTED, LAPTOP));

    assert_eq!(
        disposition.decision,
        FlowDecision::deny(ProtocolSelector::Icmp, "untrusted-icmp-to-internal-a")
    );
    let flow_mod = disposition.flow_mod.unwrap();
    assert_eq!(
        flow_mod.flow_match,
        FlowMatch::new()
            .with_dl_type(EtherType::IPV4)
            .with_nw_proto(1)
            .with_nw_src(UNTRUSTED)
            .with_nw_dst(LAPTOP)
    );
    assert!(flow_mod.is_drop());
    assert_eq!((flow_mod.idle_timeout, flow_mod.hard_timeout), (50, 50));
}

#[test]
fn trusted_tcp_to_server_is_denied_outside_isolation() {
    let controller = controller();
    for dpid in 1..=5 {
        let disposition = dispatch(&controller, DatapathId::new(dpid), 1, tcp(TRUSTED, SERVER));
        assert_eq!(
            disposition.decision,
            FlowDecision::deny(ProtocolSelector::Tcp, "trusted-tcp-to-server"),
            "dpid {dpid}"
        );
    }
}

#[test]
fn laptop_reaches_server_hop_by_hop() {
    let controller = controller();

    let at_floor = dispatch(&controller, FLOOR1_S1, 2, tcp(LAPTOP, SERVER));
    assert_eq!(at_floor.decision, FlowDecision::forward(PortNo::new(1)));

    let at_core = dispatch(&controller, CORE, 2, tcp(LAPTOP, SERVER));
    assert_eq!(at_core.decision, FlowDecision::forward(PortNo::new(1)));

    let frame = tcp(LAPTOP, SERVER);
    let at_dc = dispatch(&controller, DATA_CENTER, 1, frame.clone());
    assert_eq!(at_dc.decision, FlowDecision::forward(PortNo::new(2)));

    let flow_mod = at_dc.flow_mod.unwrap();
    assert_eq!(
        flow_mod.flow_match,
        FlowMatch::new()
            .with_dl_type(EtherType::IPV4)
            .with_nw_proto(6)
            .with_in_port(PortNo::new(1))
            .with_nw_src(LAPTOP)
            .with_nw_dst(SERVER)
    );
    assert_eq!(flow_mod.actions, vec![FlowAction::Output { port: PortNo::new(2) }]);

    // Later packets of the same flow hit the entry; other ports and hosts miss.
    let next = Packet::parse(&frame).unwrap();
    assert!(flow_mod
        .flow_match
        .covers(&FlowMatch::from_packet(&next, PortNo::new(1))));
    assert!(!flow_mod
        .flow_match
        .covers(&FlowMatch::from_packet(&next, PortNo::new(3))));
    let other = Packet::parse(&tcp(DEVICE1, SERVER)).unwrap();
    assert!(!flow_mod
        .flow_match
        .covers(&FlowMatch::from_packet(&other, PortNo::new(1))));
}

#[test]
fn core_forwards_toward_the_facing_switch() {
    let controller = controller();
    let cases = [
        (LAPTOP, 2),
        (DEVICE1, 3),
        (HOST1, 4),
        (TRUSTED, 6),
        (UNTRUSTED, 7),
        (Ipv4Address::new(40, 2, 5, 12), 5),
    ];
    for (dst, port) in cases {
        let disposition = dispatch(&controller, CORE, 1, udp(SERVER, dst));
        assert_eq!(disposition.decision, FlowDecision::forward(PortNo::new(port)), "{dst}");
    }
}

#[test]
fn core_drops_unknown_destinations_without_a_rule() {
    let sink = RecordingSink::default();
    let event = PacketIn::new(CORE, PortNo::new(2), udp(LAPTOP, Ipv4Address::new(1, 1, 1, 1)));

    let disposition = controller().handle(&event, &sink).unwrap();
    assert_eq!(disposition.decision, FlowDecision::implicit_drop());
    assert_eq!(disposition.flow_mod, None);
    assert!(sink.sent.lock().unwrap().is_empty());
}

#[test]
fn isolation_switch_forwards_inside_the_subnet() {
    let controller = controller();
    let src = Ipv4Address::new(40, 2, 5, 3);
    for last in [1u8, 20, 200] {
        let dst = Ipv4Address::new(40, 2, 5, last);
        let disposition = dispatch(&controller, AIR_GAP, 4, tcp(src, dst));
        assert_eq!(
            disposition.decision,
            FlowDecision::forward(PortNo::new(u16::from(last) + 1))
        );
    }
}

#[test]
fn isolation_switch_denies_crossing_traffic_whatever_the_protocol() {
    let controller = controller();
    let inside = Ipv4Address::new(40, 2, 5, 3);

    for frame in [
        icmp(LAPTOP, inside),
        tcp(inside, SERVER),
        udp(TRUSTED, inside),
        frames().ipv4(inside, HOST1, Segment::Other(47)),
    ] {
        let disposition = dispatch(&controller, AIR_GAP, 1, frame);
        assert_eq!(
            disposition.decision,
            FlowDecision::deny(ProtocolSelector::Any, "isolation")
        );
        let flow_mod = disposition.flow_mod.unwrap();
        assert!(flow_mod.is_drop());
        assert_eq!(flow_mod.flow_match.nw_proto, None);
    }
}

#[test]
fn isolation_switch_ignores_campus_rules() {
    let disposition = dispatch(&controller(), AIR_GAP, 1, tcp(TRUSTED, SERVER));
    assert_eq!(
        disposition.decision,
        FlowDecision::deny(ProtocolSelector::Any, "isolation")
    );
}

#[test]
fn server_switch_blocks_untrusted_for_every_protocol() {
    let disposition = dispatch(&controller(), DATA_CENTER, 1, udp(UNTRUSTED, SERVER));
    assert_eq!(
        disposition.decision,
        FlowDecision::deny(ProtocolSelector::Any, "untrusted-to-server")
    );

    let at_core = dispatch(&controller(), CORE, 7, udp(UNTRUSTED, SERVER));
    assert_eq!(at_core.decision, FlowDecision::forward(PortNo::new(1)));
}

#[test]
fn core_blocks_untrusted_when_the_server_hangs_off_it() {
    let mut config = CampusConfig::default();
    for switch in &mut config.switches {
        match switch.name.as_str() {
            "d_c_s1" => {
                switch.ports.remove("30.1.4.66");
            }
            "core_s1" => {
                switch.ports.insert("30.1.4.66".to_string(), 8);
            }
            _ => {}
        }
    }
    let controller = Controller::from_config(&config).unwrap();

    for frame in [udp(UNTRUSTED, SERVER), tcp(UNTRUSTED, SERVER)] {
        let disposition = dispatch(&controller, CORE, 7, frame);
        assert_eq!(
            disposition.decision,
            FlowDecision::deny(ProtocolSelector::Any, "untrusted-to-server")
        );
        assert!(disposition.flow_mod.unwrap().is_drop());
    }

    let from_laptop = dispatch(&controller, CORE, 2, udp(LAPTOP, SERVER));
    assert_eq!(from_laptop.decision, FlowDecision::forward(PortNo::new(8)));
}

#[test]
fn internal_subnets_cannot_ping_each_other() {
    let controller = controller();
    let a_to_b = dispatch(&controller, FLOOR1_S1, 2, icmp(LAPTOP, HOST1));
    assert_eq!(
        a_to_b.decision,
        FlowDecision::deny(ProtocolSelector::Icmp, "internal-a-icmp-to-internal-b")
    );

    let b_to_a = dispatch(&controller, FLOOR2_S1, 2, icmp(HOST1, LAPTOP));
    assert_eq!(
        b_to_a.decision,
        FlowDecision::deny(ProtocolSelector::Icmp, "internal-b-icmp-to-internal-a")
    );

    let tcp_ok = dispatch(&controller, FLOOR2_S1, 2, tcp(HOST1, LAPTOP));
    assert_eq!(tcp_ok.decision, FlowDecision::forward(PortNo::new(1)));
}

#[test]
fn configured_rules_follow_campus_rules() {
    let config = CampusConfig::from_toml_str(
        r#"
        [[policy.rules]]
        name = "no-udp-to-server"
        protocol = "udp"
        src = "any"
        dst = "30.1.4.66"
        "#,
        "inline",
    )
    .unwrap();
    let controller = Controller::from_config(&config).unwrap();

    let udp_event = dispatch(&controller, FLOOR1_S1, 2, udp(LAPTOP, SERVER));
    assert_eq!(
        udp_event.decision,
        FlowDecision::deny(ProtocolSelector::Udp, "no-udp-to-server")
    );
    let trusted_tcp = dispatch(&controller, CORE, 6, tcp(TRUSTED, SERVER));
    assert_eq!(
        trusted_tcp.decision,
        FlowDecision::deny(ProtocolSelector::Tcp, "trusted-tcp-to-server")
    );
}

#[test]
fn unknown_switch_applies_policy_then_drops() {
    let controller = controller();
    let unknown = DatapathId::new(42);

    let denied = dispatch(&controller, unknown, 1, icmp(UNTRUSTED, SERVER));
    assert_eq!(
        denied.decision,
        FlowDecision::deny(ProtocolSelector::Icmp, "untrusted-icmp-to-server")
    );

    let dropped = dispatch(&controller, unknown, 1, tcp(LAPTOP, SERVER));
    assert_eq!(dropped.decision, FlowDecision::implicit_drop());
    assert_eq!(dropped.flow_mod, None);
}

#[test]
fn same_event_gives_same_disposition() {
    let controller = controller();
    let event = PacketIn::new(FLOOR1_S1, PortNo::new(2), tcp(LAPTOP, SERVER))
        .with_buffer_id(BufferId::from_wire(9));

    let first = controller.dispatch(&event).unwrap();
    let second = controller.dispatch(&event).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first.flow_mod.and_then(|m| m.buffer_id),
        BufferId::from_wire(9)
    );
}

#[test]
fn bad_events_install_nothing() {
    let controller = controller();
    let sink = RecordingSink::default();

    let truncated = PacketIn::new(CORE, PortNo::new(1), vec![0xff; 12]);
    assert!(matches!(
        controller.handle(&truncated, &sink),
        Err(ControllerError::MalformedPacket { .. })
    ));

    let mut unparsed = PacketIn::new(CORE, PortNo::new(1), tcp(LAPTOP, SERVER));
    unparsed.parsed = false;
    assert!(matches!(
        controller.handle(&unparsed, &sink),
        Err(ControllerError::Unparsed { .. })
    ));

    assert!(sink.sent.lock().unwrap().is_empty());
}

#[test]
fn events_can_be_handled_in_parallel() {
    let controller = Arc::new(controller());
    let sink = Arc::new(RecordingSink::default());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let controller = Arc::clone(&controller);
            let sink = Arc::clone(&sink);
            thread::spawn(move || {
                let event = PacketIn::new(FLOOR1_S1, PortNo::new(2), tcp(LAPTOP, SERVER));
                controller.handle(&event, sink.as_ref()).unwrap()
            })
        })
        .collect();

    for handle in handles {
        let disposition = handle.join().unwrap();
        assert_eq!(disposition.decision, FlowDecision::forward(PortNo::new(1)));
    }
    assert_eq!(sink.sent.lock().unwrap().len(), 4);
}
