use super::*;
use crate::goodbye::Goodbye;
use crate::packet;

#[test]
fn test_compound_reader_partial_success() {
    let data = Bytes::from_static(&[
        0x80, 0xc9, 0x00, 0x01, // RR, len=1
        0x90, 0x2f, 0x9e, 0x2e, // ssrc
        0x80, 0xd0, 0x00, 0x01, // type 208, len=1
        0x01, 0x02, 0x03, 0x04, //
        0x81, 0xcb, 0x00, 0x09, // BYE, len=9 (overruns)
        0x90, 0x2f, 0x9e, 0x2e,
    ]);

    let mut reader = CompoundReader::new(data);
    let first = reader.next().expect("first").expect("rr is framed");
    assert_eq!(first.header.packet_type, PacketType::ReceiverReport);
    assert_eq!(first.first_ssrc(), Some(0x902f9e2e));
    let rr: ReceiverReport = first.decode().expect("rr decodes");
    assert_eq!(rr.ssrc, 0x902f9e2e);

    let second = reader.next().expect("second").expect("unknown type is framed");
    assert_eq!(second.header.packet_type, PacketType::Unsupported);
    assert_eq!(second.raw_type(), 0xd0);

    let third = reader.next().expect("third");
    assert_eq!(third, Err(Error::PacketTooShort));
    assert!(reader.next().is_none(), "iteration stops after a framing error");
}

#[test]
fn test_compound_reader_bad_version() {
    let data = Bytes::from_static(&[0x40, 0xc9, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]);
    let mut reader = CompoundReader::new(data);
    match reader.next() {
        Some(Err(err)) => assert_eq!(err, Error::BadVersion),
        other => panic!("expected a version error, got {other:?}"),
    }
    assert!(reader.next().is_none());
    assert!(CompoundReader::new(Bytes::new()).next().is_none());
}

#[test]
fn test_compound_validate() {
    let cname = SourceDescription::with_cname(1234, Bytes::from_static(b"cname"));

    let tests: Vec<(&str, Vec<Box<dyn Packet + Send + Sync>>, Option<Error>)> = vec![
        ("empty", vec![], Some(Error::EmptyCompound)),
        (
            "no cname",
            vec![Box::new(ReceiverReport::default())],
            Some(Error::MissingCname),
        ),
        (
            "bad first",
            vec![Box::new(cname.clone()), Box::new(ReceiverReport::default())],
            Some(Error::BadFirstPacket),
        ),
        (
            "valid rr",
            vec![
                Box::new(ReceiverReport::default()),
                Box::new(cname.clone()),
                Box::new(Goodbye {
                    sources: vec![1234],
                    reason: Bytes::new(),
                }),
            ],
            None,
        ),
        (
            "valid sr",
            vec![Box::new(SenderReport::default()), Box::new(cname)],
            None,
        ),
    ];

    for (name, packets, want) in tests {
        let got = validate(&packets).err();
        assert_eq!(got, want, "validate {name}: got {got:?}, want {want:?}");

        if want.is_none() {
            let data = packet::marshal(&packets).expect("marshal");
            let mut reader = CompoundReader::new(data);
            assert_eq!(reader.by_ref().filter(|p| p.is_ok()).count(), packets.len());
        }
    }
}
