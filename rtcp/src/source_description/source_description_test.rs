use tokio_test::assert_ok;

use super::*;

fn cname(source: u32, text: &'static [u8]) -> SourceDescriptionChunk {
    SourceDescriptionChunk {
        source,
        items: vec![SourceDescriptionItem {
            sdes_type: SdesType::SdesCname,
            text: Bytes::from_static(text),
        }],
    }
}

#[test]
fn test_source_description_unmarshal() {
    let tests: Vec<(&str, Bytes, std::result::Result<SourceDescription, Error>)> = vec![
        (
            "no chunks",
            Bytes::from_static(&[0x80, 0xca, 0x00, 0x00]),
            Ok(SourceDescription::default()),
        ),
        (
            "chunk without items",
            Bytes::from_static(&[
                0x81, 0xca, 0x00, 0x02, //
                0x00, 0x00, 0x00, 0x07, //
                0x00, 0x00, 0x00, 0x00,
            ]),
            Ok(SourceDescription {
                chunks: vec![SourceDescriptionChunk {
                    source: 7,
                    items: vec![],
                }],
            }),
        ),
        (
            "cname filling its word",
            Bytes::from_static(&[
                0x81, 0xca, 0x00, 0x03, //
                0x00, 0x00, 0x00, 0x07, //
                0x01, 0x02, b'h', b'i', //
                0x00, 0x00, 0x00, 0x00,
            ]),
            Ok(SourceDescription {
                chunks: vec![cname(7, b"hi")],
            }),
        ),
        (
            "unknown item skipped",
            Bytes::from_static(&[
                0x81, 0xca, 0x00, 0x03, //
                0x00, 0x00, 0x00, 0x07, //
                0x0b, 0x01, 0xff, 0x01, // type 11, then CNAME "z"
                0x01, b'z', 0x00, 0x00,
            ]),
            Ok(SourceDescription {
                chunks: vec![cname(7, b"z")],
            }),
        ),
        (
            "two chunks",
            Bytes::from_static(&[
                0x82, 0xca, 0x00, 0x05, //
                0x00, 0x00, 0x00, 0x01, //
                0x01, 0x01, b'a', 0x00, //
                0x00, 0x00, 0x00, 0x02, //
                0x01, 0x03, b'b', b'c', //
                b'd', 0x00, 0x00, 0x00,
            ]),
            Ok(SourceDescription {
                chunks: vec![cname(1, b"a"), cname(2, b"bcd")],
            }),
        ),
        (
            "text longer than packet",
            Bytes::from_static(&[
                0x81, 0xca, 0x00, 0x02, //
                0x00, 0x00, 0x00, 0x07, //
                0x01, 0x09, b'h', b'i',
            ]),
            Err(Error::PacketTooShort),
        ),
        (
            "no END",
            Bytes::from_static(&[
                0x81, 0xca, 0x00, 0x02, //
                0x00, 0x00, 0x00, 0x07, //
                0x01, 0x02, b'h', b'i',
            ]),
            Err(Error::PacketTooShort),
        ),
        (
            "count above chunks present",
            Bytes::from_static(&[
                0x82, 0xca, 0x00, 0x02, //
                0x00, 0x00, 0x00, 0x07, //
                0x00, 0x00, 0x00, 0x00,
            ]),
            Err(Error::PacketTooShort),
        ),
        (
            "sender report",
            Bytes::from_static(&[0x80, 0xc8, 0x00, 0x00]),
            Err(Error::WrongType),
        ),
    ];

    for (name, data, want) in tests {
        let got = SourceDescription::unmarshal(&mut data.clone()).map_err(Error::from);
        assert_eq!(got, want, "Unmarshal {name}");
    }
}

#[test]
fn test_source_description_marshal() -> std::result::Result<(), util::Error> {
    let sdes = SourceDescription {
        chunks: vec![
            SourceDescriptionChunk {
                source: 0x0a0b_0c0d,
                items: vec![
                    SourceDescriptionItem {
                        sdes_type: SdesType::SdesCname,
                        text: Bytes::from_static(b"tx"),
                    },
                    SourceDescriptionItem {
                        sdes_type: SdesType::SdesTool,
                        text: Bytes::from_static(b"r"),
                    },
                ],
            },
            cname(3, b""),
        ],
    };

    let data = sdes.marshal()?;
    assert_eq!(
        &data[..],
        &[
            0x82, 0xca, 0x00, 0x05, //
            0x0a, 0x0b, 0x0c, 0x0d, //
            0x01, 0x02, b't', b'x', //
            0x06, 0x01, b'r', 0x00, //
            0x00, 0x00, 0x00, 0x03, //
            0x01, 0x00, 0x00, 0x00,
        ][..]
    );
    assert_eq!(SourceDescription::unmarshal(&mut data.clone())?, sdes);
    Ok(())
}

#[test]
fn test_source_description_marshal_errors() {
    let long = Bytes::from(vec![b'x'; SDES_MAX_OCTET_COUNT + 1]);
    let tests: Vec<(&str, SourceDescription, Error)> = vec![
        (
            "text too long",
            SourceDescription::with_cname(1, long),
            Error::SdesTextTooLong,
        ),
        (
            "END as item",
            SourceDescription {
                chunks: vec![SourceDescriptionChunk {
                    source: 1,
                    items: vec![SourceDescriptionItem::default()],
                }],
            },
            Error::SdesMissingType,
        ),
        (
            "too many chunks",
            SourceDescription {
                chunks: (0..=COUNT_MAX as u32).map(|s| cname(s, b"c")).collect(),
            },
            Error::TooManyChunks,
        ),
    ];

    for (name, sdes, want) in tests {
        match sdes.marshal() {
            Err(err) => assert_eq!(want, err, "{name}"),
            Ok(data) => panic!("{name}: marshalled to {data:?}"),
        }
    }
}

#[test]
fn test_source_description_private_item() -> std::result::Result<(), Error> {
    let item = assert_ok!(SourceDescriptionItem::private(b"ext", b"v1"));
    assert_eq!(item.sdes_type, SdesType::SdesPrivate);
    assert_eq!(&item.text[..], b"\x03extv1");
    assert_eq!(
        item.private_parts(),
        Some((Bytes::from_static(b"ext"), Bytes::from_static(b"v1")))
    );

    let bad = SourceDescriptionItem {
        sdes_type: SdesType::SdesPrivate,
        text: Bytes::from_static(&[9, b'a']),
    };
    assert_eq!(bad.private_parts(), None);
    assert_eq!(
        SourceDescriptionItem::private(&[b'p'; 200], &[b'v'; 60]).err(),
        Some(Error::SdesTextTooLong)
    );

    assert_eq!(SdesType::from(6), SdesType::SdesTool);
    assert_eq!(SdesType::from_wire(9), None);
    assert_eq!(SdesType::SdesLocation.to_string(), "LOC");
    Ok(())
}
