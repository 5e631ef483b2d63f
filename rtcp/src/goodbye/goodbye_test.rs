use super::*;

#[test]
fn test_goodbye_unmarshal() {
    let tests: Vec<(&str, Bytes, std::result::Result<Goodbye, Error>)> = vec![
        (
            "no sources",
            Bytes::from_static(&[0x80, 0xcb, 0x00, 0x00]),
            Ok(Goodbye::default()),
        ),
        (
            "two sources, no reason",
            Bytes::from_static(&[
                0x82, 0xcb, 0x00, 0x02, // count=2, BYE, len=2
                0x00, 0x00, 0x00, 0x0a, //
                0x00, 0x00, 0x00, 0x0b, //
            ]),
            Ok(Goodbye {
                sources: vec![10, 11],
                reason: Bytes::new(),
            }),
        ),
        (
            "reason with null fill",
            Bytes::from_static(&[
                0x81, 0xcb, 0x00, 0x03, // count=1, BYE, len=3
                0x00, 0x00, 0x00, 0x0a, //
                0x05, b'l', b'a', b't', // len=5
                b'e', b'r', 0x00, 0x00, //
            ]),
            Ok(Goodbye {
                sources: vec![10],
                reason: Bytes::from_static(b"later"),
            }),
        ),
        (
            "reason length past the body",
            Bytes::from_static(&[
                0x81, 0xcb, 0x00, 0x02, // count=1, BYE, len=2
                0x00, 0x00, 0x00, 0x0a, //
                0x09, b'l', b'a', b't', // len=9
            ]),
            Err(Error::PacketTooShort),
        ),
        (
            "more sources than words",
            Bytes::from_static(&[0x83, 0xcb, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0a]),
            Err(Error::PacketTooShort),
        ),
        (
            "length past the datagram",
            Bytes::from_static(&[0x81, 0xcb, 0x00, 0x05, 0x00, 0x00, 0x00, 0x0a]),
            Err(Error::PacketTooShort),
        ),
        (
            "app type octet",
            Bytes::from_static(&[0x81, 0xcc, 0x00, 0x01, 0x00, 0x00, 0x00, 0x0a]),
            Err(Error::WrongType),
        ),
    ];

    for (name, data, want) in tests {
        let got = Goodbye::unmarshal(&mut data.clone()).map_err(Error::from);
        assert_eq!(got, want, "Unmarshal {name}");
    }
}

#[test]
fn test_goodbye_marshal() {
    let tests: Vec<(&str, Goodbye, std::result::Result<Bytes, Error>)> = vec![
        (
            "no sources",
            Goodbye::default(),
            Ok(Bytes::from_static(&[0x80, 0xcb, 0x00, 0x00])),
        ),
        (
            "reason on a word boundary",
            Goodbye {
                sources: vec![0xdead_beef],
                reason: Bytes::from_static(b"off"),
            },
            Ok(Bytes::from_static(&[
                0x81, 0xcb, 0x00, 0x02, //
                0xde, 0xad, 0xbe, 0xef, //
                0x03, b'o', b'f', b'f', //
            ])),
        ),
        (
            "two sources with reason",
            Goodbye {
                sources: vec![1, 2],
                reason: Bytes::from_static(b"bye"),
            },
            Ok(Bytes::from_static(&[
                0x82, 0xcb, 0x00, 0x03, //
                0x00, 0x00, 0x00, 0x01, //
                0x00, 0x00, 0x00, 0x02, //
                0x03, b'b', b'y', b'e', //
            ])),
        ),
        (
            "32 sources",
            Goodbye {
                sources: (0..=COUNT_MAX as u32).collect(),
                reason: Bytes::new(),
            },
            Err(Error::TooManySources),
        ),
        (
            "256 octet reason",
            Goodbye {
                sources: vec![1],
                reason: Bytes::from(vec![b'r'; SDES_MAX_OCTET_COUNT + 1]),
            },
            Err(Error::ReasonTooLong),
        ),
    ];

    for (name, bye, want) in tests {
        let got = bye.marshal().map_err(Error::from);
        match (got, want) {
            (Ok(data), Ok(want)) => {
                assert_eq!(data, want, "Marshal {name}");
                let decoded = Goodbye::unmarshal(&mut data.clone()).expect("decodes");
                assert_eq!(decoded, bye, "{name}: decode after marshal");
            }
            (got, want) => assert_eq!(got.err(), want.err(), "Marshal {name}"),
        }
    }
}

#[test]
fn test_goodbye_reason_fill_is_not_padding() -> std::result::Result<(), util::Error> {
    let bye = Goodbye {
        sources: vec![7],
        reason: Bytes::from_static(b"12345"),
    };
    let data = bye.marshal()?;
    assert_eq!(data.len(), 16);
    assert_eq!(data[0] & 0x20, 0, "padding bit stays clear");
    assert_eq!(&data[13..], &[b'5', 0, 0]);
    Ok(())
}
