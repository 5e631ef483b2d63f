use super::*;

fn ping(data: &'static [u8]) -> ApplicationDefined {
    ApplicationDefined {
        sub_type: 1,
        ssrc: 0x0000_aaaa,
        name: *b"PING",
        data: Bytes::from_static(data),
    }
}

#[test]
fn test_application_defined_unmarshal() {
    let tests: Vec<(&str, Bytes, std::result::Result<ApplicationDefined, Error>)> = vec![
        (
            "with data",
            Bytes::from_static(&[
                0x81, 0xcc, 0x00, 0x03, // subtype=1, APP, len=3
                0x00, 0x00, 0xaa, 0xaa, //
                b'P', b'I', b'N', b'G', //
                0x00, 0x00, 0x00, 0x2a, //
            ]),
            Ok(ping(&[0, 0, 0, 42])),
        ),
        (
            "name only",
            Bytes::from_static(&[
                0x81, 0xcc, 0x00, 0x02, //
                0x00, 0x00, 0xaa, 0xaa, //
                b'P', b'I', b'N', b'G', //
            ]),
            Ok(ping(&[])),
        ),
        (
            "padding stripped from data",
            Bytes::from_static(&[
                0xa1, 0xcc, 0x00, 0x04, // padding, subtype=1, APP, len=4
                0x00, 0x00, 0xaa, 0xaa, //
                b'P', b'I', b'N', b'G', //
                0x07, 0x00, 0x00, 0x00, //
                0x00, 0x00, 0x00, 0x04, // four octets of padding
            ]),
            Ok(ping(&[7, 0, 0, 0])),
        ),
        (
            "name cut off",
            Bytes::from_static(&[0x81, 0xcc, 0x00, 0x01, 0x00, 0x00, 0xaa, 0xaa]),
            Err(Error::PacketTooShort),
        ),
        (
            "rr type octet",
            Bytes::from_static(&[
                0x81, 0xc9, 0x00, 0x02, //
                0x00, 0x00, 0xaa, 0xaa, //
                b'P', b'I', b'N', b'G', //
            ]),
            Err(Error::WrongType),
        ),
    ];

    for (name, data, want) in tests {
        let got = ApplicationDefined::unmarshal(&mut data.clone()).map_err(Error::from);
        assert_eq!(got, want, "Unmarshal {name}");
    }
}

#[test]
fn test_application_defined_marshal() -> std::result::Result<(), util::Error> {
    let app = ApplicationDefined {
        sub_type: 31,
        ..ping(&[1, 2, 3, 4, 5, 6, 7, 8])
    };
    let data = app.marshal()?;
    assert_eq!(data.len(), 20);
    assert_eq!(&data[..4], &[0x9f, 0xcc, 0x00, 0x04]);
    assert_eq!(ApplicationDefined::unmarshal(&mut data.clone())?, app);

    match ping(&[1, 2, 3]).marshal() {
        Err(err) => assert_eq!(Error::WrongPadding, err),
        Ok(_) => panic!("unaligned APP data must not marshal"),
    }

    let bad_subtype = ApplicationDefined {
        sub_type: 32,
        ..ping(&[])
    };
    match bad_subtype.marshal() {
        Err(err) => assert_eq!(Error::InvalidSubType, err),
        Ok(_) => panic!("subtype above 31 must not marshal"),
    }

    Ok(())
}
