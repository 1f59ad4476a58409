//! Integration tests for pinwire.
//!
//! A scripted fake device sits on the far end of an in-memory duplex
//! pipe, decoding command frames with the same protocol stack and
//! answering (or misbehaving) per test.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use pinwire::capability::gpio;
use pinwire::protocol::{encode_frame, Decoded, Frame, FrameBuffer, FrameType};
use pinwire::{Arg, Client, ConnectionState, Manifest, PinwireError, ProtocolEvent, ResultValue};

const LED_PIN: u8 = 11;

fn manifest() -> Manifest {
    Manifest::single_board("ardu1", 1)
}

/// Read from the device end until `count` complete frames arrived.
async fn read_frames(stream: &mut DuplexStream, decoder: &mut FrameBuffer, count: usize) -> Vec<Frame> {
    let mut frames = Vec::new();
    let mut buf = [0u8; 256];
    while frames.len() < count {
        let n = stream.read(&mut buf).await.expect("device read");
        assert!(n > 0, "host closed while device awaited frames");
        for decoded in decoder.push(&buf[..n]) {
            match decoded {
                Decoded::Frame(frame) => frames.push(frame),
                Decoded::Corrupt(c) => panic!("device saw corrupt frame: {:?}", c.reason),
            }
        }
    }
    frames
}

async fn send_frame(stream: &mut DuplexStream, frame: &Frame) {
    let wire = encode_frame(frame).expect("encode device frame");
    stream.write_all(&wire).await.expect("device write");
}

#[tokio::test]
async fn digital_write_resolves_with_empty_result() {
    let (host, mut device) = duplex(1024);
    let client = Client::connect(host, manifest()).await.unwrap();

    let device_task = tokio::spawn(async move {
        let mut decoder = FrameBuffer::new();
        let frames = read_frames(&mut device, &mut decoder, 1).await;
        let cmd = &frames[0];

        assert_eq!(cmd.frame_type, FrameType::Command);
        assert_eq!(
            cmd.payload(),
            &[1, gpio::SUBSYSTEM, gpio::DIGITAL_WRITE, LED_PIN, 1]
        );

        send_frame(&mut device, &Frame::response(cmd.sequence, Vec::<u8>::new())).await;
        device
    });

    let result = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U8(1)])
        .await
        .unwrap();
    assert_eq!(result, ResultValue::Empty);

    let _device = device_task.await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn corrupted_echo_is_reported_and_does_not_touch_the_request() {
    let (host, mut device) = duplex(1024);
    let mut client = Client::connect(host, manifest()).await.unwrap();
    let mut events = client.notifications().unwrap();

    let device_task = tokio::spawn(async move {
        let mut decoder = FrameBuffer::new();
        let frames = read_frames(&mut device, &mut decoder, 1).await;
        let sequence = frames[0].sequence;

        // A corrupted echo of the response: checksum byte flipped.
        let mut corrupted = encode_frame(&Frame::response(sequence, Vec::<u8>::new())).unwrap();
        assert_eq!(corrupted.len(), 4); // type + seq + crc + END, unescaped
        corrupted[2] ^= 0x01;
        device.write_all(&corrupted).await.unwrap();

        // Then the real response.
        send_frame(&mut device, &Frame::response(sequence, Vec::<u8>::new())).await;
        device
    });

    // The pending request resolves despite the corrupt frame in front.
    let result = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U8(1)])
        .await
        .unwrap();
    assert_eq!(result, ResultValue::Empty);

    // The corruption was surfaced with both checksum values.
    let event = events.recv().await.unwrap();
    match event {
        ProtocolEvent::Corruption(c) => {
            let (computed, received) = c.checksums().expect("checksum mismatch reason");
            assert_ne!(computed, received);
        }
        other => panic!("expected Corruption, got {other:?}"),
    }

    let _device = device_task.await.unwrap();
}

#[tokio::test]
async fn out_of_order_responses_resolve_by_sequence_id() {
    let (host, mut device) = duplex(1024);
    let client = Client::connect(host, manifest()).await.unwrap();

    let device_task = tokio::spawn(async move {
        let mut decoder = FrameBuffer::new();
        let frames = read_frames(&mut device, &mut decoder, 2).await;

        // Answer in reverse arrival order; the result byte encodes the
        // pin that was asked about.
        for cmd in frames.iter().rev() {
            let pin = cmd.payload()[3];
            send_frame(&mut device, &Frame::response(cmd.sequence, vec![pin * 10])).await;
        }
        device
    });

    let (a, b) = tokio::join!(
        client.invoke("ardu1.gpio.digitalRead", &[Arg::U8(2)]),
        client.invoke("ardu1.gpio.digitalRead", &[Arg::U8(3)]),
    );

    assert_eq!(a.unwrap(), ResultValue::U8(20));
    assert_eq!(b.unwrap(), ResultValue::U8(30));

    let _device = device_task.await.unwrap();
}

#[tokio::test]
async fn silent_device_times_out_and_frees_the_sequence_id() {
    let (host, mut device) = duplex(1024);
    let client = Client::builder(manifest())
        .request_timeout(Duration::from_millis(50))
        .connect(host)
        .await
        .unwrap();

    let device_task = tokio::spawn(async move {
        let mut decoder = FrameBuffer::new();

        // Swallow the first command entirely.
        let _ = read_frames(&mut device, &mut decoder, 1).await;

        // Answer the second one.
        let frames = read_frames(&mut device, &mut decoder, 1).await;
        send_frame(&mut device, &Frame::response(frames[0].sequence, Vec::<u8>::new())).await;
        device
    });

    let err = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U8(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, PinwireError::RequestTimeout));

    // The connection is still open and a fresh invoke works.
    let result = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U8(0)])
        .await
        .unwrap();
    assert_eq!(result, ResultValue::Empty);

    let _device = device_task.await.unwrap();
}

#[tokio::test]
async fn peer_hangup_fails_all_pending_requests() {
    let (host, mut device) = duplex(1024);
    let client = Arc::new(Client::connect(host, manifest()).await.unwrap());

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let client = Arc::clone(&client);
        waiters.push(tokio::spawn(async move {
            client
                .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U8(1)])
                .await
        }));
    }

    // Let the commands reach the device, then hang up without answering.
    let mut decoder = FrameBuffer::new();
    let _ = read_frames(&mut device, &mut decoder, 3).await;
    drop(device);

    for waiter in waiters {
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(PinwireError::ConnectionClosed)));
    }

    // The state machine settles at Closed and further invokes fail fast.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    let err = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U8(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, PinwireError::ConnectionClosed));
}

#[tokio::test]
async fn unmatched_response_is_surfaced_not_dropped() {
    let (host, mut device) = duplex(1024);
    let mut client = Client::connect(host, manifest()).await.unwrap();
    let mut events = client.notifications().unwrap();

    send_frame(&mut device, &Frame::response(42, vec![1])).await;

    match events.recv().await.unwrap() {
        ProtocolEvent::UnmatchedResponse(frame) => {
            assert_eq!(frame.sequence, 42);
            assert_eq!(frame.payload(), &[1]);
        }
        other => panic!("expected UnmatchedResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn unsolicited_frames_arrive_in_order() {
    let (host, mut device) = duplex(1024);
    let mut client = Client::connect(host, manifest()).await.unwrap();
    let mut events = client.notifications().unwrap();

    send_frame(&mut device, &Frame::error(0x21)).await;
    send_frame(&mut device, &Frame::event(b"toggle".to_vec())).await;

    match events.recv().await.unwrap() {
        ProtocolEvent::RemoteError { code, .. } => assert_eq!(code, Some(0x21)),
        other => panic!("expected RemoteError, got {other:?}"),
    }
    match events.recv().await.unwrap() {
        ProtocolEvent::RemoteEvent(frame) => assert_eq!(frame.payload(), b"toggle"),
        other => panic!("expected RemoteEvent, got {other:?}"),
    }
}

#[tokio::test]
async fn caller_mistakes_fail_before_anything_is_sent() {
    let (host, _device) = duplex(1024);
    let client = Client::connect(host, manifest()).await.unwrap();

    let err = client.invoke("ardu1.gpio.selfDestruct", &[]).await.unwrap_err();
    assert!(matches!(err, PinwireError::UnknownCapability(_)));

    let err = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN)])
        .await
        .unwrap_err();
    assert!(matches!(err, PinwireError::ArgumentEncoding(_)));

    let err = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U16(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, PinwireError::ArgumentEncoding(_)));
}

#[tokio::test]
async fn analog_read_decodes_a_u16_result() {
    let (host, mut device) = duplex(1024);
    let client = Client::connect(host, manifest()).await.unwrap();

    let device_task = tokio::spawn(async move {
        let mut decoder = FrameBuffer::new();
        let frames = read_frames(&mut device, &mut decoder, 1).await;
        let cmd = &frames[0];

        assert_eq!(cmd.payload(), &[1, gpio::SUBSYSTEM, gpio::ANALOG_READ, 5]);
        send_frame(&mut device, &Frame::response(cmd.sequence, vec![0x03, 0x20])).await;
        device
    });

    let result = client
        .invoke("ardu1.gpio.analogRead", &[Arg::U8(5)])
        .await
        .unwrap();
    assert_eq!(result, ResultValue::U16(0x0320));

    let _device = device_task.await.unwrap();
}

#[tokio::test]
async fn late_reply_to_an_expired_request_is_unmatched() {
    let (host, mut device) = duplex(1024);
    let mut client = Client::builder(manifest())
        .request_timeout(Duration::from_millis(20))
        .connect(host)
        .await
        .unwrap();
    let mut events = client.notifications().unwrap();

    let device_task = tokio::spawn(async move {
        let mut decoder = FrameBuffer::new();
        let frames = read_frames(&mut device, &mut decoder, 1).await;
        // Reply long after the caller gave up.
        tokio::time::sleep(Duration::from_millis(100)).await;
        send_frame(&mut device, &Frame::response(frames[0].sequence, Vec::<u8>::new())).await;
        device
    });

    let err = client
        .invoke("ardu1.gpio.digitalWrite", &[Arg::U8(LED_PIN), Arg::U8(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, PinwireError::RequestTimeout));

    match events.recv().await.unwrap() {
        ProtocolEvent::UnmatchedResponse(_) => {}
        other => panic!("expected UnmatchedResponse, got {other:?}"),
    }

    let _device = device_task.await.unwrap();
}

#[tokio::test]
async fn close_flushes_and_settles_without_pending_requests() {
    let (host, mut device) = duplex(1024);
    let client = Client::connect(host, manifest()).await.unwrap();

    let device_task = tokio::spawn(async move {
        let mut decoder = FrameBuffer::new();
        let frames = read_frames(&mut device, &mut decoder, 1).await;
        send_frame(&mut device, &Frame::response(frames[0].sequence, Vec::<u8>::new())).await;
        device
    });

    client
        .invoke("ardu1.gpio.pinMode", &[Arg::U8(LED_PIN), Arg::U8(1)])
        .await
        .unwrap();

    let _device = device_task.await.unwrap();
    client.close().await.unwrap();
}
