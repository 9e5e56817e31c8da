use pixgate::transport::framing::FrameCodec;
use pixgate::rpc::{ChunkFrame, Envelope};
use bytes::Bytes;
use tokio::io::BufReader;

#[tokio::test]
async fn test_frame_codec() {
    let data = b"Hello, World!";
    let mut buffer = Vec::new();

    FrameCodec::write_frame(&mut buffer, data).await.unwrap();

    let mut reader = BufReader::new(&buffer[..]);
    let result = FrameCodec::read_frame(&mut reader).await.unwrap();

    assert_eq!(result.as_deref(), Some(&data[..]));
}

#[tokio::test]
async fn test_multiple_frames() {
    let messages: Vec<&[u8]> = vec![b"first", b"second message", b"third"];
    let mut buffer = Vec::new();

    for msg in &messages {
        FrameCodec::write_frame(&mut buffer, msg).await.unwrap();
    }

    let mut reader = BufReader::new(&buffer[..]);

    for expected in &messages {
        let result = FrameCodec::read_frame(&mut reader).await.unwrap();
        assert_eq!(result.as_deref(), Some(*expected));
    }
    assert!(FrameCodec::read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn test_chunk_envelope_over_frames() {
    let frame = ChunkFrame {
        image_id: "img-1".into(),
        filter_type: 3,
        data: Bytes::from_static(&[0, 159, 146, 150, 255]),
        chunk_number: 0,
        is_last: true,
    };
    let mut buffer = Vec::new();
    FrameCodec::write_json(&mut buffer, &Envelope::Message { body: frame.clone() })
        .await
        .unwrap();
    FrameCodec::write_json(&mut buffer, &Envelope::<ChunkFrame>::Close)
        .await
        .unwrap();

    let mut reader = BufReader::new(&buffer[..]);
    let first: Envelope<ChunkFrame> = FrameCodec::read_json(&mut reader).await.unwrap().unwrap();
    let second: Envelope<ChunkFrame> = FrameCodec::read_json(&mut reader).await.unwrap().unwrap();

    assert_eq!(first, Envelope::Message { body: frame });
    assert_eq!(second, Envelope::Close);
}

#[tokio::test]
async fn test_frame_split_across_reads() {
    let mut mock = tokio_test::io::Builder::new()
        .read(&[0, 0])
        .read(&[0, 5, b'c'])
        .read(b"hunk")
        .build();

    let frame = FrameCodec::read_frame(&mut mock).await.unwrap();
    assert_eq!(frame.as_deref(), Some(&b"chunk"[..]));
}

#[tokio::test]
async fn test_write_frame_prefixes_length() {
    let mut mock = tokio_test::io::Builder::new()
        .write(&[0, 0, 0, 4])
        .write(b"ping")
        .build();

    FrameCodec::write_frame(&mut mock, b"ping").await.unwrap();
}
