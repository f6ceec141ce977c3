//! Replays a captured response body through the decoder.
//!
//! ```text
//! cargo run -p completion-stream --example replay_capture -- capture.sse
//! ```

use bytes::Bytes;
use completion_stream::prelude::*;
use completion_stream::init_observability;

const CHUNK_SIZE: usize = 512;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DecoderConfig::from_env()?;
    init_observability(&config.log);

    let path = std::env::args()
        .nth(1)
        .ok_or("usage: replay_capture <capture-file>")?;
    let raw = std::fs::read(&path)?;

    let chunks: Vec<Result<Bytes, std::io::Error>> = raw
        .chunks(CHUNK_SIZE)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();

    let mut session = StreamSession::with_config(config);
    let mut sink: Vec<Notification> = Vec::new();
    let outcome = drive(futures::stream::iter(chunks), &mut session, &mut sink).await;

    eprintln!("{} notifications", sink.len());
    match outcome {
        Ok(completion) => println!("{}", serde_json::to_string_pretty(&completion)?),
        Err(StreamError::Truncated { received_text, .. }) => {
            eprintln!("capture ended without a stop reason");
            println!("{}", serde_json::to_string_pretty(&session.steps())?);
            eprintln!("{} bytes of text received", received_text.len());
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
