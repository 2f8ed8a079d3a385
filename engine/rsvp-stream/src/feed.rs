//! Newline-delimited JSON feed
//!
//! Each non-blank line is one RSVP payload. Lines are passed on as raw bytes,
//! so a line that is not UTF-8 is counted and dropped like any other
//! malformed payload. The feed pushes lines into the record queue until the
//! input ends, the token is cancelled or the queue closes. Dropping the feed
//! drops its sender, which closes the queue once no other producer holds one.

use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::channel::RsvpSender;
use crate::error::{Result, StreamError};

/// Pushes JSONL payloads from `reader` into the record queue
pub struct JsonlFeed<R> {
    reader: R,
    sender: RsvpSender,
}

impl JsonlFeed<BufReader<File>> {
    /// Feed reading from a file on disk
    pub async fn open(path: impl AsRef<Path>, sender: RsvpSender) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        info!(path = %path.as_ref().display(), "Opened RSVP feed file");
        Ok(Self::new(BufReader::new(file), sender))
    }
}

impl<R> JsonlFeed<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R, sender: RsvpSender) -> Self {
        Self { reader, sender }
    }

    /// Forward lines until end of input or cancellation.
    ///
    /// Returns the number of payloads read, valid or not.
    pub async fn run(self, cancel: CancellationToken) -> Result<u64> {
        let Self { mut reader, sender } = self;
        let mut buf = Vec::new();
        let mut forwarded = 0u64;

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(forwarded, "RSVP feed cancelled");
                    break;
                }
                read = reader.read_until(b'\n', &mut buf) => read?,
            };

            if read == 0 {
                info!(forwarded, "RSVP feed reached end of input");
                break;
            }

            let line = trim_line(&buf);
            if line.is_empty() {
                continue;
            }

            let sent = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(forwarded, "RSVP feed cancelled");
                    break;
                }
                sent = sender.send_payload(line) => sent,
            };

            match sent {
                Ok(_) => forwarded += 1,
                Err(StreamError::Closed) => {
                    warn!(forwarded, "Record queue closed, stopping RSVP feed");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        debug!(
            total = sender.stats().total_messages(),
            invalid = sender.stats().invalid_messages(),
            "RSVP feed finished"
        );
        Ok(forwarded)
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(line.len());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &line[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::channel;
    use crate::channel::tests::payload;
    use rsvp_core::CounterSink;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_feed_skips_blank_and_malformed_lines() {
        let input = format!("{}\n\n   \nnot json\n{}\n", payload(1, "event_id1"), payload(2, "event_id2"));
        let (sender, receiver) = channel(8, Arc::new(CounterSink::new()));
        let stats = sender.stats();

        let feed = JsonlFeed::new(input.as_bytes(), sender);
        let forwarded = feed.run(CancellationToken::new()).await.unwrap();

        assert_eq!(forwarded, 3);
        assert_eq!(stats.invalid_messages(), 1);
        assert_eq!(receiver.recv().await.unwrap().id, 1);
        assert_eq!(receiver.recv().await.unwrap().id, 2);
        // Feed dropped its sender: the queue is closed and drained
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_non_utf8_line_does_not_stop_feed() {
        let mut input = payload(1, "event_id1").into_bytes();
        input.extend_from_slice(b"\n\xff\xfe garbage\n");
        input.extend_from_slice(payload(2, "event_id2").as_bytes());
        input.push(b'\n');

        let (sender, receiver) = channel(8, Arc::new(CounterSink::new()));
        let stats = sender.stats();

        let feed = JsonlFeed::new(input.as_slice(), sender);
        let forwarded = feed.run(CancellationToken::new()).await.unwrap();

        assert_eq!(forwarded, 3);
        assert_eq!(stats.invalid_messages(), 1);
        assert_eq!(receiver.recv().await.unwrap().id, 1);
        assert_eq!(receiver.recv().await.unwrap().id, 2);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_last_line_without_newline_is_read() {
        let input = format!("{}\n{}", payload(1, "event_id1"), payload(2, "event_id2"));
        let (sender, receiver) = channel(8, Arc::new(CounterSink::new()));

        let feed = JsonlFeed::new(input.as_bytes(), sender);
        assert_eq!(feed.run(CancellationToken::new()).await.unwrap(), 2);

        assert_eq!(receiver.recv().await.unwrap().id, 1);
        assert_eq!(receiver.recv().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_feed_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for id in 0..5 {
            writeln!(file, "{}", payload(id, "event_id1")).unwrap();
        }

        let (sender, receiver) = channel(8, Arc::new(CounterSink::new()));
        let feed = JsonlFeed::open(file.path(), sender).await.unwrap();
        assert_eq!(feed.run(CancellationToken::new()).await.unwrap(), 5);

        let mut count = 0;
        while receiver.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let (sender, _receiver) = channel(1, Arc::new(CounterSink::new()));
        let result = JsonlFeed::open("/nonexistent/rsvps.jsonl", sender).await;
        assert!(matches!(result, Err(StreamError::Io(_))));
    }

    #[tokio::test]
    async fn test_cancel_unblocks_full_queue() {
        let input: String = (0..10).map(|id| payload(id, "event_id1") + "\n").collect();
        let (sender, _receiver) = channel(2, Arc::new(CounterSink::new()));
        let cancel = CancellationToken::new();

        let feed = JsonlFeed::new(std::io::Cursor::new(input.into_bytes()), sender);
        let handle = tokio::spawn(feed.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let forwarded = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap().unwrap();
        assert_eq!(forwarded, 2);
    }
}
