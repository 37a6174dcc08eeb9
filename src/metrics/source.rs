use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use log::{debug, info};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Split};
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::error::SourceError;

use super::types::RawSnapshot;

#[derive(Debug)]
pub enum SourceEvent {
    Snapshot(RawSnapshot),
    End,
    Error(SourceError),
}

/// A lazy, ordered sequence of runtime stats documents.
#[async_trait]
pub trait SnapshotSource: Send {
    async fn next_event(&mut self) -> SourceEvent;
}

fn decode(line: &str) -> SourceEvent {
    match RawSnapshot::from_json(line) {
        Ok(snapshot) => SourceEvent::Snapshot(snapshot),
        Err(err) => SourceEvent::Error(SourceError::Decode(err)),
    }
}

/// Reassembles newline-delimited documents from arbitrary body chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn extend(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    /// Next complete, non-blank line.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Whatever trails the last newline once the body has ended.
    pub fn take_remainder(&mut self) -> Option<String> {
        let raw = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&raw).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

/// Live stats stream from the Docker Engine API.
pub struct DockerStatsSource {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    lines: LineBuffer,
    finished: bool,
}

impl DockerStatsSource {
    pub fn stats_url(endpoint: &str, container: &str) -> String {
        format!(
            "{}/containers/{}/stats?stream=true",
            endpoint.trim_end_matches('/'),
            container
        )
    }

    /// Open the stream. Failing here means the daemon or container is not
    /// reachable, which callers treat as fatal.
    pub async fn connect(
        client: &reqwest::Client,
        endpoint: &str,
        container: &str,
    ) -> Result<Self, SourceError> {
        let url = Self::stats_url(endpoint, container);
        let response = client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { status, url });
        }
        info!("streaming stats for {} from {}", container, endpoint);

        Ok(DockerStatsSource {
            body: response.bytes_stream().boxed(),
            lines: LineBuffer::default(),
            finished: false,
        })
    }
}

#[async_trait]
impl SnapshotSource for DockerStatsSource {
    async fn next_event(&mut self) -> SourceEvent {
        loop {
            if let Some(line) = self.lines.next_line() {
                return decode(&line);
            }
            if self.finished {
                return match self.lines.take_remainder() {
                    Some(line) => decode(&line),
                    None => SourceEvent::End,
                };
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.lines.extend(&chunk),
                Some(Err(err)) => {
                    self.finished = true;
                    return SourceEvent::Error(SourceError::Transport(err));
                }
                None => {
                    debug!("stats body ended");
                    self.finished = true;
                }
            }
        }
    }
}

/// Replays a recording written by [`super::sink::JsonLinesRecorder`].
pub struct JsonLinesSource {
    path: PathBuf,
    lines: Split<BufReader<File>>,
    pace: Option<Interval>,
}

impl JsonLinesSource {
    /// A zero `pace` replays as fast as the consumer pulls.
    pub async fn open(path: &Path, pace: Duration) -> Result<Self, SourceError> {
        let file = File::open(path).await.map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let pace = (!pace.is_zero()).then(|| {
            let mut ticker = interval(pace);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        Ok(JsonLinesSource {
            path: path.to_path_buf(),
            lines: BufReader::new(file).split(b'\n'),
            pace,
        })
    }
}

#[async_trait]
impl SnapshotSource for JsonLinesSource {
    async fn next_event(&mut self) -> SourceEvent {
        if let Some(ticker) = self.pace.as_mut() {
            ticker.tick().await;
        }
        loop {
            match self.lines.next_segment().await {
                Ok(Some(raw)) => match String::from_utf8(raw) {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => return decode(&line),
                    Err(source) => {
                        return SourceEvent::Error(SourceError::Encoding {
                            path: self.path.clone(),
                            source,
                        })
                    }
                },
                Ok(None) => return SourceEvent::End,
                Err(source) => {
                    return SourceEvent::Error(SourceError::Io {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
    }
}
