use crate::error::TransportError;
use crate::gate::ImagePayload;
use crate::rpc::chunk::{ChunkFrame, DEFAULT_CHUNK_SIZE, encode};
use crate::rpc::reassembly::Reassembler;
use crate::rpc::wire::APPLY_FILTER_STREAM;
use crate::transport::Channel;
use bytes::Bytes;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Lifecycle of one filter stream.
///
/// `Opening -> Sending -> SendClosed -> Done`, or `Errored` from any state.
/// Receiving runs alongside `Sending` and `SendClosed` and is not a separate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Sending,
    SendClosed,
    Done,
    Errored,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Done | SessionState::Errored)
    }
}

/// One duplex `ApplyFilterStream` call. A session runs at most once.
///
/// The send half writes frames in encoder order and half-closes after the last
/// one; the receive half drains the worker's frames into a [`Reassembler`] the
/// whole time. The two halves are joined with `try_join!`: the first failure
/// drops the other half and the partially reassembled bytes with it.
pub struct StreamSession {
    channel: Channel,
    image_id: String,
    deadline: Option<Duration>,
    state: watch::Sender<SessionState>,
    started: AtomicBool,
}

impl StreamSession {
    pub fn new(channel: Channel, image_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SessionState::Opening);
        Self {
            channel,
            image_id: image_id.into(),
            deadline: None,
            state,
            started: AtomicBool::new(false),
        }
    }

    /// Fail with `DeadlineExceeded` if the whole exchange takes longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.channel.addr()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Stream `frames` to the worker and return everything it streams back.
    ///
    /// Dropping the returned future aborts both halves. A second call fails
    /// with `Protocol` and leaves the recorded state untouched.
    pub async fn run<I>(&self, frames: I) -> Result<Bytes, TransportError>
    where
        I: IntoIterator<Item = ChunkFrame>,
        I::IntoIter: Send,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TransportError::Protocol(format!(
                "stream session for {} already ran",
                self.image_id
            )));
        }

        let started = Instant::now();
        let exchange = self.exchange(frames.into_iter());

        let result = match self.deadline {
            Some(limit) => match tokio::time::timeout(limit, exchange).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::DeadlineExceeded(limit)),
            },
            None => exchange.await,
        };

        match &result {
            Ok(output) => {
                self.transition(SessionState::Done);
                info!(
                    image_id = %self.image_id,
                    endpoint = %self.endpoint(),
                    bytes = output.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "filter stream completed"
                );
            }
            Err(e) => {
                self.transition(SessionState::Errored);
                warn!(
                    image_id = %self.image_id,
                    endpoint = %self.endpoint(),
                    error = %e,
                    "filter stream failed"
                );
            }
        }
        result
    }

    async fn exchange<I>(&self, frames: I) -> Result<Bytes, TransportError>
    where
        I: Iterator<Item = ChunkFrame> + Send,
    {
        self.transition(SessionState::Opening);
        let (mut reader, mut writer) = self.channel.open(APPLY_FILTER_STREAM).await?;
        self.transition(SessionState::Sending);

        let send = async {
            let mut sent = 0usize;
            for frame in frames {
                writer.send(&frame).await?;
                sent += 1;
            }
            writer.close_send().await?;
            self.transition(SessionState::SendClosed);
            debug!(image_id = %self.image_id, frames = sent, "send half closed");
            Ok::<_, TransportError>(())
        };

        let receive = async {
            let mut reassembler = Reassembler::new();
            while let Some(frame) = reader.recv::<ChunkFrame>().await? {
                reassembler.accept(frame);
            }
            debug!(
                image_id = %self.image_id,
                frames = reassembler.frames_received(),
                bytes = reassembler.len(),
                "receive half reached end of stream"
            );
            Ok::<_, TransportError>(reassembler.finish())
        };

        let ((), output) = tokio::try_join!(send, receive)?;
        Ok(output)
    }

    fn transition(&self, next: SessionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(image_id = %self.image_id, from = ?prev, to = ?next, "session state");
        }
    }
}

/// Client for the filter worker's `ApplyFilterStream` call.
#[derive(Debug, Clone)]
pub struct FilterClient {
    channel: Channel,
    chunk_size: NonZeroUsize,
    deadline: Option<Duration>,
}

impl FilterClient {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            chunk_size: DEFAULT_CHUNK_SIZE,
            deadline: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }

    /// A fresh session for `image_id`; each filter request owns its own.
    pub fn session(&self, image_id: impl Into<String>) -> StreamSession {
        StreamSession::new(self.channel.clone(), image_id).with_deadline(self.deadline)
    }

    /// Chunk `payload`, stream it through the worker and return the reassembled
    /// output. An empty `Ok` means the worker sent nothing back.
    pub async fn apply_filter_stream(
        &self,
        image_id: &str,
        filter_type: i32,
        payload: &ImagePayload,
    ) -> Result<Bytes, TransportError> {
        let frames = encode(payload, image_id, filter_type, self.chunk_size)?;
        debug!(
            image_id,
            filter_type,
            bytes = payload.len(),
            chunks = frames.total_chunks(),
            "starting filter stream"
        );
        self.session(image_id).run(frames).await
    }
}
