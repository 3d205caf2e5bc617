use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// One scripted outcome of a read call.
#[derive(Debug, Clone)]
pub(crate) enum Chunk {
    Data(Vec<u8>),
    Empty,
    Fail,
    /// Never ready. Stays queued, so every later read waits as well.
    Hang,
}

impl Chunk {
    pub(crate) fn text(s: &str) -> Self {
        Chunk::Data(s.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct FakeState {
    reads: VecDeque<Chunk>,
    written: Vec<u8>,
    fail_writes: Vec<Vec<u8>>,
}

/// Scripted transport for tests.
///
/// Every read call consumes one queued chunk (no data once the queue is
/// empty). Writes of a registered command fail, all others are
/// recorded and can be inspected through a [`FakeHandle`].
pub(crate) struct FakeBuffer {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Clone)]
pub(crate) struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBuffer {
    pub(crate) fn new(reads: Vec<Chunk>) -> (Self, FakeHandle) {
        let state = Arc::new(Mutex::new(FakeState {
            reads: reads.into(),
            ..Default::default()
        }));
        (
            Self {
                state: state.clone(),
            },
            FakeHandle { state },
        )
    }
}

impl FakeHandle {
    /// Everything written so far, as text.
    pub(crate) fn written(&self) -> String {
        String::from_utf8_lossy(&self.state.lock().unwrap().written).to_string()
    }

    /// Written commands, terminator removed.
    pub(crate) fn commands(&self) -> Vec<String> {
        self.written()
            .split_terminator('\n')
            .map(String::from)
            .collect()
    }

    pub(crate) fn clear_written(&self) {
        self.state.lock().unwrap().written.clear();
    }

    /// Makes every following write of exactly `command` fail.
    pub(crate) fn fail_write(&self, command: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_writes
            .push(format!("{}\n", command).into_bytes());
    }

    pub(crate) fn push_read(&self, chunk: Chunk) {
        self.state.lock().unwrap().reads.push_back(chunk);
    }

    pub(crate) fn pending_reads(&self) -> usize {
        self.state.lock().unwrap().reads.len()
    }
}

impl tokio::io::AsyncRead for FakeBuffer {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let mut state = self.state.lock().unwrap();
        if matches!(state.reads.front(), Some(Chunk::Hang)) {
            return std::task::Poll::Pending;
        }
        match state.reads.pop_front() {
            Some(Chunk::Data(mut data)) => {
                let c = if buf.remaining() < data.len() {
                    buf.remaining()
                } else {
                    data.len()
                };
                buf.put_slice(&data[0..c]);
                data.drain(0..c);
                if !data.is_empty() {
                    state.reads.push_front(Chunk::Data(data));
                }
                std::task::Poll::Ready(Ok(()))
            }
            Some(Chunk::Fail) => std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted read failure",
            ))),
            Some(Chunk::Empty) | Some(Chunk::Hang) | None => std::task::Poll::Ready(Ok(())),
        }
    }
}

impl tokio::io::AsyncWrite for FakeBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::result::Result<usize, std::io::Error>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes.iter().any(|prefix| buf.starts_with(prefix)) {
            return std::task::Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }
        state.written.extend_from_slice(buf);
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        std::task::Poll::Ready(Ok(()))
    }
}
