use std::io::{Read, Write};
use std::path::Path;

use crate::engine::{Engine, TranscludeOptions, TranscludeOutput};
use crate::error::{ProcessingError, Result};
use crate::token::{CommentTracker, FenceTracker};

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrontmatterState {
    /// Before the first non-empty line; nothing decided yet
    Scanning,
    /// Inside a `---` block, consuming until the closing delimiter
    Yaml,
    /// Inside a `+++` block, consuming until the closing delimiter
    Toml,
    /// Past the block (or there never was one); lines pass through
    Done,
}

/// Line filter that removes a leading YAML (`---`) or TOML (`+++`) front
/// matter block.
///
/// The first non-empty line decides: an exact delimiter opens the block, any
/// other line moves straight to `Done`. Both delimiter lines and everything
/// between them are suppressed. No backtracking; once `Done`, every line
/// passes through.
#[derive(Debug)]
pub struct FrontmatterFilter {
    state: FrontmatterState,
}

impl FrontmatterFilter {
    /// A disabled filter never suppresses anything.
    pub fn new(enabled: bool) -> Self {
        Self {
            state: if enabled {
                FrontmatterState::Scanning
            } else {
                FrontmatterState::Done
            },
        }
    }

    /// Feeds the next line; returns `true` when it belongs to the front
    /// matter block and must not be emitted.
    pub fn suppress(&mut self, line: &str) -> bool {
        let text = line.strip_suffix('\r').unwrap_or(line);
        match self.state {
            FrontmatterState::Done => false,
            FrontmatterState::Scanning => {
                if text.trim().is_empty() {
                    false
                } else if text == "---" {
                    self.state = FrontmatterState::Yaml;
                    true
                } else if text == "+++" {
                    self.state = FrontmatterState::Toml;
                    true
                } else {
                    self.state = FrontmatterState::Done;
                    false
                }
            }
            FrontmatterState::Yaml => {
                if text == "---" {
                    self.state = FrontmatterState::Done;
                }
                true
            }
            FrontmatterState::Toml => {
                if text == "+++" {
                    self.state = FrontmatterState::Done;
                }
                true
            }
        }
    }
}

/// Incremental adapter around the transclusion engine.
///
/// Accepts the input as arbitrary byte chunks, reassembles complete lines
/// across chunk boundaries (carrying split multi-byte UTF-8 sequences), and
/// writes expanded output to the sink as lines complete. Memory use is
/// bounded by the longest input line plus the current expansion, not the
/// document size. Dropping the adapter before [`finish`](Self::finish)
/// abandons all buffered state; a partial line is never emitted half done.
pub struct StreamTransclusion<'a, W: Write> {
    engine: Engine<'a>,
    validate_only: bool,
    writer: W,
    /// Undecoded tail bytes of a multi-byte sequence split across chunks
    pending: Vec<u8>,
    /// Decoded text of the current incomplete line
    buffer: String,
    fence: FenceTracker,
    comments: CommentTracker,
    frontmatter: FrontmatterFilter,
    line_no: usize,
    notified: usize,
    on_file: Option<Box<dyn FnMut(&Path) + 'a>>,
}

impl<'a, W: Write> StreamTransclusion<'a, W> {
    pub fn new(options: &'a TranscludeOptions, writer: W) -> Self {
        Self {
            engine: Engine::new(options),
            validate_only: options.validate_only,
            writer,
            pending: Vec::new(),
            buffer: String::new(),
            fence: FenceTracker::new(),
            comments: CommentTracker::new(),
            frontmatter: FrontmatterFilter::new(options.strip_frontmatter),
            line_no: 0,
            notified: 0,
            on_file: None,
        }
    }

    /// Registers a callback fired once per distinct file the first time it
    /// is opened, for progress reporting.
    pub fn on_file_processed(mut self, callback: impl FnMut(&Path) + 'a) -> Self {
        self.on_file = Some(Box::new(callback));
        self
    }

    /// Diagnostics accumulated so far; append-only during the session.
    pub fn errors(&self) -> &[ProcessingError] {
        self.engine.errors()
    }

    /// Feeds the next chunk, processing every line it completes.
    ///
    /// # Errors
    ///
    /// Only sink write failures; expansion failures are accumulated.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.decode(chunk);
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.process_line(&line[..line.len() - 1], true)?;
        }
        Ok(())
    }

    /// Flushes the trailing partial line and returns the session result.
    /// `content` in the returned output is empty; expanded text went to the
    /// sink.
    ///
    /// # Errors
    ///
    /// Sink write or flush failures.
    pub fn finish(mut self) -> Result<TranscludeOutput> {
        if !self.pending.is_empty() {
            // stream ended mid-sequence; decode what remains, lossily
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.push_str(&tail);
            self.pending.clear();
        }
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.process_line(&line, false)?;
        }
        self.writer.flush()?;
        Ok(self.engine.into_output(String::new()))
    }

    fn process_line(&mut self, line: &str, complete: bool) -> Result<()> {
        self.line_no += 1;
        if self.frontmatter.suppress(line) {
            return Ok(());
        }
        let rendered = if self.fence.observe(line) {
            line.to_string()
        } else {
            self.engine
                .expand_line(line, Some(self.line_no), &mut self.comments)
        };
        self.notify_new_files();
        if !self.validate_only {
            self.writer.write_all(rendered.as_bytes())?;
            if complete {
                self.writer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    fn notify_new_files(&mut self) {
        if let Some(callback) = &mut self.on_file {
            let files = self.engine.processed_files();
            for path in &files[self.notified..] {
                callback(path);
            }
            self.notified = files.len();
        }
    }

    /// Appends a chunk to the decode buffer, moving every complete UTF-8
    /// sequence into the text buffer. An incomplete sequence at the tail is
    /// carried to the next chunk; invalid bytes become U+FFFD.
    fn decode(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    self.buffer.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_len = e.valid_up_to();
                    let valid = &self.pending[consumed..consumed + valid_len];
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    consumed += valid_len;
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        None => break,
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }
}

/// Drives a whole reader through the streaming adapter in fixed-size chunks.
/// The synchronous write to `writer` is the backpressure: no more input is
/// pulled than the sink has absorbed.
///
/// # Errors
///
/// Reader or sink IO failures; expansion failures are accumulated in the
/// returned output instead.
pub fn transclude_stream<R: Read, W: Write>(
    mut reader: R,
    writer: W,
    options: &TranscludeOptions,
) -> Result<TranscludeOutput> {
    let mut stream = StreamTransclusion::new(options, writer);
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        stream.write_chunk(&chunk[..n])?;
    }
    stream.finish()
}
