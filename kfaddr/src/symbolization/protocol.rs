//! Line Resolution Protocol Client
//!
//! One long-lived `addr2line` process answers every query of a run. Its
//! output per address is unbounded and unannounced (one line per inlined
//! frame), so each request is framed by a follow-up sentinel query for `,`.
//! `addr2line` answers the sentinel with an unresolved address-zero line,
//! which marks the end of the real answer.
//!
//! ```text
//! request:   ffffffff81001010\n
//!            ,\n
//! response:  0xffffffff81001010: foo at kernel/a.c:42
//!             (inlined by) bar at kernel/b.c:7
//!            0x0000000000000000: ?? ??:0            <- sentinel answer
//! ```
//!
//! A query for address zero is itself answered with an address-zero line,
//! so for that query only the second such line ends the response.
//!
//! Responses are not tagged, so exactly one query may be outstanding at a
//! time. Never pipeline requests against the same process.

use log::{debug, info};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::domain::SymbolizeError;

/// Upper bound on lines read for one query, so a runaway response cannot hang
pub const MAX_LINES_PER_QUERY: usize = 100;

const SENTINEL: &str = ",";
const UNRESOLVED: &str = "?? ??:0";

/// How long a child gets to exit after its input closes before it is killed
const EXIT_GRACE: Duration = Duration::from_millis(100);
const EXIT_POLL: Duration = Duration::from_millis(5);

/// Why a response ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// A bare `?? ??:0`
    Unresolved,
    /// The sentinel echoed back verbatim
    SentinelEcho,
    /// The sentinel's own answer, an annotated address zero
    NullAddress,
}

/// Classification of one output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    End(Terminator),
    /// A location record with its `0xADDR: ` echo removed
    Record(&'a str),
}

/// Classify a raw output line
///
/// Terminators are checked on the raw line, before the address echo is
/// removed. A real address that fails to resolve prints as
/// `0xADDR: ?? ??:0` and is a record; only the sentinel's reply may end
/// the response, otherwise it would be left in the pipe and answer the
/// next query.
#[must_use]
pub fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim_end();
    if line.is_empty() {
        Line::Blank
    } else if line == UNRESOLVED {
        Line::End(Terminator::Unresolved)
    } else if line == SENTINEL {
        Line::End(Terminator::SentinelEcho)
    } else if is_null_address_echo(line) {
        Line::End(Terminator::NullAddress)
    } else {
        Line::Record(strip_address_echo(line))
    }
}

/// Split a leading `0xHEX: ` into `(hex digits, rest)`
fn split_address_echo(line: &str) -> Option<(&str, &str)> {
    let hex = line.strip_prefix("0x")?;
    let digits = hex.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(hex.len());
    if digits == 0 {
        return None;
    }
    let rest = hex[digits..].strip_prefix(": ")?;
    Some((&hex[..digits], rest))
}

fn is_null_address_echo(line: &str) -> bool {
    split_address_echo(line).is_some_and(|(digits, _)| digits.bytes().all(|b| b == b'0'))
}

fn strip_address_echo(line: &str) -> &str {
    split_address_echo(line).map_or(line, |(_, rest)| rest)
}

/// Something that turns an address into raw `addr2line` location records
pub trait LineResolver {
    /// Resolve one address; an empty result means nothing was resolved
    ///
    /// # Errors
    /// Returns an error when the transport to the resolver fails
    fn resolve(&mut self, address: u64) -> io::Result<Vec<String>>;
}

/// Request/response framing over any writer/reader pair
pub struct LineClient<W, R> {
    input: W,
    output: R,
}

impl<W: Write, R: BufRead> LineClient<W, R> {
    pub fn new(input: W, output: R) -> Self {
        Self { input, output }
    }

    /// Send one address and collect its records
    ///
    /// # Errors
    /// Returns an error if writing the request or reading the response fails
    pub fn query(&mut self, address: u64) -> io::Result<Vec<String>> {
        write!(self.input, "{address:x}\n{SENTINEL}\n")?;
        self.input.flush()?;
        debug!("Sent address 0x{address:x} and sentinel '{SENTINEL}'");
        self.read_response(address)
    }

    fn read_response(&mut self, address: u64) -> io::Result<Vec<String>> {
        let mut records = Vec::new();
        let mut buf = String::new();
        // The answer to a query for 0 looks like the sentinel's
        let mut own_null_echo = address == 0;

        for _ in 0..MAX_LINES_PER_QUERY {
            buf.clear();
            if self.output.read_line(&mut buf)? == 0 {
                debug!("Resolver closed its output");
                return Ok(records);
            }
            match classify(&buf) {
                Line::Blank => {}
                Line::End(Terminator::NullAddress) if own_null_echo => {
                    own_null_echo = false;
                    debug!("Read line: {}", buf.trim_end());
                    records.push(strip_address_echo(buf.trim_end()).to_string());
                }
                Line::End(terminator) => {
                    debug!("Encountered termination line ({terminator:?}): {}", buf.trim_end());
                    return Ok(records);
                }
                Line::Record(record) => {
                    debug!("Read line: {}", buf.trim_end());
                    records.push(record.to_string());
                }
            }
        }

        debug!("Hit the {MAX_LINES_PER_QUERY}-line cap, treating the response as complete");
        Ok(records)
    }
}

impl<W: Write, R: BufRead> LineResolver for LineClient<W, R> {
    fn resolve(&mut self, address: u64) -> io::Result<Vec<String>> {
        self.query(address)
    }
}

/// The `addr2line` child process, alive for the whole batch
///
/// Dropping it closes the pipe and reaps the child, killing it if it does
/// not exit within [`EXIT_GRACE`].
pub struct Addr2LineProcess {
    child: Child,
    client: Option<LineClient<ChildStdin, BufReader<ChildStdout>>>,
}

impl Addr2LineProcess {
    /// Start `tool` bound to `target`
    ///
    /// # Errors
    /// Returns [`SymbolizeError::ToolNotFound`] if the tool is not installed,
    /// [`SymbolizeError::Spawn`] for any other spawn failure
    pub fn spawn(tool: &str, target: &Path) -> Result<Self, SymbolizeError> {
        let mut command = Command::new(tool);
        command
            .args(["--functions", "--pretty-print", "--inlines", "--addresses"])
            .arg(format!("--exe={}", target.display()));
        info!("Starting {tool} for {}", target.display());
        Self::start(tool, &mut command)
    }

    fn start(tool: &str, command: &mut Command) -> Result<Self, SymbolizeError> {
        let start = Instant::now();
        command.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::inherit());
        let mut child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SymbolizeError::ToolNotFound { tool: tool.to_string() }
            } else {
                SymbolizeError::Spawn { tool: tool.to_string(), source }
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SymbolizeError::Spawn {
                tool: tool.to_string(),
                source: io::Error::other("child pipes unavailable"),
            });
        };

        debug!(
            "{tool} process started in {:.2}ms",
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(Self { child, client: Some(LineClient::new(stdin, BufReader::new(stdout))) })
    }

    /// Close the input, give the child [`EXIT_GRACE`] to exit, then kill it
    fn shutdown(&mut self) {
        if self.client.take().is_none() {
            return;
        }
        let deadline = Instant::now() + EXIT_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!("addr2line exited ({status})");
                    return;
                }
                Ok(None) if Instant::now() < deadline => thread::sleep(EXIT_POLL),
                _ => break,
            }
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
        debug!("addr2line process killed");
    }
}

impl LineResolver for Addr2LineProcess {
    fn resolve(&mut self, address: u64) -> io::Result<Vec<String>> {
        match self.client.as_mut() {
            Some(client) => client.query(address),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "addr2line already stopped")),
        }
    }
}

impl Drop for Addr2LineProcess {
    fn drop(&mut self) {
        self.shutdown();
    }
}
