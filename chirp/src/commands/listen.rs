use anyhow::{Context, Result};
use chirp_core::events::{self, StreamCategory, StreamLine};
use chirp_core::{ByteStream, DecodedMessage, RadioSession};
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use super::{Bootstrap, CommandContext, input_error, open_radio};
use crate::cli::ListenOptions;
use crate::output::OutputFormat;
use crate::utils::print_info;

/// Pause after a failed read before trying again.
const ERROR_BACKOFF: Duration = Duration::from_millis(300);

const STOP_POLL: Duration = Duration::from_millis(50);

pub async fn handle_listen(ctx: &CommandContext, opts: ListenOptions) -> Result<()> {
    if opts.idle_log.is_zero() {
        return Err(input_error("--idle-log must be greater than 0"));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let worker_stop = Arc::clone(&stop);
    let port = ctx.port.clone();
    let format = ctx.format;

    let mut worker = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut radio = open_radio(&port, Bootstrap::Connect)?;
        let mut out = io::stdout().lock();
        writeln!(out, "rx listener started on {port}")?;
        run_listen(&mut radio, &opts, format, &worker_stop, &mut out)?;
        radio.close().context("close radio")
    });

    tokio::select! {
        joined = &mut worker => return joined.context("listener worker panicked")?,
        _ = tokio::signal::ctrl_c() => {
            print_info("Stopping listener...");
        }
    }

    stop.store(true, Ordering::Relaxed);
    worker.await.context("listener worker panicked")?
}

/// Prime the radio, then print everything it sends until `stop` is set.
///
/// Read failures are printed and retried; only output errors end the loop.
pub fn run_listen<S: ByteStream, W: Write>(
    radio: &mut RadioSession<S>,
    opts: &ListenOptions,
    format: OutputFormat,
    stop: &AtomicBool,
    out: &mut W,
) -> Result<()> {
    // Some nodes stay quiet until polled.
    match radio.get_radio_info() {
        Ok(messages) => print_messages(out, &messages, opts, format)?,
        Err(e) => writeln!(out, "[ERR] get radio info: {:#}", anyhow::Error::from(e))?,
    }

    let mut last_idle_log = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        match radio.read_response(true) {
            Ok(messages) if messages.is_empty() => {
                if last_idle_log.elapsed() >= opts.idle_log {
                    writeln!(out, "[IDLE] no packets")?;
                    last_idle_log = Instant::now();
                }
            }
            Ok(messages) => print_messages(out, &messages, opts, format)?,
            Err(e) => {
                writeln!(out, "[ERR] read response: {:#}", anyhow::Error::from(e))?;
                pause(ERROR_BACKOFF, stop);
            }
        }
        out.flush()?;
    }

    debug!("Listener stopped");
    Ok(())
}

fn print_messages<W: Write>(
    out: &mut W,
    messages: &[DecodedMessage],
    opts: &ListenOptions,
    format: OutputFormat,
) -> Result<()> {
    for line in messages.iter().flat_map(events::render) {
        if !is_shown(&line, opts) {
            continue;
        }
        match format {
            OutputFormat::Json => writeln!(out, "{json}", json = serde_json::to_string(&line)?)?,
            OutputFormat::Table => writeln!(out, "{line}")?,
        }
    }
    Ok(())
}

/// Text messages are always shown.
fn is_shown(line: &StreamLine, opts: &ListenOptions) -> bool {
    match line.category {
        StreamCategory::Event => !opts.no_events,
        StreamCategory::Packet => !opts.no_packets,
        StreamCategory::Telemetry => !opts.no_telemetry,
        StreamCategory::Message => true,
    }
}

fn pause(duration: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + duration;
    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        std::thread::sleep(STOP_POLL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_core::frame::encode_frame;
    use chirp_core::protobufs::{self, from_radio, mesh_packet};
    use chirp_core::{Message, SessionConfig};
    use std::collections::VecDeque;

    /// Plays back `reads`, then raises `stop` and times out.
    struct ScriptedStream {
        reads: VecDeque<io::Result<Vec<u8>>>,
        stop: Arc<AtomicBool>,
    }

    impl ByteStream for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                Some(Err(e)) => Err(e),
                None => {
                    self.stop.store(true, Ordering::Relaxed);
                    Err(io::ErrorKind::TimedOut.into())
                }
            }
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    fn options() -> ListenOptions {
        ListenOptions {
            idle_log: Duration::from_secs(3600),
            no_telemetry: false,
            no_events: false,
            no_packets: false,
        }
    }

    fn framed(variant: from_radio::PayloadVariant) -> Result<Vec<u8>> {
        let message = protobufs::FromRadio {
            payload_variant: Some(variant),
            ..Default::default()
        };
        Ok(encode_frame(&message.encode_to_vec())?)
    }

    fn text_packet(text: &str) -> from_radio::PayloadVariant {
        from_radio::PayloadVariant::Packet(protobufs::MeshPacket {
            from: 0x10,
            to: 0xFFFF_FFFF,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(protobufs::Data {
                portnum: protobufs::PortNum::TextMessageApp as i32,
                payload: text.as_bytes().to_vec(),
                ..Default::default()
            })),
            ..Default::default()
        })
    }

    fn listen(reads: Vec<io::Result<Vec<u8>>>, opts: &ListenOptions) -> Result<String> {
        let stop = Arc::new(AtomicBool::new(false));
        let stream = ScriptedStream {
            reads: reads.into(),
            stop: Arc::clone(&stop),
        };
        let config = SessionConfig {
            wake_send_interval: Duration::ZERO,
            poll_attempts: 1,
            poll_interval: Duration::ZERO,
            ..SessionConfig::default()
        };
        let mut radio = RadioSession::with_config(stream, config);

        let mut out = Vec::new();
        run_listen(&mut radio, opts, OutputFormat::Table, &stop, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_listen_prints_priming_dump_and_traffic() -> Result<()> {
        let output = listen(
            vec![
                Ok(framed(from_radio::PayloadVariant::ConfigCompleteId(42))?),
                Err(io::ErrorKind::TimedOut.into()),
                Ok(framed(text_packet("hello"))?),
            ],
            &options(),
        )?;

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "[EVT] config_complete_id=42");
        assert!(lines[1].starts_with("[PKT] from=!00000010 to=!ffffffff"));
        assert_eq!(lines[2], "[MSG] text=\"hello\"");
        assert_eq!(lines.len(), 3);
        Ok(())
    }

    #[test]
    fn test_listen_filters_keep_text_messages() -> Result<()> {
        let opts = ListenOptions {
            no_events: true,
            no_packets: true,
            ..options()
        };
        let output = listen(
            vec![
                Ok(framed(from_radio::PayloadVariant::ConfigCompleteId(42))?),
                Err(io::ErrorKind::TimedOut.into()),
                Ok(framed(text_packet("still here"))?),
            ],
            &opts,
        )?;
        assert_eq!(output, "[MSG] text=\"still here\"\n");
        Ok(())
    }

    #[test]
    fn test_listen_reports_errors_and_keeps_going() -> Result<()> {
        let output = listen(
            vec![
                Err(io::ErrorKind::TimedOut.into()),
                Err(io::Error::other("cable pulled")),
                Ok(framed(text_packet("back"))?),
            ],
            &options(),
        )?;

        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with("[ERR] get radio info: failed to get radio info"));
        assert_eq!(lines[1], "[ERR] read response: cable pulled");
        assert_eq!(lines.last().copied(), Some("[MSG] text=\"back\""));
        Ok(())
    }

    #[test]
    fn test_idle_line_after_quiet_period() -> Result<()> {
        let opts = ListenOptions {
            idle_log: Duration::from_nanos(1),
            ..options()
        };
        let output = listen(
            vec![
                Ok(framed(from_radio::PayloadVariant::Rebooted(true))?),
                Err(io::ErrorKind::TimedOut.into()),
                Err(io::ErrorKind::TimedOut.into()),
            ],
            &opts,
        )?;
        assert!(output.lines().any(|line| line == "[IDLE] no packets"));
        Ok(())
    }
}
