//! Operator interaction on the controlling terminal
//!
//! Prompts are answered on stdin. When the operator accepts a terminal
//! session, a minimal terminal relays typed lines to the target and target
//! bytes to stdout until the escape line or end of input.

use std::io::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use bbio_detect::{AdapterLink, DetectError, InteractionPort};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin,
};
use tracing::debug;

/// Line that ends a terminal session
pub const ESCAPE_LINE: &str = "~.";

/// How long a terminal read waits before checking for input again
const TERMINAL_POLL: Duration = Duration::from_millis(50);

/// Interpret a yes/no answer; an empty line means no
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Relay between a line source, an output and the bridged link
///
/// Typed lines are sent with a CR LF line ending. Returns when the escape
/// line is typed or the input ends.
pub async fn relay<R, W, L>(
    lines: &mut Lines<R>,
    out: &mut W,
    link: &mut L,
) -> Result<(), DetectError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    L: AdapterLink,
{
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim_end() == ESCAPE_LINE => break,
                Some(line) => {
                    let mut data = line.into_bytes();
                    data.extend_from_slice(b"\r\n");
                    link.write(&data).await?;
                }
                None => break,
            },
            chunk = link.read(256, TERMINAL_POLL) => {
                let chunk = chunk?;
                if !chunk.is_empty() {
                    out.write_all(&chunk).await?;
                    out.flush().await?;
                }
            }
        }
    }
    Ok(())
}

/// [`InteractionPort`] backed by a line-oriented input, normally stdin
pub struct TerminalInteraction<R> {
    lines: Lines<R>,
}

impl TerminalInteraction<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> TerminalInteraction<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    async fn next_line(&mut self) -> Result<String, DetectError> {
        self.lines
            .next_line()
            .await?
            .ok_or_else(|| DetectError::Interaction("input closed".to_string()))
    }
}

fn show(text: &str) {
    print!("{}", text);
    let _ = std::io::stdout().flush();
}

#[async_trait]
impl<R, L> InteractionPort<L> for TerminalInteraction<R>
where
    R: AsyncBufRead + Unpin + Send,
    L: AdapterLink,
{
    async fn confirm(&mut self, prompt: &str) -> Result<bool, DetectError> {
        loop {
            show(&format!("{} [y/N] ", prompt));
            let line = self.next_line().await?;
            match parse_answer(&line) {
                Some(answer) => return Ok(answer),
                None => println!("Please answer y or n."),
            }
        }
    }

    async fn await_manual_advance(&mut self) -> Result<(), DetectError> {
        println!("Press the UBTN button on the adapter to continue.");
        Ok(())
    }

    async fn hand_off_to_terminal(&mut self, link: &mut L, rate: u32) -> Result<(), DetectError> {
        println!(
            "--- Terminal on {} at {} baud, type {} on its own line to leave ---",
            link.name(),
            rate,
            ESCAPE_LINE
        );
        let mut stdout = tokio::io::stdout();
        relay(&mut self.lines, &mut stdout, link).await?;
        debug!("Terminal session at {} baud ended", rate);
        println!("--- Terminal closed ---");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbio_detect::StreamLink;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("y"), Some(true));
        assert_eq!(parse_answer(" YES\r"), Some(true));
        assert_eq!(parse_answer(""), Some(false));
        assert_eq!(parse_answer("No"), Some(false));
        assert_eq!(parse_answer("maybe"), None);
    }

    #[tokio::test]
    async fn test_confirm_retries_until_understood() {
        let mut port = TerminalInteraction::new(&b"maybe\nyes\n"[..]);
        let answer =
            InteractionPort::<StreamLink<tokio::io::DuplexStream>>::confirm(&mut port, "Open?")
                .await
                .unwrap();
        assert!(answer);
    }

    #[tokio::test]
    async fn test_confirm_on_closed_input_fails() {
        let mut port = TerminalInteraction::new(&b""[..]);
        let err =
            InteractionPort::<StreamLink<tokio::io::DuplexStream>>::confirm(&mut port, "Open?")
                .await
                .unwrap_err();
        assert!(matches!(err, DetectError::Interaction(_)));
    }

    #[tokio::test]
    async fn test_relay_sends_lines_until_escape() {
        let (host, mut device) = duplex(256);
        let mut link = StreamLink::new("duplex", host);
        let mut lines = BufReader::new(&b"help\nstatus\n~.\nignored\n"[..]).lines();
        let mut out = Vec::new();

        relay(&mut lines, &mut out, &mut link).await.unwrap();

        let mut sent = vec![0u8; b"help\r\nstatus\r\n".len()];
        device.read_exact(&mut sent).await.unwrap();
        assert_eq!(sent, b"help\r\nstatus\r\n");
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ignored"));
    }

    #[tokio::test]
    async fn test_relay_prints_target_output() {
        let (host, mut device) = duplex(256);
        let (mut keyboard, input) = duplex(64);

        let session = tokio::spawn(async move {
            let mut link = StreamLink::new("duplex", host);
            let mut lines = BufReader::new(input).lines();
            let mut out = Vec::new();
            relay(&mut lines, &mut out, &mut link).await.unwrap();
            out
        });

        device.write_all(b"login: ").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        keyboard.write_all(b"~.\n").await.unwrap();

        assert_eq!(session.await.unwrap(), b"login: ");
    }
}
