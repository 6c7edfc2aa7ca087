//! Line-oriented text transport
//!
//! One message per line: an optional address starting with `/`, then values
//! separated by whitespace. `12` is an Int, `1.5` a Float, `"text"` or a bare
//! word a String, `true`/`false` a Bool, `12L` a Long, `1.5d` a Double,
//! `#00ff` a Blob and `nil` a Nil.

use std::io::Write;

use tracing::debug;

use crate::message::{Message, Value};
use crate::{Result, TapeError};

use super::{Receiver, TransmitTarget, Transmitter};

/// Parse one text line into a message
///
/// # Errors
///
/// Returns error on an unterminated quote or a bad escape
pub fn parse_line(line: &str) -> Result<Message> {
    let mut tokens = tokenize(line.trim())?;
    let address = match tokens.first() {
        Some(Token::Bare(word)) if word.starts_with('/') => {
            let address = word.clone();
            tokens.remove(0);
            address
        }
        _ => String::new(),
    };

    let values = tokens.into_iter().map(Token::into_value).collect::<Result<_>>()?;
    Ok(Message::new(address, values))
}

enum Token {
    Bare(String),
    Quoted(String),
}

impl Token {
    fn into_value(self) -> Result<Value> {
        let word = match self {
            Self::Quoted(text) => return Ok(Value::String(text)),
            Self::Bare(word) => word,
        };

        if let Ok(v) = word.parse::<i32>() {
            return Ok(Value::Int(v));
        }
        if let Some(v) = word.strip_suffix('L').and_then(|w| w.parse::<i64>().ok()) {
            return Ok(Value::Long(v));
        }
        if let Some(v) = word.strip_suffix('d').and_then(|w| w.parse::<f64>().ok()) {
            return Ok(Value::Double(v));
        }
        if let Some(hex) = word.strip_prefix('#') {
            return hex::decode(hex)
                .map(Value::Blob)
                .map_err(|e| TapeError::MalformedMessage(format!("bad blob {word}: {e}")));
        }

        Ok(match word.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "nil" => Value::Nil,
            _ => match word.parse::<f32>() {
                Ok(v) => Value::Float(v),
                Err(_) => Value::String(word),
            },
        })
    }
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c != '"' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                word.push(c);
                chars.next();
            }
            tokens.push(Token::Bare(word));
            continue;
        }

        chars.next();
        let mut text = String::new();
        loop {
            match chars.next() {
                None => {
                    return Err(TapeError::MalformedMessage(format!(
                        "unterminated string in: {line}"
                    )))
                }
                Some('"') => break,
                Some('\\') => text.push(unescape(&mut chars)?),
                Some(c) => text.push(c),
            }
        }
        tokens.push(Token::Quoted(text));
    }

    Ok(tokens)
}

fn unescape(chars: &mut impl Iterator<Item = char>) -> Result<char> {
    let escaped = match chars.next() {
        Some('n') => '\n',
        Some('r') => '\r',
        Some('t') => '\t',
        Some('0') => '\0',
        Some(c @ ('\\' | '"' | '\'')) => c,
        Some('u') => {
            let code: String = chars
                .skip_while(|&c| c == '{')
                .take_while(|&c| c != '}')
                .collect();
            u32::from_str_radix(&code, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| TapeError::MalformedMessage(format!("bad unicode escape: {code}")))?
        }
        other => {
            return Err(TapeError::MalformedMessage(format!(
                "unknown escape: \\{}",
                other.map(String::from).unwrap_or_default()
            )))
        }
    };
    Ok(escaped)
}

/// Address filter for messages read from a text stream
#[derive(Debug, Default)]
pub struct LineReceiver {
    bound: Option<(u16, String)>,
}

impl LineReceiver {
    /// Create an unbound receiver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the receiver is bound
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Whether `message` should be delivered: the receiver is bound and the
    /// bound address is empty or equal to the message's
    #[must_use]
    pub fn accepts(&self, message: &Message) -> bool {
        self.bound
            .as_ref()
            .is_some_and(|(_, address)| address.is_empty() || *address == message.address)
    }
}

impl Receiver for LineReceiver {
    fn bind(&mut self, port: u16, address: &str) -> Result<()> {
        debug!("Receiving on port {port} for address '{address}'");
        self.bound = Some((port, address.to_string()));
        Ok(())
    }

    fn release(&mut self) {
        self.bound = None;
    }
}

/// Writes every sent message as one text line
#[derive(Debug)]
pub struct LineTransmitter<W: Write> {
    out: W,
    target: TransmitTarget,
}

impl<W: Write> LineTransmitter<W> {
    /// Wrap a writer
    pub fn new(out: W) -> Self {
        Self {
            out,
            target: TransmitTarget::default(),
        }
    }

    /// Underlying writer
    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Transmitter for LineTransmitter<W> {
    fn configure(&mut self, target: &TransmitTarget) -> Result<()> {
        debug!(
            "Transmitting to {}:{} as '{}'",
            target.host, target.port, target.address
        );
        self.target = target.clone();
        Ok(())
    }

    fn send(&mut self, message: &Message) -> Result<()> {
        if message.address.is_empty() {
            let stamped = Message::new(self.target.address.clone(), message.values.clone());
            writeln!(self.out, "{stamped}")?;
        } else {
            writeln!(self.out, "{message}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let message = parse_line("/mixer/fader 3 -1.5 \"two words\" label").unwrap();
        assert_eq!(message.address, "/mixer/fader");
        assert_eq!(
            message.values,
            vec![
                Value::Int(3),
                Value::Float(-1.5),
                Value::String("two words".to_string()),
                Value::String("label".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_other_kinds() {
        let message = parse_line("true 7L 2.5d #00ff nil").unwrap();
        assert_eq!(message.address, "");
        assert_eq!(
            message.values,
            vec![
                Value::Bool(true),
                Value::Long(7),
                Value::Double(2.5),
                Value::Blob(vec![0x00, 0xff]),
                Value::Nil,
            ]
        );
    }

    #[test]
    fn test_parse_escapes() {
        let message = parse_line(r#""say \"hi\"\n" "\u{e9}""#).unwrap();
        assert_eq!(
            message.values,
            vec![
                Value::String("say \"hi\"\n".to_string()),
                Value::String("\u{e9}".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("\"open").is_err());
        assert!(parse_line("\"bad \\q\"").is_err());
        assert!(parse_line("#zz").is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let original = Message::new(
            "/a",
            vec![
                Value::Int(-4),
                Value::Float(2.0),
                Value::String("tab\there".to_string()),
            ],
        );
        assert_eq!(parse_line(&original.to_string()).unwrap(), original);
    }

    #[test]
    fn test_receiver_filter() {
        let mut receiver = LineReceiver::new();
        let message = Message::new("/a", vec![Value::Int(1)]);
        assert!(!receiver.accepts(&message));

        receiver.bind(9000, "/a").unwrap();
        assert!(receiver.accepts(&message));
        assert!(!receiver.accepts(&Message::new("/b", vec![])));

        receiver.bind(9000, "").unwrap();
        assert!(receiver.accepts(&Message::new("/b", vec![])));

        receiver.release();
        assert!(!receiver.is_bound());
    }

    #[test]
    fn test_transmitter_stamps_address() {
        let mut transmitter = LineTransmitter::new(Vec::new());
        transmitter
            .configure(&TransmitTarget {
                address: "/out".to_string(),
                ..TransmitTarget::default()
            })
            .unwrap();
        transmitter
            .send(&Message::new("", vec![Value::Int(1)]))
            .unwrap();
        transmitter
            .send(&Message::new("/own", vec![Value::Float(0.5)]))
            .unwrap();

        let text = String::from_utf8(transmitter.get_ref().clone()).unwrap();
        assert_eq!(text, "/out 1\n/own 0.5\n");
    }
}
