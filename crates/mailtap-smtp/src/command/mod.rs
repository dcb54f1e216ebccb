//! SMTP command recognition.
//!
//! The client parser hands every completed command line to [`Command::parse`],
//! which recognises the envelope and transaction verbs the parser tracks and
//! reports everything else as [`Command::Other`].

/// A recognised SMTP command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Reverse path; empty for the null sender `<>`.
        from: String,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Forward path
        to: String,
    },
    /// DATA - Begin message data
    Data,
    /// RSET - Reset transaction
    Rset,
    /// Any command the parser does not track.
    Other,
}

/// Why a MAIL FROM or RCPT TO line could not be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The verb was not followed by its keyword (`FROM` or `TO`).
    #[error("{verb} without {keyword}")]
    MissingKeyword {
        /// The verb that was seen.
        verb: &'static str,
        /// The keyword that should have followed.
        keyword: &'static str,
    },

    /// No `:` after the keyword.
    #[error("missing ':' after {0}")]
    MissingColon(&'static str),

    /// No `<` opening the path.
    #[error("missing '<' before address")]
    MissingOpenBracket,

    /// No `>` closing the path before whitespace or end of line.
    #[error("unterminated address")]
    UnterminatedAddress,

    /// An empty path where one is required.
    #[error("empty address")]
    EmptyAddress,
}

impl Command {
    /// Recognises a command line (without its CRLF).
    ///
    /// Verbs and keywords match case-insensitively. Text after the closing
    /// `>` of a path (ESMTP parameters such as `SIZE=100`) is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the line starts with `MAIL` or `RCPT` but the rest
    /// of the line does not form a valid path.
    pub fn parse(line: &[u8]) -> Result<Self, CommandError> {
        let mut cursor = Cursor::new(line);
        cursor.skip_spaces();

        if cursor.eat_word(b"MAIL") {
            let from = cursor.path("MAIL", "FROM", true)?;
            return Ok(Self::MailFrom { from });
        }

        if cursor.eat_word(b"RCPT") {
            let to = cursor.path("RCPT", "TO", false)?;
            return Ok(Self::RcptTo { to });
        }

        if is_bare_verb(line, b"DATA") {
            return Ok(Self::Data);
        }

        if is_bare_verb(line, b"RSET") {
            return Ok(Self::Rset);
        }

        Ok(Self::Other)
    }
}

/// Checks for `verb` with nothing but ASCII whitespace (spaces or tabs)
/// around it.
///
/// The whole line must be the verb. A line that merely starts with it, such
/// as `DATA foo`, is an ordinary command and does not begin a message body.
fn is_bare_verb(line: &[u8], verb: &[u8]) -> bool {
    line.trim_ascii().eq_ignore_ascii_case(verb)
}

/// Byte cursor over one command line.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Skips spaces, returning how many were skipped.
    fn skip_spaces(&mut self) -> usize {
        let start = self.pos;
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Consumes `word` if it appears next, case-insensitively, and ends at a
    /// word boundary.
    fn eat_word(&mut self, word: &[u8]) -> bool {
        let rest = self.remaining();
        if rest.len() < word.len() || !rest[..word.len()].eq_ignore_ascii_case(word) {
            return false;
        }
        match rest.get(word.len()) {
            None | Some(b' ' | b':' | b'<') => {
                self.pos += word.len();
                true
            }
            Some(_) => false,
        }
    }

    /// Parses ` +KEYWORD *: *<path>` after an envelope verb.
    fn path(
        &mut self,
        verb: &'static str,
        keyword: &'static str,
        allow_empty: bool,
    ) -> Result<String, CommandError> {
        if self.skip_spaces() == 0 || !self.eat_word(keyword.as_bytes()) {
            return Err(CommandError::MissingKeyword { verb, keyword });
        }

        self.skip_spaces();
        if self.peek() != Some(b':') {
            return Err(CommandError::MissingColon(keyword));
        }
        self.pos += 1;

        self.skip_spaces();
        if self.peek() != Some(b'<') {
            return Err(CommandError::MissingOpenBracket);
        }
        self.pos += 1;

        // The path runs to the last '>' before the next space.
        let rest = self.remaining();
        let run = rest
            .iter()
            .position(|&b| b == b' ')
            .map_or(rest, |end| &rest[..end]);
        let close = run
            .iter()
            .rposition(|&b| b == b'>')
            .ok_or(CommandError::UnterminatedAddress)?;

        if close == 0 && !allow_empty {
            return Err(CommandError::EmptyAddress);
        }

        self.pos += close + 1;
        Ok(String::from_utf8_lossy(&run[..close]).into_owned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, CommandError> {
        Command::parse(line.as_bytes())
    }

    #[test]
    fn test_mail_from() {
        assert_eq!(
            parse("MAIL FROM:<sender@example.com>").unwrap(),
            Command::MailFrom {
                from: "sender@example.com".to_string()
            }
        );
    }

    #[test]
    fn test_mail_from_loose_spacing_and_case() {
        assert_eq!(
            parse("  mail   From : <a@b>").unwrap(),
            Command::MailFrom {
                from: "a@b".to_string()
            }
        );
    }

    #[test]
    fn test_mail_from_with_parameters() {
        assert_eq!(
            parse("MAIL FROM:<a@b> BODY=8BITMIME SIZE=12345").unwrap(),
            Command::MailFrom {
                from: "a@b".to_string()
            }
        );
    }

    #[test]
    fn test_mail_from_null_sender() {
        assert_eq!(
            parse("MAIL FROM:<>").unwrap(),
            Command::MailFrom {
                from: String::new()
            }
        );
    }

    #[test]
    fn test_path_runs_to_last_bracket() {
        assert_eq!(
            parse("RCPT TO:<a>b@c>").unwrap(),
            Command::RcptTo {
                to: "a>b@c".to_string()
            }
        );
    }

    #[test]
    fn test_rcpt_to() {
        assert_eq!(
            parse("RCPT TO:<recipient@example.com>").unwrap(),
            Command::RcptTo {
                to: "recipient@example.com".to_string()
            }
        );
    }

    #[test]
    fn test_rcpt_to_empty_address() {
        assert_eq!(parse("RCPT TO:<>"), Err(CommandError::EmptyAddress));
    }

    #[test]
    fn test_malformed_envelope() {
        assert_eq!(
            parse("MAIL"),
            Err(CommandError::MissingKeyword {
                verb: "MAIL",
                keyword: "FROM"
            })
        );
        assert_eq!(
            parse("MAIL FROM<a@b>"),
            Err(CommandError::MissingColon("FROM"))
        );
        assert_eq!(
            parse("MAIL FROM: a@b"),
            Err(CommandError::MissingOpenBracket)
        );
        assert_eq!(
            parse("RCPT TO:<a@b"),
            Err(CommandError::UnterminatedAddress)
        );
        assert_eq!(
            parse("RCPT TO:<a@b c>"),
            Err(CommandError::UnterminatedAddress)
        );
    }

    #[test]
    fn test_data_and_rset() {
        assert_eq!(parse("DATA").unwrap(), Command::Data);
        assert_eq!(parse("  data  ").unwrap(), Command::Data);
        assert_eq!(parse("RSET").unwrap(), Command::Rset);
        assert_eq!(parse("\trset ").unwrap(), Command::Rset);
    }

    #[test]
    fn test_other_commands() {
        assert_eq!(parse("EHLO client.example.com").unwrap(), Command::Other);
        assert_eq!(parse("DATAX").unwrap(), Command::Other);
        assert_eq!(parse("RSET now").unwrap(), Command::Other);
        assert_eq!(parse("DATA foo").unwrap(), Command::Other);
        assert_eq!(parse("MAILBOX").unwrap(), Command::Other);
        assert_eq!(parse("").unwrap(), Command::Other);
    }
}
