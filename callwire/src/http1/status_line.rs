// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Parser for the first line of an HTTP/1.x response:
//! `HTTP/<major>.<minor> <code> [<reason>]`. The reason phrase may be empty
//! or absent. The ancient `ICY <code>` shoutcast form is tolerated and
//! recorded as HTTP/1.0.

use nom::{IResult, Parser,
          branch::alt,
          bytes::complete::{tag, take_while_m_n},
          combinator::{map, map_res, rest},
          sequence::preceded};

use crate::{error::ExchangeError, message::Protocol};

/// A parsed response status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub protocol: Protocol,
    pub code: u16,
    /// The reason phrase; empty when the server sent none.
    pub message: String,
}

impl StatusLine {
    /// Parse a status line exactly as read from the wire (no trailing CRLF).
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::MalformedStatusLine`] when the line does not
    /// match the grammar.
    pub fn parse(line: &str) -> Result<Self, ExchangeError> {
        match parse_status_line(line) {
            Ok(("", status_line)) => Ok(status_line),
            _ => Err(ExchangeError::MalformedStatusLine {
                line: line.to_owned(),
            }),
        }
    }
}

fn parse_status_line(input: &str) -> IResult<&str, StatusLine> {
    let (input, protocol) = protocol::parse(input)?;
    let (input, _) = tag(" ")(input)?;
    let (input, code) = status_code::parse(input)?;
    let (input, message) = reason::parse(input)?;
    Ok((
        input,
        StatusLine {
            protocol,
            code,
            message,
        },
    ))
}

mod protocol {
    use super::{IResult, Parser, Protocol, alt, map, map_res, tag, take_while_m_n};

    pub fn parse(input: &str) -> IResult<&str, Protocol> {
        alt((http_version, shoutcast)).parse(input)
    }

    fn http_version(input: &str) -> IResult<&str, Protocol> {
        let (input, _) = tag("HTTP/1.")(input)?;
        map_res(
            take_while_m_n(1, 1, |c: char| c.is_ascii_digit()),
            |minor| match minor {
                "0" => Ok(Protocol::Http10),
                "1" => Ok(Protocol::Http11),
                _ => Err(()),
            },
        )
        .parse(input)
    }

    fn shoutcast(input: &str) -> IResult<&str, Protocol> {
        map(tag("ICY"), |_| Protocol::Http10).parse(input)
    }
}

mod status_code {
    use super::{IResult, Parser, map_res, take_while_m_n};

    pub fn parse(input: &str) -> IResult<&str, u16> {
        map_res(
            take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
            str::parse::<u16>,
        )
        .parse(input)
    }
}

mod reason {
    use super::{IResult, Parser, map, preceded, rest, tag};

    pub fn parse(input: &str) -> IResult<&str, String> {
        if input.is_empty() {
            return Ok(("", String::new()));
        }
        map(preceded(tag(" "), rest), str::to_owned).parse(input)
    }
}
