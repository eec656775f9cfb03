// Transfer list parser.
//
// Layout:
//
//   <version>
//   <total blocks>
//   <stash entries>        (version >= 2)
//   <max stash blocks>     (version >= 2)
//   <command> <rangeset>
//   ...
//
// The whole input is validated line by line; the first malformed header,
// line, or token aborts the parse.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;

use super::rangeset::parse_rangeset;
use super::{Command, CommandKind, TransferList, TransferVersion};

// ---------------------------------------------------------------------------
// Parse error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("cannot open transfer list {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("I/O error reading transfer list: {0}")]
    Io(#[from] io::Error),
    #[error("transfer list ends before the {what} header line")]
    MissingHeader { what: &'static str },
    #[error("could not determine transfer list version from '{value}'")]
    InvalidVersion { value: String },
    #[error("could not determine total block count from '{value}'")]
    InvalidTotalBlocks { value: String },
    #[error("failed to parse line {line_no}: '{line}'")]
    MalformedLine { line_no: usize, line: String },
    #[error("'{name}' is not a valid command")]
    InvalidCommand { name: String },
    #[error("error on parsing following data to rangeset: {token}")]
    InvalidRangeset { token: String },
    #[error("invalid block range {start}..{end} in rangeset: {token}")]
    InvalidRange { token: String, start: u64, end: u64 },
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse the transfer list at `path`.
pub fn parse_transfer_list_file(path: &Path) -> Result<TransferList, ParseError> {
    let file = File::open(path).map_err(|source| ParseError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_transfer_list(BufReader::new(file))
}

/// Parse a transfer list from any buffered reader.
pub fn parse_transfer_list<R: BufRead>(reader: R) -> Result<TransferList, ParseError> {
    let mut lines = reader.lines().enumerate();
    let mut header = |what: &'static str| -> Result<String, ParseError> {
        match lines.next() {
            Some((_, line)) => Ok(line?),
            None => Err(ParseError::MissingHeader { what }),
        }
    };

    let raw = header("version")?;
    let version: TransferVersion = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidVersion { value: raw.clone() })?
        .into();

    let raw = header("total block count")?;
    let declared_total_blocks = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ParseError::InvalidTotalBlocks { value: raw.clone() })?;

    let stash_header = if version.has_stash_header() {
        let entries = header("stash entries")?;
        let max_blocks = header("max stash blocks")?;
        debug!("stash header: entries={entries:?} max_blocks={max_blocks:?}");
        Some([entries, max_blocks])
    } else {
        None
    };

    debug!(
        "transfer list v{}, {declared_total_blocks} blocks declared",
        version.number()
    );

    let mut commands = Vec::new();
    for (idx, line) in lines {
        let line = line?;
        // `lines()` leaves a `\r` in place when the input lacks a final `\n`.
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            continue;
        }
        commands.push(parse_command_line(idx + 1, line)?);
    }

    Ok(TransferList {
        version,
        declared_total_blocks,
        stash_header,
        commands,
    })
}

/// Parse one `<command> <rangeset>` line. `line_no` is 1-based.
fn parse_command_line(line_no: usize, line: &str) -> Result<Command, ParseError> {
    let fields: Vec<&str> = line.split(' ').collect();
    let [name, token] = fields[..] else {
        return Err(ParseError::MalformedLine {
            line_no,
            line: line.to_string(),
        });
    };

    let kind = CommandKind::from_name(name).ok_or_else(|| ParseError::InvalidCommand {
        name: name.to_string(),
    })?;
    let ranges = parse_rangeset(token)?;

    Ok(Command { kind, ranges })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::BlockRange;

    fn parse(text: &str) -> Result<TransferList, ParseError> {
        parse_transfer_list(text.as_bytes())
    }

    #[test]
    fn version_one_has_no_stash_header() {
        let list = parse("1\n10\nnew 2,0,10\n").unwrap();
        assert_eq!(list.version, TransferVersion::V1);
        assert_eq!(list.declared_total_blocks, 10);
        assert!(list.stash_header.is_none());
        assert_eq!(list.commands.len(), 1);
        assert_eq!(list.commands[0].ranges, vec![BlockRange::new(0, 10)]);
    }

    #[test]
    fn version_four_skips_stash_lines() {
        let list = parse("4\n10\n0\n0\nnew 4,0,2,8,10\nerase 2,2,8\n").unwrap();
        assert_eq!(list.version, TransferVersion::V4);
        assert_eq!(
            list.stash_header,
            Some(["0".to_string(), "0".to_string()])
        );
        assert_eq!(list.commands.len(), 2);
        assert_eq!(list.commands[0].kind, CommandKind::New);
        assert_eq!(
            list.commands[0].ranges,
            vec![BlockRange::new(0, 2), BlockRange::new(8, 10)]
        );
        assert_eq!(list.commands[1].kind, CommandKind::Erase);
    }

    #[test]
    fn stash_lines_are_not_interpreted() {
        // Anything goes on the stash lines, even text that would be a command.
        let list = parse("2\n4\nnew 2,0,4\nwhatever\nzero 2,0,4\n").unwrap();
        assert_eq!(list.commands.len(), 1);
        assert_eq!(list.commands[0].kind, CommandKind::Zero);
    }

    #[test]
    fn unknown_version_still_processed() {
        let list = parse("7\n3\n0\n0\nnew 2,0,3").unwrap();
        assert_eq!(list.version, TransferVersion::Unknown(7));
        assert_eq!(list.commands[0].block_count(), Some(3));
    }

    #[test]
    fn crlf_and_blank_lines_tolerated() {
        let list = parse("1\r\n4\r\n\r\nnew 2,0,4\r\n\r\n").unwrap();
        assert_eq!(list.commands.len(), 1);
    }

    #[test]
    fn crlf_without_final_newline_tolerated() {
        let list = parse("1\r\n4\r\nnew 2,0,4\r").unwrap();
        assert_eq!(list.commands.len(), 1);
        assert_eq!(list.commands[0].ranges, vec![BlockRange::new(0, 4)]);

        let list = parse("1\r\n4\r\nnew 2,0,4\r\n\r").unwrap();
        assert_eq!(list.commands.len(), 1);
    }

    #[test]
    fn non_numeric_headers_rejected() {
        assert!(matches!(
            parse("four\n10\n"),
            Err(ParseError::InvalidVersion { ref value }) if value == "four"
        ));
        assert!(matches!(
            parse("1\nten\n"),
            Err(ParseError::InvalidTotalBlocks { ref value }) if value == "ten"
        ));
    }

    #[test]
    fn truncated_headers_rejected() {
        assert!(matches!(
            parse(""),
            Err(ParseError::MissingHeader { what: "version" })
        ));
        assert!(matches!(
            parse("1\n"),
            Err(ParseError::MissingHeader {
                what: "total block count"
            })
        ));
        assert!(matches!(
            parse("3\n10\n0\n"),
            Err(ParseError::MissingHeader {
                what: "max stash blocks"
            })
        ));
    }

    #[test]
    fn wrong_field_count_reports_line() {
        let err = parse("1\n10\nnew\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedLine { line_no: 3, ref line } if line == "new"
        ));

        let err = parse("1\n10\nnew  2,0,10\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { .. }));

        let err = parse("1\n10\nnew 2,0,5 extra\n").unwrap_err();
        assert_eq!(err.to_string(), "failed to parse line 3: 'new 2,0,5 extra'");
    }

    #[test]
    fn invalid_command_named() {
        let err = parse("4\n10\n0\n0\nmove 2,0,1\n").unwrap_err();
        assert!(matches!(err, ParseError::InvalidCommand { ref name } if name == "move"));
        assert_eq!(err.to_string(), "'move' is not a valid command");
    }

    #[test]
    fn bad_rangeset_propagates() {
        assert!(matches!(
            parse("1\n20\nnew 3,0,10,20\n"),
            Err(ParseError::InvalidRangeset { ref token }) if token == "3,0,10,20"
        ));
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = parse_transfer_list_file(Path::new("/nonexistent/system.transfer.list"))
            .unwrap_err();
        assert!(matches!(err, ParseError::Open { .. }));
    }
}
