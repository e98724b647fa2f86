//! Direct lookup of one scalar in a table's header.
//!
//! Header statements have the form `KEYWORD[lang]("subkey")=value;`, may span
//! several lines and may contain `;` or `=` inside quoted strings. Scanning
//! stops at the `DATA` keyword so the data section is never read.

use cubecache_core::error::{CubeError, Result};
use cubecache_core::id::TableId;
use cubecache_core::traits::SourceStream;
use std::io::SeekFrom;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};

const DATA_KEYWORD: &str = "DATA";

/// Read the value of the first header statement named `key`.
///
/// # Errors
///
/// Returns `UnseekableSource` for forward-only streams and `MissingKey` when
/// no statement before the data section is named `key`.
pub async fn read_header_value(table: &TableId, stream: &mut SourceStream, key: &str) -> Result<String> {
    let inner = match stream {
        SourceStream::Seekable(inner) => inner,
        SourceStream::Sequential(_) => {
            return Err(CubeError::UnseekableSource {
                table: table.clone(),
            });
        }
    };
    inner.seek(SeekFrom::Start(0)).await?;
    let mut reader = BufReader::new(inner);

    while let Some(keyword) = read_until_unquoted(&mut reader, b'=').await? {
        let name = bare_keyword(&keyword);
        if name == DATA_KEYWORD {
            break;
        }
        let Some(value) = read_until_unquoted(&mut reader, b';').await? else {
            break;
        };
        if name == key {
            return Ok(unquote(&value));
        }
    }

    Err(CubeError::missing_key(table.clone(), key))
}

/// Read up to the next `delimiter` that is not inside a quoted string.
/// Returns `None` at end of input.
async fn read_until_unquoted<R>(reader: &mut R, delimiter: u8) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        let read = reader.read_until(delimiter, &mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        let quotes = buf.iter().filter(|&&b| b == b'"').count();
        if buf.last() == Some(&delimiter) && quotes % 2 == 0 {
            buf.pop();
            return Ok(Some(String::from_utf8_lossy(&buf).into_owned()));
        }
    }
}

/// Keyword without its language or subkey suffix.
fn bare_keyword(raw: &str) -> &str {
    let raw = raw.trim().trim_start_matches('\u{feff}');
    let end = raw.find(['[', '(']).unwrap_or(raw.len());
    raw[..end].trim()
}

/// Strip quotes, joining the parts of a quoted string split over lines.
fn unquote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut quoted = false;
    for c in raw.chars() {
        match c {
            '"' => quoted = !quoted,
            c if quoted => out.push(c),
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}
