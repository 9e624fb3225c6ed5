use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

const TERMINATOR: &[u8] = b"\r\n";

/// The subset of RESP a GET/SET client needs to speak.
#[derive(Debug, PartialEq, Clone)]
pub enum Frame {
    SimpleString(String),
    SimpleError(String),
    Integer(i64),
    BulkString(String),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    /// A command is an array of bulk strings, e.g. `SET key value`.
    pub fn command(parts: &[&str]) -> Self {
        Frame::Array(
            parts
                .iter()
                .map(|part| Frame::BulkString(part.to_string()))
                .collect(),
        )
    }

    fn tag(&self) -> u8 {
        match self {
            Frame::SimpleString(_) => b'+',
            Frame::SimpleError(_) => b'-',
            Frame::Integer(_) => b':',
            Frame::BulkString(_) => b'$',
            Frame::Null => b'$',
            Frame::Array(_) => b'*',
        }
    }

    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag());
        match self {
            Frame::SimpleString(s) | Frame::SimpleError(s) => {
                buf.put(s.as_bytes());
                buf.put(TERMINATOR);
            }
            Frame::Integer(n) => {
                buf.put(n.to_string().as_bytes());
                buf.put(TERMINATOR);
            }
            Frame::BulkString(s) => {
                buf.put(s.len().to_string().as_bytes());
                buf.put(TERMINATOR);
                buf.put(s.as_bytes());
                buf.put(TERMINATOR);
            }
            Frame::Null => {
                buf.put(&b"-1"[..]);
                buf.put(TERMINATOR);
            }
            Frame::Array(elements) => {
                buf.put(elements.len().to_string().as_bytes());
                buf.put(TERMINATOR);
                for e in elements.iter() {
                    e.serialize(buf);
                }
            }
        }
    }

    /// Decode one frame from the front of `data`.
    ///
    /// Returns the frame and the number of bytes it occupied, or `None` if
    /// `data` doesn't hold a complete frame yet.
    pub fn deserialize(data: &[u8]) -> Result<Option<(Self, usize)>> {
        if data.is_empty() {
            return Ok(None);
        }
        let terminator_index = match find_terminator(data) {
            Some(i) => i,
            None => return Ok(None),
        };
        let line = std::str::from_utf8(&data[1..terminator_index])
            .map_err(|_| Error::Protocol("frame header is not valid utf-8".to_string()))?;
        let header_len = terminator_index + 2;

        match data[0] {
            // Simple string: "+OK\r\n"
            b'+' => Ok(Some((Frame::SimpleString(line.to_string()), header_len))),
            // Simple error: "-ERR message\r\n"
            b'-' => Ok(Some((Frame::SimpleError(line.to_string()), header_len))),
            // Integer: ":[<+|->]<value>\r\n"
            b':' => match line.parse::<i64>() {
                Ok(n) => Ok(Some((Frame::Integer(n), header_len))),
                Err(_) => Err(Error::Protocol(format!("invalid integer {:?}", line))),
            },
            // Bulk string: "$<length>\r\n<data>\r\n", null is "$-1\r\n"
            b'$' => {
                if line == "-1" {
                    return Ok(Some((Frame::Null, header_len)));
                }
                let len = parse_length(line, "bulk string")?;
                let end = header_len + len;
                if data.len() < end + 2 {
                    return Ok(None);
                }
                if &data[end..end + 2] != TERMINATOR {
                    return Err(Error::Protocol("unterminated bulk string".to_string()));
                }
                let string = std::str::from_utf8(&data[header_len..end])
                    .map_err(|_| Error::Protocol("bulk string is not valid utf-8".to_string()))?;
                Ok(Some((Frame::BulkString(string.to_string()), end + 2)))
            }
            // Array: "*<number-of-elements>\r\n<element-1>...<element-n>"
            b'*' => {
                if line == "-1" {
                    return Ok(Some((Frame::Null, header_len)));
                }
                let num_elements = parse_length(line, "array")?;
                let mut consumed = header_len;
                let mut elements = Vec::with_capacity(num_elements);
                for _ in 0..num_elements {
                    match Frame::deserialize(&data[consumed..])? {
                        Some((element, len)) => {
                            elements.push(element);
                            consumed += len;
                        }
                        None => return Ok(None),
                    }
                }
                Ok(Some((Frame::Array(elements), consumed)))
            }
            // RESP3 null: "_\r\n"
            b'_' => {
                if line.is_empty() {
                    Ok(Some((Frame::Null, header_len)))
                } else {
                    Err(Error::Protocol("non-empty null".to_string()))
                }
            }
            tag => Err(Error::Protocol(format!("invalid RESP tag {}", tag))),
        }
    }
}

fn parse_length(digits: &str, what: &str) -> Result<usize> {
    digits
        .parse::<usize>()
        .map_err(|_| Error::Protocol(format!("invalid {} length {:?}", what, digits)))
}

/// Find `Some(index)` of the first occurence of b'\r\n' in the slice,
/// or `None` if the slice doesn't contain a terminator.
fn find_terminator(data: &[u8]) -> Option<usize> {
    data.windows(2).position(|window| window == TERMINATOR)
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::{find_terminator, Frame};

    #[test]
    fn test_find_terminator() {
        assert_eq!(find_terminator(b"\r\n"), Some(0));
        assert_eq!(find_terminator(b"foo\r\nbar"), Some(3));
        assert_eq!(find_terminator(b"\r"), None);
        assert_eq!(find_terminator(b""), None);
        assert_eq!(find_terminator(b"foo"), None);
    }

    #[test]
    fn command() {
        let mut buf = BytesMut::new();
        Frame::command(&["SET", "root-key-data", "{\"a\":1}"]).serialize(&mut buf);
        assert_eq!(
            &buf[..],
            b"*3\r\n$3\r\nSET\r\n$13\r\nroot-key-data\r\n$7\r\n{\"a\":1}\r\n"
        );
    }

    #[test]
    fn replies() {
        assert_eq!(
            Frame::deserialize(b"+OK\r\n").unwrap(),
            Some((Frame::SimpleString("OK".to_string()), 5))
        );
        assert_eq!(
            Frame::deserialize(b"-ERR wrong type\r\n").unwrap(),
            Some((Frame::SimpleError("ERR wrong type".to_string()), 17))
        );
        assert_eq!(
            Frame::deserialize(b":-12\r\n").unwrap(),
            Some((Frame::Integer(-12), 6))
        );
        assert_eq!(
            Frame::deserialize(b"$5\r\nhello\r\n+OK\r\n").unwrap(),
            Some((Frame::BulkString("hello".to_string()), 11))
        );
        assert_eq!(
            Frame::deserialize(b"$-1\r\n").unwrap(),
            Some((Frame::Null, 5))
        );
        assert_eq!(Frame::deserialize(b"_\r\n").unwrap(), Some((Frame::Null, 3)));
        assert_eq!(
            Frame::deserialize(b"*2\r\n:1\r\n$-1\r\n").unwrap(),
            Some((Frame::Array(vec![Frame::Integer(1), Frame::Null]), 13))
        );
    }

    #[test]
    fn incomplete_frames() {
        assert_eq!(Frame::deserialize(b"").unwrap(), None);
        assert_eq!(Frame::deserialize(b"+OK").unwrap(), None);
        assert_eq!(Frame::deserialize(b"$5\r\nhel").unwrap(), None);
        assert_eq!(Frame::deserialize(b"$5\r\nhello").unwrap(), None);
        assert_eq!(Frame::deserialize(b"*2\r\n:1\r\n").unwrap(), None);
    }

    #[test]
    fn invalid_frames() {
        assert!(Frame::deserialize(b":abc\r\n").is_err());
        assert!(Frame::deserialize(b"$x\r\n").is_err());
        assert!(Frame::deserialize(b"$2\r\nabcd\r\n").is_err());
        assert!(Frame::deserialize(b"?\r\n").is_err());
    }
}
