use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::Mutex,
};

use crate::{
    error::{Error, Result},
    resp::Frame,
    store::Store,
};

/// A [`Store`] backed by a Redis server, speaking RESP over one TCP
/// connection. Requests are serialized on that connection.
///
/// A connection that fails (I/O error, closed by the server, unparsable
/// reply) is dropped and a new one is opened on the next request.
pub struct RedisStore {
    addr: String,
    connection: Mutex<Option<Connection>>,
}

struct Connection {
    stream: TcpStream,
    input_buf: BytesMut,
}

impl Connection {
    async fn open(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Connection {
            stream,
            input_buf: BytesMut::with_capacity(512),
        })
    }

    async fn request(&mut self, parts: &[&str]) -> Result<Frame> {
        let mut output_buf = BytesMut::with_capacity(512);
        Frame::command(parts).serialize(&mut output_buf);
        self.stream.write_all(&output_buf).await?;

        loop {
            if let Some((frame, len)) = Frame::deserialize(&self.input_buf)? {
                self.input_buf.advance(len);
                return Ok(frame);
            }
            let bytes_read = self.stream.read_buf(&mut self.input_buf).await?;
            if bytes_read == 0 {
                return Err(Error::Store("connection closed by server".to_string()));
            }
        }
    }
}

impl RedisStore {
    /// Connect to `addr` (e.g. `"127.0.0.1:6379"`).
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let connection = Connection::open(&addr).await?;
        Ok(RedisStore {
            addr,
            connection: Mutex::new(Some(connection)),
        })
    }

    async fn request(&self, parts: &[&str]) -> Result<Frame> {
        let mut guard = self.connection.lock().await;
        let mut connection = match guard.take() {
            Some(connection) => connection,
            None => {
                tracing::debug!(addr = %self.addr, "reconnecting to redis");
                Connection::open(&self.addr).await?
            }
        };

        let reply = connection.request(parts).await;
        match &reply {
            Ok(_) => *guard = Some(connection),
            Err(error) => {
                tracing::warn!(addr = %self.addr, %error, "dropping redis connection");
            }
        }
        reply
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.request(&["GET", key]).await? {
            Frame::BulkString(value) => Ok(Some(value)),
            Frame::Null => Ok(None),
            Frame::SimpleError(message) => Err(Error::Store(message)),
            reply => Err(Error::Protocol(format!("unexpected reply to GET: {:?}", reply))),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        match self.request(&["SET", key, value.as_str()]).await? {
            Frame::SimpleString(s) if s == "OK" => Ok(()),
            Frame::SimpleError(message) => Err(Error::Store(message)),
            reply => Err(Error::Protocol(format!("unexpected reply to SET: {:?}", reply))),
        }
    }
}
