//! Minimal MySQL client
//!
//! Just enough of the client role for the probe: connect and authenticate
//! (mysql_native_password), run plain-text queries, quit. Every connection is
//! short-lived and single-purpose; there is no pooling, no reuse, and no
//! retry — a failure here fails the whole invocation.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::check::{Connector, Querier};
use crate::config::ServerEndpoint;
use crate::protocol::resultset::{parse_column_name, parse_lenenc_int, parse_text_row};
use crate::protocol::{
    capabilities, commands, compute_auth_response, is_eof_packet, is_err_packet, is_ok_packet,
    DecodeError, ErrPacket, HandshakeResponse, InitialHandshake, Packet, PacketCodec, ResultSet,
};

/// Connection errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("connection closed by server")]
    Disconnected,
}

/// Query errors
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("malformed result set: {0}")]
    Decode(#[from] DecodeError),

    #[error("io error: {0}")]
    Io(String),

    #[error("connection closed by server")]
    Disconnected,
}

/// One authenticated connection to a MySQL server
pub struct MysqlConn {
    framed: Framed<TcpStream, PacketCodec>,
}

impl MysqlConn {
    /// Connect and authenticate against a server endpoint
    pub async fn connect(endpoint: &ServerEndpoint) -> Result<Self, ConnectionError> {
        let addr = endpoint.addr();
        debug!(addr = %addr, user = %endpoint.user, "connecting");

        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

        let mut framed = Framed::new(stream, PacketCodec);

        // Receive server handshake
        let handshake_packet = framed
            .next()
            .await
            .ok_or(ConnectionError::Disconnected)?
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        let handshake = InitialHandshake::parse(&handshake_packet.payload)
            .ok_or_else(|| ConnectionError::Protocol("invalid server handshake".to_string()))?;

        debug!(
            server_version = %handshake.server_version,
            "received server handshake"
        );

        // Compute auth response from the server nonce
        let auth_data = handshake.auth_plugin_data();
        let auth_response = compute_auth_response(&endpoint.password, &auth_data);

        let caps = capabilities::DEFAULT_CAPABILITIES & handshake.capability_flags;
        let response = HandshakeResponse {
            capability_flags: caps,
            max_packet_size: 16 * 1024 * 1024,
            character_set: 0x21, // utf8_general_ci
            username: endpoint.user.clone(),
            auth_response,
            auth_plugin_name: handshake.auth_plugin_name.clone(),
        };

        framed
            .send(response.encode(1))
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        // Receive OK or ERR
        let reply = framed
            .next()
            .await
            .ok_or(ConnectionError::Disconnected)?
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if is_err_packet(&reply.payload) {
            let err = ErrPacket::parse(&reply.payload)
                .map(|e| e.error_message)
                .unwrap_or_else(|| "access denied".to_string());
            return Err(ConnectionError::Auth(err));
        }

        if !is_ok_packet(&reply.payload) {
            return Err(ConnectionError::Protocol(
                "expected OK packet after handshake".to_string(),
            ));
        }

        debug!(addr = %addr, "authenticated");
        Ok(Self { framed })
    }

    /// Run a plain-text query and decode the full result set
    pub async fn query(&mut self, sql: &str) -> Result<ResultSet, QueryError> {
        debug!(sql, "query");
        self.framed
            .send(Packet::command(commands::COM_QUERY, sql.as_bytes()))
            .await
            .map_err(|e| QueryError::Io(e.to_string()))?;

        let first = self.recv().await?;

        if is_err_packet(&first.payload) {
            return Err(Self::server_error(&first));
        }
        if is_ok_packet(&first.payload) {
            // Statement without a result set
            return Ok(ResultSet::empty());
        }

        let (column_count, _) = parse_lenenc_int(&first.payload)?;
        let column_count = column_count as usize;

        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let definition = self.recv().await?;
            columns.push(parse_column_name(&definition.payload)?);
        }

        // Classic framing sends an EOF between column definitions and rows;
        // DEPRECATE_EOF servers go straight to the first row.
        let mut packet = self.recv().await?;
        if is_eof_packet(&packet.payload) {
            packet = self.recv().await?;
        }

        let mut rows = Vec::new();
        loop {
            if is_err_packet(&packet.payload) {
                return Err(Self::server_error(&packet));
            }
            // Terminator is EOF, or the EOF-headered OK in DEPRECATE_EOF
            // mode; a plain 0x00 header here would be a row starting with an
            // empty string, so only 0xFE ends the stream.
            if is_eof_packet(&packet.payload) {
                break;
            }
            rows.push(parse_text_row(&packet.payload, column_count)?);
            packet = self.recv().await?;
        }

        Ok(ResultSet::new(columns, rows))
    }

    /// Tell the server we are leaving; errors are ignored
    pub async fn quit(mut self) {
        let _ = self
            .framed
            .send(Packet::command(commands::COM_QUIT, &[]))
            .await;
    }

    async fn recv(&mut self) -> Result<Packet, QueryError> {
        match self.framed.next().await {
            Some(Ok(packet)) => Ok(packet),
            Some(Err(e)) => Err(QueryError::Io(e.to_string())),
            None => Err(QueryError::Disconnected),
        }
    }

    fn server_error(packet: &Packet) -> QueryError {
        match ErrPacket::parse(&packet.payload) {
            Some(err) => QueryError::Server {
                code: err.error_code,
                message: err.error_message,
            },
            None => QueryError::Protocol("unparseable ERR packet".to_string()),
        }
    }
}

/// Connector backed by real TCP connections
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlConnector;

impl Connector for MysqlConnector {
    type Conn = MysqlConn;

    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<MysqlConn, ConnectionError> {
        MysqlConn::connect(endpoint).await
    }
}

impl Querier for MysqlConn {
    async fn query(&mut self, sql: &str) -> Result<ResultSet, QueryError> {
        MysqlConn::query(self, sql).await
    }

    async fn quit(self) {
        MysqlConn::quit(self).await
    }
}
