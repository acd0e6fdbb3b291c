use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use road_trip_lib::Coordinate;
use road_trip_routing::{PositionEvent, PositionFix};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};

use crate::server_state::ServerState;

pub const HEADER_TERMINATE: u8 = 0x00;
pub const HEADER_FIX: u8 = 0x01;
pub const HEADER_ERROR: u8 = 0x02;

pub const HANDSHAKE_ACCEPTED: u8 = 1;
pub const HANDSHAKE_REJECTED: u8 = 0;
pub const TERMINATE_CONFIRMED: u8 = 1;

const MAX_TEXT_LENGTH: usize = 1024;
const DISCONNECTED: &str = "Tracker disconnected";

/// One message from a tracker after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerFrame {
    Fix { lat: f64, lng: f64, accuracy: f64 },
    Error(String),
    Terminate,
}

impl TrackerFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            TrackerFrame::Fix { lat, lng, accuracy } => {
                let mut bytes = vec![HEADER_FIX];
                bytes.extend_from_slice(&lat.to_be_bytes());
                bytes.extend_from_slice(&lng.to_be_bytes());
                bytes.extend_from_slice(&accuracy.to_be_bytes());
                bytes
            }
            TrackerFrame::Error(message) => {
                let mut bytes = vec![HEADER_ERROR];
                bytes.extend(encode_text(message));
                bytes
            }
            TrackerFrame::Terminate => vec![HEADER_TERMINATE],
        }
    }

    pub async fn read_from<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<Self> {
        match reader.read_u8().await? {
            HEADER_TERMINATE => Ok(TrackerFrame::Terminate),
            HEADER_FIX => Ok(TrackerFrame::Fix {
                lat: reader.read_f64().await?,
                lng: reader.read_f64().await?,
                accuracy: reader.read_f64().await?,
            }),
            HEADER_ERROR => Ok(TrackerFrame::Error(read_text(reader).await?)),
            header => bail!("Unknown frame header {:#04x}", header),
        }
    }
}

/// u16 big-endian length followed by UTF-8. Longer text is cut at a char boundary.
pub fn encode_text(text: &str) -> Vec<u8> {
    let mut end = text.len().min(MAX_TEXT_LENGTH);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let text = &text.as_bytes()[..end];

    let mut bytes = (text.len() as u16).to_be_bytes().to_vec();
    bytes.extend_from_slice(text);
    bytes
}

pub async fn read_text<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<String> {
    let length = reader.read_u16().await? as usize;
    if length > MAX_TEXT_LENGTH {
        bail!("Text of {} bytes is too long", length);
    }

    let mut buffer = vec![0; length];
    reader.read_exact(&mut buffer).await?;
    String::from_utf8(buffer).context("Text is not valid UTF-8")
}

pub async fn listen(server_state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Tracker endpoint listening on {}", listener.local_addr()?);

    loop {
        let Ok((stream, addr)) = listener.accept().await else {
            tracing::error!("Failed to accept connection");
            continue;
        };

        tracing::info!("New tracker connection from {}", addr);

        let server_state = server_state.clone();
        tokio::spawn(async move {
            let res = handle_connection(stream, server_state).await;
            tracing::info!("Connection from {} ended with result: {:?}", addr, res);
        });
    }
}

/// Handshake with the trip id, then fixes until the tracker terminates, reports an error or drops.
pub async fn handle_connection<S>(mut stream: S, server_state: Arc<ServerState>) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let trip_id = read_text(&mut stream).await.context("Failed to read handshake")?;

    if server_state.data_manager.trip(&trip_id).await.is_err() {
        stream.write_all(&[HANDSHAKE_REJECTED]).await?;
        bail!("Tracker asked for unknown trip {}", trip_id);
    }

    let connection = server_state.devices.connect(&trip_id);
    stream.write_all(&[HANDSHAKE_ACCEPTED]).await?;
    tracing::info!("Tracker connected to trip {}", trip_id);

    loop {
        let frame = match TrackerFrame::read_from(&mut stream).await {
            Ok(frame) => frame,
            Err(err) => {
                connection.close(Some(DISCONNECTED.to_string())).await;
                return Err(err.context(format!("Tracker for trip {} dropped", trip_id)));
            }
        };

        match frame {
            TrackerFrame::Fix { lat, lng, accuracy } => {
                let coordinate = Coordinate::new(lat, lng);
                if !coordinate.is_valid() {
                    tracing::warn!("Ignoring invalid fix {:?} for trip {}", coordinate, trip_id);
                    continue;
                }

                let watchers = connection
                    .publish(PositionEvent::Fix(PositionFix::new(coordinate, accuracy, Utc::now())))
                    .await;
                tracing::trace!("Fix for trip {} sent to {} watchers", trip_id, watchers);
            }
            TrackerFrame::Error(message) => {
                tracing::warn!("Tracker for trip {} reported: {}", trip_id, message);
                connection.close(Some(message)).await;
                return Ok(());
            }
            TrackerFrame::Terminate => {
                connection.close(None).await;
                stream.write_all(&[TERMINATE_CONFIRMED]).await?;
                tracing::info!("Tracker for trip {} terminated", trip_id);
                return Ok(());
            }
        }
    }
}
