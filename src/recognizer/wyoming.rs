//! Wyoming Protocol Client
//!
//! Wyoming events are a JSON header line, optionally followed by `data_length`
//! bytes of JSON data and `payload_length` bytes of binary payload.
//!
//! Reference: https://github.com/rhasspy/wyoming

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Info response data
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InfoData {
    #[serde(default)]
    pub asr: Vec<AsrInfo>,
}

/// ASR service info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrInfo {
    pub name: String,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl InfoData {
    pub fn languages(&self) -> Vec<String> {
        self.asr.iter().flat_map(|a| a.languages.clone()).collect()
    }
}

/// Event header line
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload_length: Option<usize>,
}

#[derive(Debug, Clone)]
struct Event {
    kind: String,
    data: Value,
}

/// Parse a `tcp://host:port` (or bare `host:port`) URI
pub fn parse_uri(uri: &str) -> Result<(String, u16)> {
    let rest = uri.strip_prefix("tcp://").unwrap_or(uri);
    let (host, port) = rest
        .rsplit_once(':')
        .with_context(|| format!("Missing port in Wyoming URI '{}'", uri))?;
    if host.is_empty() {
        bail!("Missing host in Wyoming URI '{}'", uri);
    }
    let port = port
        .trim_end_matches('/')
        .parse::<u16>()
        .with_context(|| format!("Invalid port in Wyoming URI '{}'", uri))?;
    Ok((host.to_string(), port))
}

async fn write_event<W>(
    writer: &mut W,
    kind: &str,
    data: Option<Value>,
    payload: Option<&[u8]>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = Header {
        kind: kind.to_string(),
        data,
        data_length: None,
        payload_length: payload.map(|p| p.len()),
    };
    writer
        .write_all(serde_json::to_string(&header)?.as_bytes())
        .await?;
    writer.write_all(b"\n").await?;
    if let Some(payload) = payload {
        writer.write_all(payload).await?;
    }
    Ok(())
}

async fn read_event<R>(reader: &mut BufReader<R>) -> Result<Option<Event>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let header: Header = serde_json::from_str(line.trim())
        .with_context(|| format!("Malformed Wyoming header: {}", line.trim()))?;

    let mut data = header.data.unwrap_or(Value::Null);
    if let Some(len) = header.data_length.filter(|l| *l > 0) {
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
        let extra: Value = serde_json::from_slice(&buf)?;
        match (&mut data, extra) {
            (Value::Object(base), Value::Object(more)) => base.extend(more),
            (_, more) => data = more,
        }
    }
    if let Some(len) = header.payload_length.filter(|l| *l > 0) {
        // Nothing we read carries a payload we need
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf).await?;
    }

    Ok(Some(Event {
        kind: header.kind,
        data,
    }))
}

/// Wyoming client for ASR services
#[derive(Debug, Clone)]
pub struct WyomingClient {
    host: String,
    port: u16,
}

impl WyomingClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    async fn connect(&self) -> Result<TcpStream> {
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((&*self.host, self.port)))
            .await
            .with_context(|| format!("Timed out connecting to {}", self.address()))?
            .with_context(|| format!("Failed to connect to Wyoming server {}", self.address()))
    }

    /// Handshake: ask the server what it offers
    pub async fn describe(&self) -> Result<InfoData> {
        let stream = self.connect().await?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        write_event(&mut writer, "describe", None, None).await?;
        writer.flush().await?;

        let info = tokio::time::timeout(CONNECT_TIMEOUT, async {
            while let Some(event) = read_event(&mut reader).await? {
                if event.kind == "info" {
                    return Ok::<_, anyhow::Error>(
                        serde_json::from_value::<InfoData>(event.data).unwrap_or_default(),
                    );
                }
                debug!("Ignoring '{}' during handshake", event.kind);
            }
            bail!("Server closed connection during handshake")
        })
        .await
        .context("Timeout waiting for Wyoming info")??;

        info!(
            "🤝 Wyoming server {} offers {} ASR service(s)",
            self.address(),
            info.asr.len()
        );
        Ok(info)
    }

    /// Send one utterance of 16-bit mono PCM and wait for its transcript
    pub async fn transcribe(&self, samples: &[i16], rate: u32) -> Result<String> {
        let stream = self.connect().await?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let format = serde_json::json!({ "rate": rate, "width": 2, "channels": 1 });
        let audio: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        write_event(&mut writer, "transcribe", None, None).await?;
        write_event(&mut writer, "audio-start", Some(format.clone()), None).await?;
        write_event(&mut writer, "audio-chunk", Some(format), Some(&audio)).await?;
        write_event(&mut writer, "audio-stop", None, None).await?;
        writer.flush().await?;

        debug!("Sent audio ({} bytes), waiting for transcript...", audio.len());

        let transcript = tokio::time::timeout(TRANSCRIPT_TIMEOUT, async {
            while let Some(event) = read_event(&mut reader).await? {
                if event.kind == "transcript" {
                    let text = event
                        .data
                        .get("text")
                        .and_then(|t| t.as_str())
                        .unwrap_or_default();
                    return Ok::<_, anyhow::Error>(text.to_string());
                }
            }
            warn!("Wyoming server closed connection without a transcript");
            Ok(String::new())
        })
        .await
        .context("Timeout waiting for transcript")??;

        info!("📝 Wyoming transcript: '{}'", transcript);
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_uri() {
        assert_eq!(
            parse_uri("tcp://localhost:10300").unwrap(),
            ("localhost".to_string(), 10300)
        );
        assert_eq!(
            parse_uri("192.168.1.4:10301").unwrap(),
            ("192.168.1.4".to_string(), 10301)
        );
        assert!(parse_uri("tcp://localhost").is_err());
        assert!(parse_uri("tcp://:10300").is_err());
        assert!(parse_uri("tcp://host:port").is_err());
    }

    #[test]
    fn test_header_skips_empty_fields() {
        let header = Header {
            kind: "describe".to_string(),
            data: None,
            data_length: None,
            payload_length: None,
        };
        assert_eq!(
            serde_json::to_string(&header).unwrap(),
            r#"{"type":"describe"}"#
        );
    }

    #[tokio::test]
    async fn test_read_event_merges_data_section() {
        let data = br#"{"text":"hello"}"#;
        let mut wire = format!(
            "{{\"type\":\"transcript\",\"data_length\":{}}}\n",
            data.len()
        )
        .into_bytes();
        wire.extend_from_slice(data);

        let mut reader = BufReader::new(&wire[..]);
        let event = read_event(&mut reader).await.unwrap().unwrap();
        assert_eq!(event.kind, "transcript");
        assert_eq!(event.data["text"], "hello");
        assert!(read_event(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_describe_against_fake_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (reader, mut writer) = socket.into_split();
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert!(line.contains("describe"));
            let info = r#"{"type":"info","data":{"asr":[{"name":"faster-whisper","languages":["en","de"]}]}}"#;
            writer.write_all(info.as_bytes()).await.unwrap();
            writer.write_all(b"\n").await.unwrap();
        });

        let client = WyomingClient::new("127.0.0.1", port);
        let info = client.describe().await.unwrap();
        assert_eq!(info.asr[0].name, "faster-whisper");
        assert_eq!(info.languages(), vec!["en".to_string(), "de".to_string()]);
    }
}
