// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mapping Fetcher (spec.md §4.7 / C7): a one-shot WebSocket request/
//! response against a robot's mapping bridge port, yielding a map image +
//! metadata upserted into the Map Store. Grounded on the teacher's
//! `credential/device_code.rs::poll_device_code` deadline idiom and
//! `upstream/aggregator_feed.rs`'s connect-once/read-loop shape, narrowed
//! from polling to a single request/response exchange.

use std::time::Duration;

use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use crate::inventory::{MapMetadata, MapStore, MapUpload};

/// Fetch maps from a robot's mapping bridge and upsert them into the Map
/// Store. Best-effort: all failures are logged and swallowed (spec.md §4.7,
/// §7 "External errors ... abort that one fetch only").
pub async fn fetch_and_store<S: MapStore>(
    robot_id: &str,
    ip_address: &str,
    mapping_bridge_port: u16,
    timeout: Duration,
    store: &S,
) {
    if let Err(err) = try_fetch_and_store(robot_id, ip_address, mapping_bridge_port, timeout, store).await {
        warn!(robot = %robot_id, error = %err, "mapping fetch failed");
    }
}

async fn try_fetch_and_store<S: MapStore>(
    robot_id: &str,
    ip_address: &str,
    mapping_bridge_port: u16,
    timeout: Duration,
    store: &S,
) -> anyhow::Result<()> {
    let url = format!("ws://{ip_address}:{mapping_bridge_port}");
    debug!(robot = %robot_id, %url, "mapping fetcher connecting");

    let connect_fut = connect_async(&url);
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_fut)
        .await
        .map_err(|_| anyhow::anyhow!("mapping connect timed out"))??;

    let (mut sink, mut stream) = ws_stream.split();
    let request = serde_json::json!({"event": "GET_MAP_DATA", "payload": {}});
    sink.send(WsMessage::Text(serde_json::to_string(&request)?.into())).await?;

    let deadline = tokio::time::Instant::now() + timeout;
    let response = loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("mapping fetch timed out waiting for response");
        }
        let frame = tokio::time::timeout(remaining, stream.next())
            .await
            .map_err(|_| anyhow::anyhow!("mapping fetch timed out waiting for response"))?;
        match frame {
            Some(Ok(WsMessage::Text(text))) => {
                let Ok(envelope) = serde_json::from_str::<EventEnvelope>(&text) else { continue };
                if envelope.event.as_deref() == Some("MAP_DATA_RESPONSE") {
                    break envelope.payload;
                }
            }
            Some(Ok(WsMessage::Close(_))) | None => {
                anyhow::bail!("mapping bridge closed before responding");
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
        }
    };

    let _ = sink.close().await;

    let payload: ResponsePayload = serde_json::from_value(response)?;
    let uploads = parse_response(robot_id, &payload)?;
    for upload in uploads {
        store.upsert(upload).await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    event: Option<String>,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    files: MapFiles,
}

#[derive(Debug, Deserialize)]
struct MapFiles {
    map_yaml: String,
    map_image: String,
    #[serde(default)]
    features: Value,
    #[serde(default)]
    additional_maps: Vec<AdditionalMap>,
}

#[derive(Debug, Deserialize)]
struct AdditionalMap {
    map_yaml: String,
    map_image: String,
    #[serde(default)]
    features: Value,
}

/// Turn a `MAP_DATA_RESPONSE` payload into one or more Map Store upserts
/// (spec.md §4.7): the first map is linked to the robot, `additional_maps`
/// are upserted unlinked.
fn parse_response(robot_id: &str, payload: &ResponsePayload) -> anyhow::Result<Vec<MapUpload>> {
    let mut uploads = vec![build_upload(&payload.files.map_yaml, &payload.files.map_image, payload.files.features.clone(), Some(robot_id.to_owned()))?];
    for extra in &payload.files.additional_maps {
        uploads.push(build_upload(&extra.map_yaml, &extra.map_image, extra.features.clone(), None)?);
    }
    Ok(uploads)
}

fn build_upload(map_yaml: &str, map_image: &str, features: Value, robot_id: Option<String>) -> anyhow::Result<MapUpload> {
    let metadata: MapMetadata = serde_yaml::from_str(map_yaml)?;
    let image = decode_image(map_image);
    let filename = metadata.image.clone();
    let name = filename_stem(&filename);
    Ok(MapUpload { name, filename, image, metadata, features, robot_id })
}

/// Decode a PGM payload either as raw bytes or base64, by heuristic (spec.md
/// §4.7): a valid base64 alphabet and length multiple of 4 is treated as
/// base64; otherwise the payload is already binary.
fn decode_image(payload: &str) -> Vec<u8> {
    if looks_like_base64(payload) {
        if let Ok(decoded) = BASE64.decode(payload) {
            return decoded;
        }
    }
    payload.as_bytes().to_vec()
}

fn looks_like_base64(s: &str) -> bool {
    !s.is_empty()
        && s.len() % 4 == 0
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/// Derive a map's `name` from its filename's stem (e.g. `floor1.pgm` ->
/// `floor1`), falling back to the full filename if it has no extension.
fn filename_stem(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::InMemoryMapStore;

    #[test]
    fn looks_like_base64_accepts_valid_padding() {
        let encoded = BASE64.encode(b"hello world");
        assert!(looks_like_base64(&encoded));
    }

    #[test]
    fn looks_like_base64_rejects_binary_garbage() {
        assert!(!looks_like_base64("not-base64-at-all-\u{0}\u{1}"));
    }

    #[test]
    fn filename_stem_strips_extension() {
        assert_eq!(filename_stem("floor1.pgm"), "floor1");
        assert_eq!(filename_stem("no_extension"), "no_extension");
    }

    #[test]
    fn s6_parses_response_with_base64_image() {
        let image_bytes = b"\x00\x01\x02pgm-bytes";
        let encoded = BASE64.encode(image_bytes);
        let map_yaml = "image: floor1.pgm\nresolution: 0.05\norigin: [0.0, 0.0, 0.0]\n";
        let payload = ResponsePayload {
            files: MapFiles {
                map_yaml: map_yaml.to_owned(),
                map_image: encoded.clone(),
                features: serde_json::json!({}),
                additional_maps: vec![],
            },
        };
        let uploads = parse_response("r1", &payload).expect("parses");
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].filename, "floor1.pgm");
        assert_eq!(uploads[0].name, "floor1");
        assert_eq!(uploads[0].robot_id.as_deref(), Some("r1"));
        assert_eq!(uploads[0].image.len(), BASE64.decode(&encoded).unwrap_or_default().len());
    }

    #[tokio::test]
    async fn additional_maps_upsert_unlinked() {
        let map_yaml = "image: floor1.pgm\nresolution: 0.05\norigin: [0.0, 0.0, 0.0]\n";
        let extra_yaml = "image: floor2.pgm\nresolution: 0.05\norigin: [0.0, 0.0, 0.0]\n";
        let payload = ResponsePayload {
            files: MapFiles {
                map_yaml: map_yaml.to_owned(),
                map_image: "raw-bytes".to_owned(),
                features: serde_json::json!({}),
                additional_maps: vec![AdditionalMap {
                    map_yaml: extra_yaml.to_owned(),
                    map_image: "more-raw-bytes".to_owned(),
                    features: serde_json::json!({}),
                }],
            },
        };
        let uploads = parse_response("r1", &payload).expect("parses");
        let store = InMemoryMapStore::default();
        for upload in uploads {
            store.upsert(upload).await.expect("upsert succeeds");
        }
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("floor1.pgm").and_then(|m| m.robot_id), Some("r1".to_owned()));
        assert!(store.get("floor2.pgm").expect("present").robot_id.is_none());
    }
}
