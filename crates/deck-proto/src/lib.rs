//! Wire protocol shared by the backend bridge client and the playlist service.
//!
//! A single TCP connection carries a framed request/reply stream:
//! - prelude: magic "PDBK" + version u16 LE, exchanged once at connection start
//! - then repeated frames: kind u8, len u32 LE, payload `[u8; len]`
//!
//! Bulk data crosses the process boundary as **fixed-layout track records** so
//! both sides agree on sizes without negotiating a schema:
//! - title:  256 bytes, null-padded
//! - artist: 256 bytes, null-padded
//! - duration: i32 LE, seconds
//!
//! The fixed width is the contract. Strings longer than a field are truncated
//! on encode (data loss is accepted and documented); a field arriving with no
//! NUL terminator is a programming-contract violation and decodes to
//! `InvalidData` rather than being silently widened.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

pub const MAGIC: [u8; 4] = *b"PDBK";
pub const VERSION: u16 = 1;

/// Fixed byte width of each string field in a track record.
pub const FIELD_LEN: usize = 256;
/// Total wire size of one track record (two string fields + i32 duration).
pub const RECORD_LEN: usize = FIELD_LEN * 2 + 4;

/// Upper bound accepted for a single frame payload.
///
/// Keeps a misbehaving peer from forcing an unbounded allocation.
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    // Playlist CRUD.
    PlaylistSize = 0x10,
    PlaylistGet = 0x11,
    PlaylistAdd = 0x12,
    PlaylistRemove = 0x13,
    PlaylistClear = 0x14,
    PlaylistAll = 0x15,

    // Remote metadata.
    Search = 0x20,
    TopTracks = 0x21,

    // Transport mirror (fire-and-forget) and its read-backs.
    Play = 0x30,
    Pause = 0x31,
    Resume = 0x32,
    Stop = 0x33,
    CurrentIndex = 0x34,
    State = 0x35,
    Progress = 0x36,

    // Persistence, delegated to the service.
    Save = 0x40,
    Load = 0x41,

    // Replies.
    Ack = 0x60,
    CountReply = 0x61,
    RecordReply = 0x62,
    RecordListReply = 0x63,
    IndexReply = 0x64,
    StateReply = 0x65,
    ProgressReply = 0x66,

    Error = 0x7F,
}

impl FrameKind {
    pub fn from_u8(b: u8) -> io::Result<Self> {
        let k = match b {
            0x10 => FrameKind::PlaylistSize,
            0x11 => FrameKind::PlaylistGet,
            0x12 => FrameKind::PlaylistAdd,
            0x13 => FrameKind::PlaylistRemove,
            0x14 => FrameKind::PlaylistClear,
            0x15 => FrameKind::PlaylistAll,
            0x20 => FrameKind::Search,
            0x21 => FrameKind::TopTracks,
            0x30 => FrameKind::Play,
            0x31 => FrameKind::Pause,
            0x32 => FrameKind::Resume,
            0x33 => FrameKind::Stop,
            0x34 => FrameKind::CurrentIndex,
            0x35 => FrameKind::State,
            0x36 => FrameKind::Progress,
            0x40 => FrameKind::Save,
            0x41 => FrameKind::Load,
            0x60 => FrameKind::Ack,
            0x61 => FrameKind::CountReply,
            0x62 => FrameKind::RecordReply,
            0x63 => FrameKind::RecordListReply,
            0x64 => FrameKind::IndexReply,
            0x65 => FrameKind::StateReply,
            0x66 => FrameKind::ProgressReply,
            0x7F => FrameKind::Error,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unknown frame kind {b:#x}"),
                ));
            }
        };
        Ok(k)
    }
}

/// Transport state reported by the backend service.
///
/// This mirrors the service's own playback status for items it plays remotely;
/// it is independent of any local playback engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

impl TransportState {
    pub fn from_u8(b: u8) -> io::Result<Self> {
        match b {
            0 => Ok(TransportState::Stopped),
            1 => Ok(TransportState::Playing),
            2 => Ok(TransportState::Paused),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown transport state {other}"),
            )),
        }
    }
}

/// One playlist/search entry as exchanged with the backend service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub title: String,
    pub artist: String,
    /// Track length in whole seconds; never negative on the wire.
    pub duration_secs: i32,
}

/// Connection prelude: magic + version.
pub fn write_prelude(mut w: impl Write) -> io::Result<()> {
    w.write_all(&MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    Ok(())
}

/// Read and validate the connection prelude.
pub fn read_prelude(mut r: impl Read) -> io::Result<()> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
    }

    let mut ver = [0u8; 2];
    r.read_exact(&mut ver)?;
    let version = u16::from_le_bytes(ver);
    if version != VERSION {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported version {version}"),
        ));
    }

    Ok(())
}

/// Write a frame header + payload.
pub fn write_frame(mut w: impl Write, kind: FrameKind, payload: &[u8]) -> io::Result<()> {
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "payload too large"));
    }

    let mut out = Vec::with_capacity(1 + 4 + payload.len());
    out.push(kind as u8);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    w.write_all(&out)?;
    Ok(())
}

/// Read one full frame, returning `(kind, payload)`.
pub fn read_frame(mut r: impl Read) -> io::Result<(FrameKind, Vec<u8>)> {
    let mut kindb = [0u8; 1];
    r.read_exact(&mut kindb)?;
    let kind = FrameKind::from_u8(kindb[0])?;

    let mut lenb = [0u8; 4];
    r.read_exact(&mut lenb)?;
    let len = u32::from_le_bytes(lenb);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame payload too large: {len}"),
        ));
    }

    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok((kind, payload))
}

/// Encode one track record into its fixed 516-byte wire layout.
///
/// Title and artist are truncated (on a UTF-8 character boundary, to at most
/// `FIELD_LEN - 1` bytes so the NUL terminator always fits) and null-padded.
/// A negative duration is rejected.
pub fn encode_record(record: &TrackRecord) -> io::Result<Vec<u8>> {
    if record.duration_secs < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "negative track duration",
        ));
    }

    let mut out = vec![0u8; RECORD_LEN];
    write_padded_field(&record.title, &mut out[..FIELD_LEN]);
    write_padded_field(&record.artist, &mut out[FIELD_LEN..FIELD_LEN * 2]);
    out[FIELD_LEN * 2..].copy_from_slice(&record.duration_secs.to_le_bytes());
    Ok(out)
}

/// Decode one track record from its fixed wire layout.
pub fn decode_record(payload: &[u8]) -> io::Result<TrackRecord> {
    if payload.len() != RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("bad record length {}", payload.len()),
        ));
    }

    let title = read_padded_field(&payload[..FIELD_LEN], "title")?;
    let artist = read_padded_field(&payload[FIELD_LEN..FIELD_LEN * 2], "artist")?;
    let duration_secs = i32::from_le_bytes([
        payload[FIELD_LEN * 2],
        payload[FIELD_LEN * 2 + 1],
        payload[FIELD_LEN * 2 + 2],
        payload[FIELD_LEN * 2 + 3],
    ]);
    if duration_secs < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "negative track duration",
        ));
    }

    Ok(TrackRecord {
        title,
        artist,
        duration_secs,
    })
}

/// Copy `value` into `field`, truncating on a character boundary and keeping
/// at least one trailing NUL.
fn write_padded_field(value: &str, field: &mut [u8]) {
    let max = field.len() - 1;
    let mut end = value.len().min(max);
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    field[..end].copy_from_slice(&value.as_bytes()[..end]);
    // The rest is already zeroed.
}

/// Read a null-terminated fixed-width field.
///
/// A field with no terminator means the writer violated the layout contract.
fn read_padded_field(field: &[u8], name: &str) -> io::Result<String> {
    let end = field.iter().position(|&b| b == 0).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unterminated {name} field"),
        )
    })?;
    Ok(String::from_utf8_lossy(&field[..end]).into_owned())
}

/// Encode a bounded record list: u32 LE count, then `count` fixed records.
pub fn encode_record_list(records: &[TrackRecord]) -> io::Result<Vec<u8>> {
    let count: u32 = records
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many records"))?;

    let mut out = Vec::with_capacity(4 + records.len() * RECORD_LEN);
    out.extend_from_slice(&count.to_le_bytes());
    for record in records {
        out.extend_from_slice(&encode_record(record)?);
    }
    Ok(out)
}

/// Decode a bounded record list payload.
pub fn decode_record_list(payload: &[u8]) -> io::Result<Vec<TrackRecord>> {
    if payload.len() < 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "short record list"));
    }
    let count = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
    let body = &payload[4..];
    let expected = count.checked_mul(RECORD_LEN).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidData, "record list count overflow")
    })?;
    if body.len() != expected {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "record list length mismatch",
        ));
    }

    let mut out = Vec::with_capacity(count);
    for chunk in body.chunks_exact(RECORD_LEN) {
        out.push(decode_record(chunk)?);
    }
    Ok(out)
}

/// Encode a playlist index or bulk-read cap.
pub fn encode_index(index: u32) -> Vec<u8> {
    index.to_le_bytes().to_vec()
}

/// Decode a playlist index or bulk-read cap.
pub fn decode_index(payload: &[u8]) -> io::Result<u32> {
    if payload.len() != 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad index length"));
    }
    Ok(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]))
}

/// Encode the current-song index reply; `None` when nothing is mirrored.
pub fn encode_current_index(index: Option<u32>) -> Vec<u8> {
    let raw: i32 = match index {
        Some(i) => i as i32,
        None => -1,
    };
    raw.to_le_bytes().to_vec()
}

/// Decode the current-song index reply.
pub fn decode_current_index(payload: &[u8]) -> io::Result<Option<u32>> {
    if payload.len() != 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad index length"));
    }
    let raw = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    if raw < 0 {
        Ok(None)
    } else {
        Ok(Some(raw as u32))
    }
}

/// Encode a search request: u16 LE query length + UTF-8 bytes + u32 LE cap.
pub fn encode_search(query: &str, max_results: u32) -> io::Result<Vec<u8>> {
    let bytes = query.as_bytes();
    let len: u16 = bytes
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "query too long"))?;

    let mut out = Vec::with_capacity(2 + bytes.len() + 4);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    out.extend_from_slice(&max_results.to_le_bytes());
    Ok(out)
}

/// Decode a search request payload.
pub fn decode_search(payload: &[u8]) -> io::Result<(String, u32)> {
    if payload.len() < 2 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "short search payload"));
    }
    let qlen = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    if payload.len() != 2 + qlen + 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "search payload length mismatch",
        ));
    }
    let query = std::str::from_utf8(&payload[2..2 + qlen])
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "query not utf-8"))?;
    let max = u32::from_le_bytes([
        payload[2 + qlen],
        payload[2 + qlen + 1],
        payload[2 + qlen + 2],
        payload[2 + qlen + 3],
    ]);
    Ok((query.to_string(), max))
}

/// Encode an opaque persistence path: u16 LE length + UTF-8 bytes.
pub fn encode_path(path: &str) -> io::Result<Vec<u8>> {
    let bytes = path.as_bytes();
    let len: u16 = bytes
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path too long"))?;
    let mut out = Vec::with_capacity(2 + bytes.len());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Decode an opaque persistence path.
pub fn decode_path(payload: &[u8]) -> io::Result<String> {
    if payload.len() < 2 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "short path payload"));
    }
    let len = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    if payload.len() != 2 + len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "path payload length mismatch",
        ));
    }
    let path = std::str::from_utf8(&payload[2..])
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "path not utf-8"))?;
    Ok(path.to_string())
}

/// Encode the transport-state reply.
pub fn encode_state(state: TransportState) -> Vec<u8> {
    vec![state as u8]
}

/// Decode the transport-state reply.
pub fn decode_state(payload: &[u8]) -> io::Result<TransportState> {
    if payload.len() != 1 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad state length"));
    }
    TransportState::from_u8(payload[0])
}

/// Encode the progress reply (fraction of track elapsed).
pub fn encode_progress(progress: f32) -> Vec<u8> {
    progress.to_le_bytes().to_vec()
}

/// Decode the progress reply.
pub fn decode_progress(payload: &[u8]) -> io::Result<f32> {
    if payload.len() != 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad progress length"));
    }
    Ok(f32::from_le_bytes([
        payload[0], payload[1], payload[2], payload[3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(title: &str, artist: &str, secs: i32) -> TrackRecord {
        TrackRecord {
            title: title.to_string(),
            artist: artist.to_string(),
            duration_secs: secs,
        }
    }

    #[test]
    fn prelude_roundtrip_ok() {
        let mut buf = Vec::new();
        write_prelude(&mut buf).unwrap();
        read_prelude(&mut Cursor::new(buf)).unwrap();
    }

    #[test]
    fn prelude_rejects_bad_magic() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"NOPE");
        buf.extend_from_slice(&VERSION.to_le_bytes());
        let err = read_prelude(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn prelude_rejects_bad_version() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(&(VERSION + 1).to_le_bytes());
        let err = read_prelude(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn frame_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, FrameKind::Search, b"abc").unwrap();
        let (kind, payload) = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(kind, FrameKind::Search);
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn read_frame_rejects_unknown_kind() {
        let buf = vec![0x05, 0, 0, 0, 0];
        let err = read_frame(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_frame_rejects_oversized_payload() {
        let mut buf = vec![FrameKind::Ack as u8];
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_le_bytes());
        let err = read_frame(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn record_has_fixed_width() {
        let encoded = encode_record(&record("Title", "Artist", 180)).unwrap();
        assert_eq!(encoded.len(), RECORD_LEN);
        let long = "x".repeat(4096);
        let encoded = encode_record(&record(&long, &long, 1)).unwrap();
        assert_eq!(encoded.len(), RECORD_LEN);
    }

    #[test]
    fn record_truncates_long_fields() {
        let long = "x".repeat(4096);
        let encoded = encode_record(&record(&long, "a", 1)).unwrap();
        let decoded = decode_record(&encoded).unwrap();
        assert_eq!(decoded.title.len(), FIELD_LEN - 1);
        assert_eq!(decoded.artist, "a");
    }

    #[test]
    fn record_truncates_on_char_boundary() {
        // 254 ASCII bytes followed by a 2-byte character that would straddle
        // the 255-byte limit: the whole character must be dropped.
        let title = format!("{}é", "x".repeat(254));
        let encoded = encode_record(&record(&title, "a", 1)).unwrap();
        let decoded = decode_record(&encoded).unwrap();
        assert_eq!(decoded.title, "x".repeat(254));
    }

    #[test]
    fn record_rejects_negative_duration() {
        let err = encode_record(&record("t", "a", -1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn record_rejects_unterminated_field() {
        let mut raw = encode_record(&record("t", "a", 1)).unwrap();
        raw[..FIELD_LEN].fill(b'x'); // no NUL anywhere in the title field
        let err = decode_record(&raw).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn record_list_roundtrip_and_length_check() {
        let records = vec![record("One", "A", 60), record("Two", "B", 120)];
        let payload = encode_record_list(&records).unwrap();
        assert_eq!(decode_record_list(&payload).unwrap(), records);

        let err = decode_record_list(&payload[..payload.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn record_list_with_absurd_count_is_rejected() {
        // Count claims u32::MAX records; the size check must reject it (and
        // never wrap) instead of trusting the multiply.
        let mut payload = u32::MAX.to_le_bytes().to_vec();
        payload.extend_from_slice(&[0u8; 8]);
        let err = decode_record_list(&payload).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn current_index_none_is_negative() {
        let payload = encode_current_index(None);
        assert_eq!(decode_current_index(&payload).unwrap(), None);
        let payload = encode_current_index(Some(7));
        assert_eq!(decode_current_index(&payload).unwrap(), Some(7));
    }

    #[test]
    fn search_roundtrip() {
        let payload = encode_search("miles davis", 20).unwrap();
        let (query, max) = decode_search(&payload).unwrap();
        assert_eq!(query, "miles davis");
        assert_eq!(max, 20);
    }

    #[test]
    fn search_rejects_length_mismatch() {
        let mut payload = encode_search("abc", 5).unwrap();
        payload.truncate(payload.len() - 1);
        let err = decode_search(&payload).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn path_roundtrip() {
        let payload = encode_path("playlists/road-trip.m3u").unwrap();
        assert_eq!(decode_path(&payload).unwrap(), "playlists/road-trip.m3u");
    }

    #[test]
    fn state_roundtrip_and_reject() {
        for state in [
            TransportState::Stopped,
            TransportState::Playing,
            TransportState::Paused,
        ] {
            assert_eq!(decode_state(&encode_state(state)).unwrap(), state);
        }
        let err = decode_state(&[9]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn progress_roundtrip() {
        let payload = encode_progress(0.25);
        assert_eq!(decode_progress(&payload).unwrap(), 0.25);
    }
}
