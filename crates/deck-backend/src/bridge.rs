//! One method per backend operation.
//!
//! Playback commands (play, pause, resume, stop) are fire-and-forget: the
//! backend applies them to its own transport state and the caller polls state
//! and progress separately. Everything else is a request/reply roundtrip with
//! the reply kind checked before decoding.

use anyhow::{Result, anyhow, bail};
use deck_proto::{FrameKind, TrackRecord, TransportState};

use crate::transport::Transport;

/// Client-side view of the playlist and search service.
pub struct BackendBridge<T: Transport> {
    transport: T,
}

impl<T: Transport> BackendBridge<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Number of tracks in the remote playlist.
    pub fn playlist_size(&mut self) -> Result<u32> {
        let payload = self.roundtrip(FrameKind::PlaylistSize, &[], FrameKind::CountReply)?;
        Ok(deck_proto::decode_index(&payload)?)
    }

    /// Fetch one track record by playlist index.
    pub fn playlist_song(&mut self, index: u32) -> Result<TrackRecord> {
        let payload = self.roundtrip(
            FrameKind::PlaylistGet,
            &deck_proto::encode_index(index),
            FrameKind::RecordReply,
        )?;
        Ok(deck_proto::decode_record(&payload)?)
    }

    /// Append a track to the playlist; returns its new index.
    pub fn add_song(&mut self, record: &TrackRecord) -> Result<u32> {
        let payload = self.roundtrip(
            FrameKind::PlaylistAdd,
            &deck_proto::encode_record(record)?,
            FrameKind::IndexReply,
        )?;
        Ok(deck_proto::decode_index(&payload)?)
    }

    /// Remove the track at `index`.
    pub fn remove_song(&mut self, index: u32) -> Result<()> {
        self.roundtrip(
            FrameKind::PlaylistRemove,
            &deck_proto::encode_index(index),
            FrameKind::Ack,
        )?;
        Ok(())
    }

    /// Remove every track from the playlist.
    pub fn clear_playlist(&mut self) -> Result<()> {
        self.roundtrip(FrameKind::PlaylistClear, &[], FrameKind::Ack)?;
        Ok(())
    }

    /// Fetch the playlist in insertion order, capped at `max` entries.
    ///
    /// The cap travels in the request so the backend bounds the reply; it is
    /// applied on this side as well, so an over-eager reply can never hand
    /// the caller more records than asked for.
    pub fn all_songs(&mut self, max: u32) -> Result<Vec<TrackRecord>> {
        let payload = self.roundtrip(
            FrameKind::PlaylistAll,
            &deck_proto::encode_index(max),
            FrameKind::RecordListReply,
        )?;
        let mut records = deck_proto::decode_record_list(&payload)?;
        records.truncate(max as usize);
        Ok(records)
    }

    /// Search the remote catalog. Empty or whitespace-only queries are
    /// rejected locally without a roundtrip.
    pub fn search_remote(&mut self, query: &str, max: u32) -> Result<Vec<TrackRecord>> {
        if query.trim().is_empty() {
            bail!("empty search query");
        }
        let payload = self.roundtrip(
            FrameKind::Search,
            &deck_proto::encode_search(query, max)?,
            FrameKind::RecordListReply,
        )?;
        let mut records = deck_proto::decode_record_list(&payload)?;
        records.truncate(max as usize);
        Ok(records)
    }

    /// Fetch the service's chart of top tracks.
    pub fn top_tracks(&mut self, max: u32) -> Result<Vec<TrackRecord>> {
        let payload = self.roundtrip(
            FrameKind::TopTracks,
            &deck_proto::encode_index(max),
            FrameKind::RecordListReply,
        )?;
        let mut records = deck_proto::decode_record_list(&payload)?;
        records.truncate(max as usize);
        Ok(records)
    }

    /// Ask the backend to start playing the track at playlist `index`.
    pub fn play_song(&mut self, index: u32) -> Result<()> {
        self.transport
            .send(FrameKind::Play, &deck_proto::encode_index(index))
    }

    pub fn pause_song(&mut self) -> Result<()> {
        self.transport.send(FrameKind::Pause, &[])
    }

    pub fn resume_song(&mut self) -> Result<()> {
        self.transport.send(FrameKind::Resume, &[])
    }

    pub fn stop_song(&mut self) -> Result<()> {
        self.transport.send(FrameKind::Stop, &[])
    }

    /// Index of the track the backend considers current, if any.
    pub fn current_song_index(&mut self) -> Result<Option<u32>> {
        let payload = self.roundtrip(FrameKind::CurrentIndex, &[], FrameKind::IndexReply)?;
        Ok(deck_proto::decode_current_index(&payload)?)
    }

    /// The backend's own transport state, independent of the local engine.
    pub fn transport_state(&mut self) -> Result<TransportState> {
        let payload = self.roundtrip(FrameKind::State, &[], FrameKind::StateReply)?;
        Ok(deck_proto::decode_state(&payload)?)
    }

    /// Playback progress as a fraction, clamped into `[0.0, 1.0]`.
    pub fn progress(&mut self) -> Result<f32> {
        let payload = self.roundtrip(FrameKind::Progress, &[], FrameKind::ProgressReply)?;
        let progress = deck_proto::decode_progress(&payload)?;
        Ok(if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        })
    }

    /// Persist the remote playlist to `path` on the backend's filesystem.
    pub fn save_playlist(&mut self, path: &str) -> Result<()> {
        self.roundtrip(FrameKind::Save, &deck_proto::encode_path(path)?, FrameKind::Ack)?;
        Ok(())
    }

    /// Replace the remote playlist with the one stored at `path`.
    pub fn load_playlist(&mut self, path: &str) -> Result<()> {
        self.roundtrip(FrameKind::Load, &deck_proto::encode_path(path)?, FrameKind::Ack)?;
        Ok(())
    }

    /// Roundtrip plus reply-kind check; backend `Error` frames surface their
    /// message as the error.
    fn roundtrip(&mut self, kind: FrameKind, payload: &[u8], want: FrameKind) -> Result<Vec<u8>> {
        let (reply_kind, reply) = self.transport.request(kind, payload)?;
        match reply_kind {
            k if k == want => Ok(reply),
            FrameKind::Error => {
                let message = String::from_utf8_lossy(&reply).into_owned();
                Err(anyhow!("backend error: {message}"))
            }
            other => Err(anyhow!("unexpected reply {other:?} to {kind:?}")),
        }
    }
}
