/// Read-only snapshot of the playback state.
///
/// Produced by the player at every clock tick and distributed through a
/// `tokio::sync::watch` channel. `download_bitrate` and `last_index_position`
/// are left empty by the producer; the adaptation layer fills them with the
/// currently downloaded representation before handing ticks to the ABR logic.
#[derive(Clone, Debug, PartialEq)]
pub struct ClockTick {
    /// Playback position, in seconds.
    pub current_time: f64,
    /// Seconds of contiguous buffered media ahead of `current_time`.
    pub buffer_gap: f64,
    /// Content duration, in seconds. `f64::INFINITY` when unknown.
    pub duration: f64,
    /// Playback rate.
    pub speed: f64,
    /// Whether this tick was produced by a seek.
    pub seeking: bool,
    /// Bitrate of the representation currently being downloaded.
    pub download_bitrate: Option<u64>,
    /// Last position announced by that representation's index.
    pub last_index_position: Option<f64>,
}

impl ClockTick {
    #[must_use]
    pub fn at(current_time: f64) -> Self {
        Self {
            current_time,
            buffer_gap: 0.0,
            duration: f64::INFINITY,
            speed: 1.0,
            seeking: false,
            download_bitrate: None,
            last_index_position: None,
        }
    }

    #[must_use]
    pub fn with_buffer_gap(mut self, buffer_gap: f64) -> Self {
        self.buffer_gap = buffer_gap;
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_download_bitrate(mut self, bitrate: Option<u64>) -> Self {
        self.download_bitrate = bitrate;
        self
    }

    #[must_use]
    pub fn with_last_index_position(mut self, position: Option<f64>) -> Self {
        self.last_index_position = position;
        self
    }

    #[must_use]
    pub fn seeking(mut self) -> Self {
        self.seeking = true;
        self
    }

    /// Position of the next media needed by playback.
    #[must_use]
    pub fn next_needed_position(&self) -> f64 {
        self.current_time + self.buffer_gap
    }

    /// End of the content as far as the buffer is concerned: the duration
    /// when known, the last indexed position otherwise.
    #[must_use]
    pub fn content_end(&self) -> f64 {
        if self.duration.is_finite() {
            self.duration
        } else {
            self.last_index_position.unwrap_or(f64::INFINITY)
        }
    }
}
