//! Linking of pads that a source element exposes only once it knows the
//! stream format.
//!
//! `uridecodebin` creates one source pad per decoded stream. Each new pad is
//! classified by the name of its first caps structure and linked to the sink
//! pad of the audio or video convert element. Link failures are reported and
//! never stop the session.

use gst::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};

const RAW_AUDIO: &str = "audio/x-raw";
const RAW_VIDEO: &str = "video/x-raw";

/// Media class of a negotiated pad
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    RawAudio,
    RawVideo,
    Other,
}

impl MediaKind {
    /// Classify a caps structure name by prefix
    pub fn classify(media_type: &str) -> Self {
        if media_type.starts_with(RAW_AUDIO) {
            Self::RawAudio
        } else if media_type.starts_with(RAW_VIDEO) {
            Self::RawVideo
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RawAudio => f.write_str("raw audio"),
            Self::RawVideo => f.write_str("raw video"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// The pad operations the linker relies on
pub trait LinkablePad {
    type Error: fmt::Display;

    fn name(&self) -> String;

    /// Name of the first structure of the negotiated caps, if any
    fn media_type(&self) -> Option<String>;

    fn is_linked(&self) -> bool;

    fn link(&self, sink: &Self) -> Result<(), Self::Error>;
}

impl LinkablePad for gst::Pad {
    type Error = gst::PadLinkError;

    fn name(&self) -> String {
        GstObjectExt::name(self).to_string()
    }

    fn media_type(&self) -> Option<String> {
        let caps = self.current_caps()?;
        caps.structure(0).map(|s| s.name().to_string())
    }

    fn is_linked(&self) -> bool {
        PadExt::is_linked(self)
    }

    fn link(&self, sink: &Self) -> Result<(), Self::Error> {
        PadExt::link(self, sink).map(|_| ())
    }
}

/// What happened to a newly added pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Both destinations were linked before, nothing attempted
    AlreadyLinked,
    Linked(MediaKind),
    LinkFailed(MediaKind),
    /// Not raw audio or video; carries the media type
    Ignored(String),
    /// The pad has no negotiated caps yet
    MissingCaps,
}

/// Links new source pads to the audio and video chain entry pads
#[derive(Debug)]
pub struct PadLinker<P> {
    audio_sink: P,
    video_sink: P,
}

impl<P: LinkablePad> PadLinker<P> {
    pub fn new(audio_sink: P, video_sink: P) -> Self {
        Self {
            audio_sink,
            video_sink,
        }
    }

    pub fn audio_sink(&self) -> &P {
        &self.audio_sink
    }

    pub fn video_sink(&self) -> &P {
        &self.video_sink
    }

    pub fn is_complete(&self) -> bool {
        self.audio_sink.is_linked() && self.video_sink.is_linked()
    }

    /// Handle one `pad-added` emission of `source_name`
    pub fn handle_pad_added(&self, source_name: &str, new_pad: &P) -> LinkOutcome {
        info!("Received new pad '{}' from '{}':", new_pad.name(), source_name);

        if self.is_complete() {
            info!("We are already linked. Ignoring.");
            return LinkOutcome::AlreadyLinked;
        }

        let Some(media_type) = new_pad.media_type() else {
            warn!("Pad '{}' has no negotiated caps. Ignoring.", new_pad.name());
            return LinkOutcome::MissingCaps;
        };

        let kind = MediaKind::classify(&media_type);
        let sink = match kind {
            MediaKind::RawAudio => &self.audio_sink,
            MediaKind::RawVideo => &self.video_sink,
            MediaKind::Other => {
                info!(
                    "It has type '{}' which is not raw audio or video. Ignoring.",
                    media_type
                );
                return LinkOutcome::Ignored(media_type);
            }
        };

        debug!("Linking '{}' ({}) to '{}'", new_pad.name(), kind, sink.name());
        match new_pad.link(sink) {
            Ok(()) => {
                info!("Link succeeded (type '{}').", media_type);
                LinkOutcome::Linked(kind)
            }
            Err(err) => {
                warn!("Type is '{}' but link failed: {}", media_type, err);
                LinkOutcome::LinkFailed(kind)
            }
        }
    }
}

/// Register the linker on `source`'s `pad-added` signal.
///
/// The handler only keeps weak references to the convert elements; the
/// pipeline owns them.
pub fn connect_pad_added(
    source: &gst::Element,
    audio_convert: &gst::Element,
    video_convert: &gst::Element,
) -> gst::glib::SignalHandlerId {
    let audio_weak = audio_convert.downgrade();
    let video_weak = video_convert.downgrade();

    source.connect_pad_added(move |src, new_pad| {
        let (Some(audio_convert), Some(video_convert)) =
            (audio_weak.upgrade(), video_weak.upgrade())
        else {
            warn!("Convert elements have been dropped, ignoring pad-added signal");
            return;
        };

        let (Some(audio_sink), Some(video_sink)) = (
            audio_convert.static_pad("sink"),
            video_convert.static_pad("sink"),
        ) else {
            warn!("Convert elements have no sink pad, ignoring pad-added signal");
            return;
        };

        let linker = PadLinker::new(audio_sink, video_sink);
        let outcome = linker.handle_pad_added(&src.name(), new_pad);
        debug!(
            "pad-added outcome for {}: {:?}",
            GstObjectExt::name(new_pad),
            outcome
        );
    })
}
