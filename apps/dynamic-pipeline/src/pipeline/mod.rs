use gst::prelude::*;
use std::cell::Cell;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::linker;
use crate::{DynamicPipelineError, Result};

pub mod events;

pub use events::{
    run_event_loop, run_until_done, BusEvent, EventSource, GstBusEvents, LoopState,
    PipelineState, SessionEnd, Teardown,
};

/// The pipeline and the six elements of one playback session.
///
/// `source` is only linked at runtime, from its `pad-added` handler.
#[derive(Debug)]
pub struct Session {
    pipeline: gst::Pipeline,
    source: gst::Element,
    audio_convert: gst::Element,
    audio_resample: gst::Element,
    audio_sink: gst::Element,
    video_convert: gst::Element,
    video_sink: gst::Element,
    pad_added_handler: Option<gst::glib::SignalHandlerId>,
    torn_down: Cell<bool>,
}

fn make_element(factory: &str, name: &str) -> Result<gst::Element> {
    gst::ElementFactory::make(factory)
        .name(name)
        .build()
        .map_err(|e| {
            error!("Not all elements could be created: {} ({})", name, factory);
            DynamicPipelineError::ElementCreation {
                factory: factory.to_string(),
                name: name.to_string(),
                source: e,
            }
        })
}

/// Stop after a failed start; the start error is the one reported
fn abort_start<T: Teardown + ?Sized>(
    teardown: &T,
    err: DynamicPipelineError,
) -> DynamicPipelineError {
    if let Err(teardown_err) = teardown.teardown() {
        warn!("Error stopping pipeline after failed start: {:?}", teardown_err);
    }
    err
}

impl Session {
    /// Create, add and statically link the elements, and register the
    /// pad-added handler on the source
    pub fn build(config: &Config) -> Result<Self> {
        debug!(
            "Building pipeline {} for {}",
            config.pipeline.name, config.source.uri
        );

        let source = make_element(&config.source.factory, "source")?;
        if !source.has_property("uri") {
            return Err(DynamicPipelineError::ConfigError(format!(
                "source factory {} has no 'uri' property",
                config.source.factory
            )));
        }
        source.set_property("uri", config.source.uri.as_str());

        let audio_convert = make_element(&config.audio.convert, "audio_convert")?;
        let audio_resample = make_element(&config.audio.resample, "audio_resample")?;
        let audio_sink = make_element(&config.audio.sink, "audio_sink")?;
        let video_convert = make_element(&config.video.convert, "video_convert")?;
        let video_sink = make_element(&config.video.sink, "video_sink")?;

        let pipeline = gst::Pipeline::builder()
            .name(config.pipeline.name.as_str())
            .build();

        pipeline
            .add_many([
                &source,
                &audio_convert,
                &audio_resample,
                &audio_sink,
                &video_convert,
                &video_sink,
            ])
            .map_err(DynamicPipelineError::Assembly)?;

        // The source is not linked here, its pads appear once it knows the streams
        gst::Element::link_many([&audio_convert, &audio_resample, &audio_sink])
            .and_then(|_| video_convert.link(&video_sink))
            .map_err(|e| {
                error!("Elements could not be linked.");
                DynamicPipelineError::StaticLink(e)
            })?;

        let pad_added_handler = linker::connect_pad_added(&source, &audio_convert, &video_convert);

        info!("Pipeline {} assembled", config.pipeline.name);

        Ok(Self {
            pipeline,
            source,
            audio_convert,
            audio_resample,
            audio_sink,
            video_convert,
            video_sink,
            pad_added_handler: Some(pad_added_handler),
            torn_down: Cell::new(false),
        })
    }

    pub fn pipeline(&self) -> &gst::Pipeline {
        &self.pipeline
    }

    pub fn source(&self) -> &gst::Element {
        &self.source
    }

    pub fn audio_chain(&self) -> [&gst::Element; 3] {
        [&self.audio_convert, &self.audio_resample, &self.audio_sink]
    }

    pub fn video_chain(&self) -> [&gst::Element; 2] {
        [&self.video_convert, &self.video_sink]
    }

    /// Whether both convert elements have received a dynamic link
    pub fn is_fully_linked(&self) -> bool {
        [&self.audio_convert, &self.video_convert].iter().all(|e| {
            e.static_pad("sink")
                .map(|pad| pad.is_linked())
                .unwrap_or(false)
        })
    }

    /// Start playback (set to Playing state)
    pub fn play(&self) -> Result<()> {
        info!("Starting pipeline: {}", self.pipeline.name());
        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            error!("Unable to set the pipeline to the playing state.");
            DynamicPipelineError::StateChange(e)
        })?;
        Ok(())
    }

    pub fn events(&self) -> Result<GstBusEvents> {
        GstBusEvents::new(&self.pipeline)
    }

    /// Play until an error or end-of-stream, then stop the pipeline
    pub fn run(&self) -> Result<SessionEnd> {
        let mut events = self.events()?;
        if let Err(e) = self.play() {
            return Err(abort_start(self, e));
        }
        run_until_done(&mut events, self)
    }
}

impl Teardown for Session {
    fn teardown(&self) -> Result<()> {
        if self.torn_down.replace(true) {
            debug!("Pipeline {} already stopped", self.pipeline.name());
            return Ok(());
        }

        info!("Stopping pipeline: {}", self.pipeline.name());
        self.pipeline.set_state(gst::State::Null).map_err(|e| {
            error!("Failed to stop pipeline {}: {:?}", self.pipeline.name(), e);
            DynamicPipelineError::StateChange(e)
        })?;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handler) = self.pad_added_handler.take() {
            self.source.disconnect(handler);
        }

        if !self.torn_down.get() {
            if let Err(e) = self.teardown() {
                warn!("Error stopping pipeline during drop: {:?}", e);
            }
        }
    }
}
