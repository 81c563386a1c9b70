use gst::prelude::*;
use std::fmt;
use tracing::{debug, error, info};

/// Pipeline state tracking
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl From<gst::State> for PipelineState {
    fn from(state: gst::State) -> Self {
        match state {
            gst::State::Null => PipelineState::Null,
            gst::State::Ready => PipelineState::Ready,
            gst::State::Paused => PipelineState::Paused,
            gst::State::Playing => PipelineState::Playing,
            _ => PipelineState::Null,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Null => "NULL",
            PipelineState::Ready => "READY",
            PipelineState::Paused => "PAUSED",
            PipelineState::Playing => "PLAYING",
        };
        f.write_str(name)
    }
}

/// Message bus events the session reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    StateChanged {
        /// Whether the message was posted by the pipeline itself
        from_pipeline: bool,
        old: PipelineState,
        current: PipelineState,
    },
    Error {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    Eos,
}

impl BusEvent {
    /// Convert a bus message, `None` for message types the loop doesn't handle
    pub fn from_message(msg: &gst::Message, pipeline: &gst::Pipeline) -> Option<Self> {
        match msg.view() {
            gst::MessageView::Error(err) => Some(BusEvent::Error {
                source: err.src().map(|s| s.name().to_string()),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            }),
            gst::MessageView::Eos(_) => Some(BusEvent::Eos),
            gst::MessageView::StateChanged(state_changed) => Some(BusEvent::StateChanged {
                from_pipeline: state_changed
                    .src()
                    .map(|s| s == pipeline.upcast_ref::<gst::Object>())
                    .unwrap_or(false),
                old: state_changed.old().into(),
                current: state_changed.current().into(),
            }),
            _ => None,
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    Error {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    EndOfStream,
    /// The bus was flushed before an error or EOS arrived
    BusClosed,
}

impl SessionEnd {
    pub fn is_error(&self) -> bool {
        matches!(self, SessionEnd::Error { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Running,
    Done(SessionEnd),
}

impl LoopState {
    pub fn on_event(event: BusEvent) -> LoopState {
        match event {
            BusEvent::StateChanged {
                from_pipeline: true,
                old,
                current,
            } => {
                info!("Pipeline state changed from {} to {}", old, current);
                LoopState::Running
            }
            BusEvent::StateChanged { old, current, .. } => {
                debug!("Element state changed from {} to {}", old, current);
                LoopState::Running
            }
            BusEvent::Error {
                source,
                message,
                debug,
            } => {
                error!(
                    "Error received from element {}: {}",
                    source.as_deref().unwrap_or("<unknown>"),
                    message
                );
                let debug_info = debug.as_deref().unwrap_or("none");
                error!("Debugging information: {}", debug_info);
                LoopState::Done(SessionEnd::Error {
                    source,
                    message,
                    debug,
                })
            }
            BusEvent::Eos => {
                info!("End-Of-Stream reached.");
                LoopState::Done(SessionEnd::EndOfStream)
            }
        }
    }
}

/// Blocking source of bus events
pub trait EventSource {
    /// Wait for the next event; `None` once no further event can arrive
    fn next_event(&mut self) -> Option<BusEvent>;
}

/// Returns the pipeline to its stopped state
pub trait Teardown {
    fn teardown(&self) -> crate::Result<()>;
}

/// Consume events until an error or end-of-stream
pub fn run_event_loop<E: EventSource + ?Sized>(events: &mut E) -> SessionEnd {
    loop {
        let Some(event) = events.next_event() else {
            info!("Bus closed, stopping");
            return SessionEnd::BusClosed;
        };

        if let LoopState::Done(end) = LoopState::on_event(event) {
            return end;
        }
    }
}

/// Run the loop, then tear down whatever the outcome
pub fn run_until_done<E, T>(events: &mut E, teardown: &T) -> crate::Result<SessionEnd>
where
    E: EventSource + ?Sized,
    T: Teardown + ?Sized,
{
    let end = run_event_loop(events);
    teardown.teardown()?;
    Ok(end)
}

/// `EventSource` over a pipeline bus, waiting without timeout
pub struct GstBusEvents {
    bus: gst::Bus,
    pipeline: gst::Pipeline,
}

impl GstBusEvents {
    pub fn new(pipeline: &gst::Pipeline) -> crate::Result<Self> {
        let bus = pipeline.bus().ok_or_else(|| {
            crate::DynamicPipelineError::NoBus(pipeline.name().to_string())
        })?;

        Ok(Self {
            bus,
            pipeline: pipeline.clone(),
        })
    }
}

impl EventSource for GstBusEvents {
    fn next_event(&mut self) -> Option<BusEvent> {
        loop {
            let msg = self.bus.timed_pop_filtered(
                gst::ClockTime::NONE,
                &[
                    gst::MessageType::StateChanged,
                    gst::MessageType::Error,
                    gst::MessageType::Eos,
                ],
            )?;

            if let Some(event) = BusEvent::from_message(&msg, &self.pipeline) {
                return Some(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{capture, Messages};
    use std::cell::Cell;
    use std::collections::VecDeque;

    struct ScriptedEvents(VecDeque<BusEvent>);

    impl ScriptedEvents {
        fn new(events: impl IntoIterator<Item = BusEvent>) -> Self {
            Self(events.into_iter().collect())
        }
    }

    impl EventSource for ScriptedEvents {
        fn next_event(&mut self) -> Option<BusEvent> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct CountingTeardown(Cell<usize>);

    impl Teardown for CountingTeardown {
        fn teardown(&self) -> crate::Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn pipeline_state(old: PipelineState, current: PipelineState) -> BusEvent {
        BusEvent::StateChanged {
            from_pipeline: true,
            old,
            current,
        }
    }

    fn error_event() -> BusEvent {
        BusEvent::Error {
            source: Some("source".to_string()),
            message: "Could not resolve server name.".to_string(),
            debug: None,
        }
    }

    #[test]
    fn test_state_conversion() {
        assert_eq!(PipelineState::from(gst::State::Playing), PipelineState::Playing);
        assert_eq!(PipelineState::from(gst::State::VoidPending), PipelineState::Null);
        assert_eq!(PipelineState::Paused.to_string(), "PAUSED");
    }

    #[test]
    fn test_state_changes_keep_running() {
        assert_eq!(
            LoopState::on_event(pipeline_state(PipelineState::Null, PipelineState::Ready)),
            LoopState::Running
        );
        assert_eq!(
            LoopState::on_event(BusEvent::StateChanged {
                from_pipeline: false,
                old: PipelineState::Ready,
                current: PipelineState::Paused,
            }),
            LoopState::Running
        );
    }

    #[test]
    fn test_pipeline_state_change_is_logged() {
        let messages = Messages::default();

        capture(&messages, || {
            LoopState::on_event(pipeline_state(PipelineState::Paused, PipelineState::Playing));
            LoopState::on_event(BusEvent::StateChanged {
                from_pipeline: false,
                old: PipelineState::Null,
                current: PipelineState::Ready,
            });
        });

        assert_eq!(
            messages.at(tracing::Level::INFO),
            vec!["Pipeline state changed from PAUSED to PLAYING".to_string()]
        );
        // Child element transitions stay at debug
        assert_eq!(
            messages.at(tracing::Level::DEBUG),
            vec!["Element state changed from NULL to READY".to_string()]
        );
    }

    #[test]
    fn test_error_and_eos_are_logged() {
        let messages = Messages::default();

        let end = capture(&messages, || LoopState::on_event(error_event()));
        assert!(matches!(end, LoopState::Done(SessionEnd::Error { .. })));
        assert_eq!(
            messages.at(tracing::Level::ERROR),
            vec![
                "Error received from element source: Could not resolve server name.".to_string(),
                "Debugging information: none".to_string(),
            ]
        );

        let messages = Messages::default();
        capture(&messages, || {
            LoopState::on_event(BusEvent::Error {
                source: None,
                message: "boom".to_string(),
                debug: Some("gstfilesrc.c(1): no such file".to_string()),
            })
        });
        assert_eq!(
            messages.lines(),
            vec![
                "Error received from element <unknown>: boom".to_string(),
                "Debugging information: gstfilesrc.c(1): no such file".to_string(),
            ]
        );

        let messages = Messages::default();
        let end = capture(&messages, || LoopState::on_event(BusEvent::Eos));
        assert_eq!(end, LoopState::Done(SessionEnd::EndOfStream));
        assert_eq!(messages.lines(), vec!["End-Of-Stream reached.".to_string()]);
    }

    #[test]
    fn test_error_ends_session_with_single_teardown() {
        let mut events = ScriptedEvents::new([
            pipeline_state(PipelineState::Null, PipelineState::Ready),
            error_event(),
            BusEvent::Eos,
        ]);
        let teardown = CountingTeardown::default();

        let end = run_until_done(&mut events, &teardown).unwrap();

        assert!(end.is_error());
        assert_eq!(
            end,
            SessionEnd::Error {
                source: Some("source".to_string()),
                message: "Could not resolve server name.".to_string(),
                debug: None,
            }
        );
        assert_eq!(teardown.0.get(), 1);
        // The loop stops at the error, later events stay queued
        assert_eq!(events.0.len(), 1);
    }

    #[test]
    fn test_eos_ends_session_without_error() {
        let mut events = ScriptedEvents::new([
            pipeline_state(PipelineState::Null, PipelineState::Ready),
            pipeline_state(PipelineState::Ready, PipelineState::Paused),
            pipeline_state(PipelineState::Paused, PipelineState::Playing),
            BusEvent::Eos,
        ]);
        let teardown = CountingTeardown::default();

        let end = run_until_done(&mut events, &teardown).unwrap();

        assert_eq!(end, SessionEnd::EndOfStream);
        assert!(!end.is_error());
        assert_eq!(teardown.0.get(), 1);
        assert!(events.0.is_empty());
    }

    #[test]
    fn test_closed_bus_still_tears_down() {
        let mut events = ScriptedEvents::new(Vec::new());
        let teardown = CountingTeardown::default();

        let end = run_until_done(&mut events, &teardown).unwrap();

        assert_eq!(end, SessionEnd::BusClosed);
        assert_eq!(teardown.0.get(), 1);
    }

    #[test]
    fn test_messages_from_gst_bus() {
        gst::init().unwrap();

        let pipeline = gst::Pipeline::builder().name("events-test").build();
        let mut events = GstBusEvents::new(&pipeline).unwrap();
        let bus = pipeline.bus().unwrap();

        let other = gst::Pipeline::builder().name("other").build();
        bus.post(
            gst::message::StateChanged::builder(
                gst::State::Ready,
                gst::State::Paused,
                gst::State::VoidPending,
            )
            .src(&other)
            .build(),
        )
        .unwrap();
        bus.post(
            gst::message::StateChanged::builder(
                gst::State::Null,
                gst::State::Ready,
                gst::State::VoidPending,
            )
            .src(&pipeline)
            .build(),
        )
        .unwrap();
        assert_eq!(
            events.next_event(),
            Some(BusEvent::StateChanged {
                from_pipeline: false,
                old: PipelineState::Ready,
                current: PipelineState::Paused,
            })
        );
        assert_eq!(
            events.next_event(),
            Some(pipeline_state(PipelineState::Null, PipelineState::Ready))
        );

        bus.post(gst::message::Eos::builder().src(&pipeline).build())
            .unwrap();
        assert_eq!(events.next_event(), Some(BusEvent::Eos));

        bus.post(
            gst::message::Error::builder(gst::CoreError::Failed, "boom")
                .src(&pipeline)
                .debug("details")
                .build(),
        )
        .unwrap();
        assert_eq!(
            events.next_event(),
            Some(BusEvent::Error {
                source: Some("events-test".to_string()),
                message: "boom".to_string(),
                debug: Some("details".to_string()),
            })
        );
    }
}
