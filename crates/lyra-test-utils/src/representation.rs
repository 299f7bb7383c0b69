//! Representation buffers following a script instead of downloading.

use std::collections::HashMap;

use futures::{StreamExt, stream::BoxStream};
use lyra_buffer::{
    BufferError, BufferResult, RepresentationBufferArgs, RepresentationBufferFactory, fake_buffer,
};
use lyra_core::BufferType;
use lyra_events::BufferEvent;
use parking_lot::Mutex;

/// What a scripted representation buffer does once started.
#[derive(Clone, Debug)]
pub enum Behaviour {
    /// Reports `FullBuffer` at once, then stays idle.
    Full,
    /// Never reports anything.
    Pending,
    /// Full once the wanted buffer reaches the end of the Period, active
    /// again when playback moves back.
    Clocked,
    /// Fails at once.
    Fail(BufferError),
    /// Fails on the first start, then behaves as [`Behaviour::Full`].
    FailOnce(BufferError),
}

/// A representation buffer that was started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedBuffer {
    pub buffer_type: BufferType,
    pub period_id: String,
    pub adaptation_id: String,
    pub representation_id: String,
}

/// [`RepresentationBufferFactory`] scripted per representation or Period.
///
/// A script for the representation id wins over one for the Period id.
pub struct ScriptedRepresentationBuffers {
    default: Behaviour,
    scripts: HashMap<String, Behaviour>,
    period_scripts: HashMap<String, Behaviour>,
    created: Mutex<Vec<CreatedBuffer>>,
}

impl ScriptedRepresentationBuffers {
    #[must_use]
    pub fn new(default: Behaviour) -> Self {
        Self {
            default,
            scripts: HashMap::new(),
            period_scripts: HashMap::new(),
            created: Mutex::default(),
        }
    }

    #[must_use]
    pub fn with(mut self, representation_id: &str, behaviour: Behaviour) -> Self {
        self.scripts.insert(representation_id.to_string(), behaviour);
        self
    }

    #[must_use]
    pub fn for_period(mut self, period_id: &str, behaviour: Behaviour) -> Self {
        self.period_scripts.insert(period_id.to_string(), behaviour);
        self
    }

    /// Every start so far, in call order.
    #[must_use]
    pub fn created(&self) -> Vec<CreatedBuffer> {
        self.created.lock().clone()
    }

    fn starts_of(&self, representation_id: &str) -> usize {
        self.created
            .lock()
            .iter()
            .filter(|c| c.representation_id == representation_id)
            .count()
    }
}

impl RepresentationBufferFactory for ScriptedRepresentationBuffers {
    fn create(&self, args: RepresentationBufferArgs) -> BoxStream<'static, BufferResult<BufferEvent>> {
        let content = args.content;
        let buffer_type = content.adaptation.buffer_type;
        let representation_id = content.representation.id.clone();
        let earlier_starts = self.starts_of(&representation_id);
        self.created.lock().push(CreatedBuffer {
            buffer_type,
            period_id: content.period.id.clone(),
            adaptation_id: content.adaptation.id.clone(),
            representation_id: representation_id.clone(),
        });

        let behaviour = self
            .scripts
            .get(&representation_id)
            .or_else(|| self.period_scripts.get(&content.period.id))
            .unwrap_or(&self.default)
            .clone();
        tracing::trace!(%buffer_type, representation = %representation_id, ?behaviour, "scripted buffer");

        let full = || {
            futures::stream::iter([Ok(BufferEvent::FullBuffer { buffer_type })])
                .chain(futures::stream::pending())
                .boxed()
        };
        match behaviour {
            Behaviour::Full => full(),
            Behaviour::Pending => futures::stream::pending().boxed(),
            Behaviour::Clocked => fake_buffer(
                buffer_type,
                content.period,
                args.clock,
                args.wanted_buffer_ahead,
            ),
            Behaviour::Fail(error) => futures::stream::iter([Err(error)]).boxed(),
            Behaviour::FailOnce(error) if earlier_starts == 0 => {
                futures::stream::iter([Err(error)]).boxed()
            }
            Behaviour::FailOnce(_) => full(),
        }
    }
}
