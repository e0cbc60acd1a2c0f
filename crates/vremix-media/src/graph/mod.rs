//! Typed filter graph plans.
//!
//! A `GraphPlan` is built as data (inputs, labelled segments, designated
//! outputs) and only turned into `-filter_complex` text at the end, so the
//! wiring can be checked before anything is handed to the engine.

pub mod compiler;

use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

pub use compiler::{CompiledJob, FilterGraphCompiler};

/// Kind of an input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Video => "v",
            StreamKind::Audio => "a",
        }
    }
}

/// A link in the filter graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Stream of an `-i` input, e.g. `[0:v]`
    Input { index: usize, stream: StreamKind },
    /// Intermediate or output node, e.g. `[zoom3]`
    Node(String),
}

impl Label {
    pub fn input(index: usize, stream: StreamKind) -> Self {
        Label::Input { index, stream }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Label::Node(_))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Input { index, stream } => write!(f, "[{}:{}]", index, stream.as_str()),
            Label::Node(name) => write!(f, "[{}]", name),
        }
    }
}

/// Hands out node labels that are unique within one plan.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    counter: usize,
    issued: HashSet<String>,
}

impl LabelAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh intermediate label `<prefix><n>`; `n` increases on every call.
    pub fn next(&mut self, prefix: &str) -> Label {
        loop {
            let name = format!("{}{}", prefix, self.counter);
            self.counter += 1;
            if self.issued.insert(name.clone()) {
                return Label::Node(name);
            }
        }
    }

    /// Label with an exact name (for mapped outputs), suffixed if already taken.
    pub fn named(&mut self, name: &str) -> Label {
        if self.issued.insert(name.to_string()) {
            Label::Node(name.to_string())
        } else {
            self.next(name)
        }
    }
}

/// One filter chain: `[in...]f1,f2,...[out...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub inputs: Vec<Label>,
    pub filters: Vec<String>,
    pub outputs: Vec<Label>,
}

impl Segment {
    pub fn new(inputs: Vec<Label>, filters: Vec<String>, outputs: Vec<Label>) -> Self {
        Self {
            inputs,
            filters,
            outputs,
        }
    }

    /// Single-input, single-output chain.
    pub fn chain(input: Label, filters: Vec<String>, output: Label) -> Self {
        Self::new(vec![input], filters, vec![output])
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "{}", label)?;
        }
        write!(f, "{}", self.filters.join(","))?;
        for label in &self.outputs {
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

/// An engine input and the streams it contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    /// Options placed before `-i`
    pub args: Vec<String>,
    /// Path or lavfi graph given to `-i`
    pub source: String,
    pub streams: Vec<StreamKind>,
}

impl InputBinding {
    pub fn file(source: impl Into<String>, streams: Vec<StreamKind>) -> Self {
        Self {
            args: Vec::new(),
            source: source.into(),
            streams,
        }
    }

    /// Input repeated indefinitely (`-stream_loop -1`).
    pub fn stream_loop(source: impl Into<String>, streams: Vec<StreamKind>) -> Self {
        Self {
            args: vec!["-stream_loop".to_string(), "-1".to_string()],
            ..Self::file(source, streams)
        }
    }

    /// Still image repeated as a video stream (`-loop 1`).
    pub fn still_loop(source: impl Into<String>) -> Self {
        Self {
            args: vec!["-loop".to_string(), "1".to_string()],
            ..Self::file(source, vec![StreamKind::Video])
        }
    }

    /// Virtual input from the lavfi device.
    pub fn lavfi(graph: impl Into<String>, streams: Vec<StreamKind>) -> Self {
        Self {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            ..Self::file(graph, streams)
        }
    }

    pub fn provides(&self, stream: StreamKind) -> bool {
        self.streams.contains(&stream)
    }
}

/// Wiring defects found by [`GraphPlan::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("segment {segment} reads undeclared input stream {label}")]
    UndeclaredInput { segment: usize, label: String },

    #[error("segment {segment} reads {label} before it is produced")]
    UnknownLabel { segment: usize, label: String },

    #[error("label {0} is produced more than once")]
    DuplicateProducer(String),

    #[error("label {0} is consumed more than once")]
    DuplicateConsumer(String),

    #[error("label {0} is produced but never consumed")]
    Dangling(String),

    #[error("designated output {0} is not produced by the graph")]
    OutputNotProduced(String),

    #[error("designated output {0} is consumed inside the graph")]
    OutputConsumed(String),

    #[error("graph has an audio output but audio is muted")]
    UnexpectedAudio,

    #[error("graph has no audio output")]
    MissingAudio,
}

/// Compiled, not yet serialized, filter graph for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPlan {
    pub inputs: Vec<InputBinding>,
    pub segments: Vec<Segment>,
    pub video_out: Label,
    pub audio_out: Option<Label>,
}

impl GraphPlan {
    /// Check label wiring. `audio_expected` is false for muted jobs.
    pub fn validate(&self, audio_expected: bool) -> Result<(), GraphError> {
        // label -> producing segment index
        let mut produced: HashMap<&Label, usize> = HashMap::new();
        let mut consumed: HashSet<&Label> = HashSet::new();

        for (i, segment) in self.segments.iter().enumerate() {
            for label in &segment.inputs {
                match label {
                    Label::Input { index, stream } => {
                        let declared = self
                            .inputs
                            .get(*index)
                            .map(|b| b.provides(*stream))
                            .unwrap_or(false);
                        if !declared {
                            return Err(GraphError::UndeclaredInput {
                                segment: i,
                                label: label.to_string(),
                            });
                        }
                    }
                    Label::Node(_) => {
                        if !produced.contains_key(label) {
                            return Err(GraphError::UnknownLabel {
                                segment: i,
                                label: label.to_string(),
                            });
                        }
                        if !consumed.insert(label) {
                            return Err(GraphError::DuplicateConsumer(label.to_string()));
                        }
                    }
                }
            }

            for label in &segment.outputs {
                if produced.insert(label, i).is_some() {
                    return Err(GraphError::DuplicateProducer(label.to_string()));
                }
            }
        }

        let mut outputs = vec![&self.video_out];
        match (&self.audio_out, audio_expected) {
            (Some(audio), true) => outputs.push(audio),
            (Some(_), false) => return Err(GraphError::UnexpectedAudio),
            (None, true) => return Err(GraphError::MissingAudio),
            (None, false) => {}
        }

        for output in &outputs {
            if !produced.contains_key(output) {
                return Err(GraphError::OutputNotProduced(output.to_string()));
            }
            if consumed.contains(output) {
                return Err(GraphError::OutputConsumed(output.to_string()));
            }
        }

        for segment in &self.segments {
            for label in &segment.outputs {
                if !consumed.contains(label) && !outputs.contains(&label) {
                    return Err(GraphError::Dangling(label.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Serialize segments to `-filter_complex` text.
    pub fn filter_complex(&self) -> String {
        self.segments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Format a factor for filter arguments: at most six decimals, no trailing zeros.
pub fn format_number(value: f64) -> String {
    let text = format!("{:.6}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
