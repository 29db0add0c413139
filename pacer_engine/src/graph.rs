use crate::nodes::{GainEnvelope, Oscillator};
use crossbeam_channel::Sender;
use pacer_shared::Waveform;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::HashMap;
use thiserror::Error;

/// Handle to a node in a tone graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// The output sink every audible path ends in.
pub const DESTINATION: NodeId = NodeId(0);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} already exists")]
    DuplicateNode(NodeId),
    #[error("node {0:?} is not a tone")]
    NotATone(NodeId),
    #[error("node {0:?} is not an envelope")]
    NotAnEnvelope(NodeId),
    #[error("cannot connect {from:?} to {to:?}")]
    InvalidConnection { from: NodeId, to: NodeId },
    #[error("exponential ramp target must be positive and finite, got {0}")]
    InvalidRampTarget(f64),
    #[error("automation value must be finite, got {0}")]
    InvalidValue(f64),
    #[error("time must be finite, got {0}")]
    InvalidTime(f64),
    #[error("frequency must be positive and finite, got {0}")]
    InvalidFrequency(f64),
    #[error("tone {0:?} was already started")]
    AlreadyStarted(NodeId),
    #[error("tone output is closed")]
    OutputClosed,
    #[error("tone output unavailable")]
    Unavailable,
}

/// A single mutation of a tone graph. The control side produces these, the
/// renderer applies them.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    CreateTone { id: NodeId, waveform: Waveform, frequency: f64 },
    CreateEnvelope { id: NodeId },
    Connect { from: NodeId, to: NodeId },
    SetValueAtTime { envelope: NodeId, value: f64, time: f64 },
    ExponentialRampToValueAtTime { envelope: NodeId, value: f64, time: f64 },
    Start { tone: NodeId, time: f64 },
    Stop { tone: NodeId, time: f64 },
}

impl GraphOp {
    /// Value-level checks that need no graph state.
    pub fn check(&self) -> Result<(), GraphError> {
        fn finite_time(t: f64) -> Result<(), GraphError> {
            if t.is_finite() { Ok(()) } else { Err(GraphError::InvalidTime(t)) }
        }
        match *self {
            GraphOp::CreateTone { frequency, .. } => {
                if frequency.is_finite() && frequency > 0.0 {
                    Ok(())
                } else {
                    Err(GraphError::InvalidFrequency(frequency))
                }
            }
            GraphOp::CreateEnvelope { .. } | GraphOp::Connect { .. } => Ok(()),
            GraphOp::SetValueAtTime { value, time, .. } => {
                if !value.is_finite() {
                    return Err(GraphError::InvalidValue(value));
                }
                finite_time(time)
            }
            GraphOp::ExponentialRampToValueAtTime { value, time, .. } => {
                if !value.is_finite() || value <= 0.0 {
                    return Err(GraphError::InvalidRampTarget(value));
                }
                finite_time(time)
            }
            GraphOp::Start { time, .. } | GraphOp::Stop { time, .. } => finite_time(time),
        }
    }
}

/// The tone output graph consumed by the synthesis unit.
pub trait ToneGraph {
    fn create_tone(&mut self, waveform: Waveform, frequency: f64) -> Result<NodeId, GraphError>;
    fn create_envelope(&mut self) -> Result<NodeId, GraphError>;
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError>;
    fn start(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError>;
    fn stop(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError>;
    fn set_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError>;
    fn exponential_ramp_to_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError>;
}

#[derive(Debug)]
enum GraphNode {
    Destination,
    Tone(Oscillator),
    Envelope { env: GainEnvelope, fed: bool },
}

// Where a tone's signal ends up
#[derive(Debug, Clone, Copy)]
enum Route {
    Direct,
    Through(NodeIndex),
}

/// Applies [`GraphOp`]s and renders every live voice, frame by frame.
pub struct VoiceRenderer {
    graph: StableDiGraph<GraphNode, ()>,
    index: HashMap<NodeId, NodeIndex>,
    destination: NodeIndex,
    next_id: u64,
    sample_rate: f64,
    frames_rendered: u64,
    // Scratch space reused across blocks
    mix: Vec<f64>,
    tones: Vec<(NodeIndex, NodeId)>,
    routes: Vec<Route>,
}

impl VoiceRenderer {
    pub fn new(sample_rate: u32) -> Self {
        let mut graph = StableDiGraph::new();
        let destination = graph.add_node(GraphNode::Destination);
        let mut index = HashMap::new();
        index.insert(DESTINATION, destination);
        Self {
            graph,
            index,
            destination,
            next_id: DESTINATION.0 + 1,
            sample_rate: sample_rate as f64,
            frames_rendered: 0,
            mix: Vec::new(),
            tones: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Renderer time in seconds: the start of the next block.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate
    }

    /// Number of tone nodes still held by the graph.
    pub fn tone_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|n| matches!(n, GraphNode::Tone(_)))
            .count()
    }

    pub fn envelope_count(&self) -> usize {
        self.graph
            .node_weights()
            .filter(|n| matches!(n, GraphNode::Envelope { .. }))
            .count()
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn lookup(&self, id: NodeId) -> Result<NodeIndex, GraphError> {
        self.index.get(&id).copied().ok_or(GraphError::UnknownNode(id))
    }

    fn insert(&mut self, id: NodeId, node: GraphNode) -> Result<(), GraphError> {
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let ix = self.graph.add_node(node);
        self.index.insert(id, ix);
        // Keep locally allocated ids clear of ids chosen by a remote producer
        self.next_id = self.next_id.max(id.0 + 1);
        Ok(())
    }

    fn tone_mut(&mut self, id: NodeId) -> Result<&mut Oscillator, GraphError> {
        let ix = self.lookup(id)?;
        match self.graph.node_weight_mut(ix) {
            Some(GraphNode::Tone(osc)) => Ok(osc),
            _ => Err(GraphError::NotATone(id)),
        }
    }

    fn envelope_mut(&mut self, id: NodeId) -> Result<&mut GainEnvelope, GraphError> {
        let ix = self.lookup(id)?;
        match self.graph.node_weight_mut(ix) {
            Some(GraphNode::Envelope { env, .. }) => Ok(env),
            _ => Err(GraphError::NotAnEnvelope(id)),
        }
    }

    pub fn apply(&mut self, op: GraphOp) -> Result<(), GraphError> {
        op.check()?;
        match op {
            GraphOp::CreateTone { id, waveform, frequency } => {
                self.insert(id, GraphNode::Tone(Oscillator::new(waveform, frequency)))
            }
            GraphOp::CreateEnvelope { id } => self.insert(
                id,
                GraphNode::Envelope { env: GainEnvelope::new(), fed: false },
            ),
            GraphOp::Connect { from, to } => self.connect_nodes(from, to),
            GraphOp::SetValueAtTime { envelope, value, time } => {
                self.envelope_mut(envelope)?.set_value_at_time(value, time);
                Ok(())
            }
            GraphOp::ExponentialRampToValueAtTime { envelope, value, time } => {
                self.envelope_mut(envelope)?.exponential_ramp_to_value_at_time(value, time);
                Ok(())
            }
            GraphOp::Start { tone, time } => {
                let osc = self.tone_mut(tone)?;
                if osc.start_time.is_some() {
                    return Err(GraphError::AlreadyStarted(tone));
                }
                osc.start_time = Some(time);
                Ok(())
            }
            GraphOp::Stop { tone, time } => {
                self.tone_mut(tone)?.stop_time = Some(time);
                Ok(())
            }
        }
    }

    fn connect_nodes(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let from_ix = self.lookup(from)?;
        let to_ix = self.lookup(to)?;
        let allowed = match (self.graph.node_weight(from_ix), self.graph.node_weight(to_ix)) {
            (Some(GraphNode::Tone(_)), Some(GraphNode::Envelope { .. })) => true,
            (Some(GraphNode::Tone(_)), Some(GraphNode::Destination)) => true,
            (Some(GraphNode::Envelope { .. }), Some(GraphNode::Destination)) => true,
            _ => false,
        };
        if !allowed {
            return Err(GraphError::InvalidConnection { from, to });
        }
        if self.graph.find_edge(from_ix, to_ix).is_none() {
            self.graph.add_edge(from_ix, to_ix, ());
        }
        if let Some(GraphNode::Envelope { fed, .. }) = self.graph.node_weight_mut(to_ix) {
            *fed = true;
        }
        Ok(())
    }

    /// Render the next block into `out` (interleaved, `channels` wide). Every
    /// channel receives the same mono mix.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let frames = out.len() / channels;
        self.mix.clear();
        self.mix.resize(frames, 0.0);

        self.tones.clear();
        for (id, &ix) in &self.index {
            if let Some(GraphNode::Tone(_)) = self.graph.node_weight(ix) {
                self.tones.push((ix, *id));
            }
        }

        let sr = self.sample_rate;
        let base = self.frames_rendered;
        for t_idx in 0..self.tones.len() {
            let (tone_ix, _) = self.tones[t_idx];
            self.collect_routes(tone_ix);
            if self.routes.is_empty() {
                continue;
            }

            for frame in 0..frames {
                let time = (base + frame as u64) as f64 / sr;
                let mut gain = 0.0;
                for route in &self.routes {
                    gain += match *route {
                        Route::Direct => 1.0,
                        Route::Through(env_ix) => match self.graph.node_weight(env_ix) {
                            Some(GraphNode::Envelope { env, .. }) => env.value_at(time),
                            _ => 0.0,
                        },
                    };
                }
                if let Some(GraphNode::Tone(osc)) = self.graph.node_weight_mut(tone_ix) {
                    self.mix[frame] += osc.tick(time, sr) * gain;
                }
            }
        }

        for (frame, chunk) in out.chunks_mut(channels).enumerate() {
            let value = self.mix.get(frame).copied().unwrap_or(0.0) as f32;
            chunk.fill(value);
        }

        self.frames_rendered += frames as u64;
        self.collect_garbage();
    }

    fn collect_routes(&mut self, tone_ix: NodeIndex) {
        self.routes.clear();
        for target in self.graph.neighbors_directed(tone_ix, Direction::Outgoing) {
            match self.graph.node_weight(target) {
                Some(GraphNode::Destination) => self.routes.push(Route::Direct),
                Some(GraphNode::Envelope { .. }) => {
                    if self.graph.find_edge(target, self.destination).is_some() {
                        self.routes.push(Route::Through(target));
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_garbage(&mut self) {
        let now = self.current_time();
        let mut finished = Vec::new();
        for (id, &ix) in &self.index {
            if let Some(GraphNode::Tone(osc)) = self.graph.node_weight(ix) {
                if osc.is_finished_at(now) {
                    finished.push(*id);
                }
            }
        }
        for id in finished {
            if let Some(ix) = self.index.remove(&id) {
                self.graph.remove_node(ix);
            }
        }

        let mut orphaned = Vec::new();
        for (id, &ix) in &self.index {
            if let Some(GraphNode::Envelope { fed: true, .. }) = self.graph.node_weight(ix) {
                if self.graph.neighbors_directed(ix, Direction::Incoming).next().is_none() {
                    orphaned.push(*id);
                }
            }
        }
        for id in orphaned {
            if let Some(ix) = self.index.remove(&id) {
                self.graph.remove_node(ix);
            }
        }
    }
}

impl ToneGraph for VoiceRenderer {
    fn create_tone(&mut self, waveform: Waveform, frequency: f64) -> Result<NodeId, GraphError> {
        let id = self.allocate_id();
        self.apply(GraphOp::CreateTone { id, waveform, frequency })?;
        Ok(id)
    }

    fn create_envelope(&mut self) -> Result<NodeId, GraphError> {
        let id = self.allocate_id();
        self.apply(GraphOp::CreateEnvelope { id })?;
        Ok(id)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.apply(GraphOp::Connect { from, to })
    }

    fn start(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::Start { tone, time })
    }

    fn stop(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::Stop { tone, time })
    }

    fn set_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::SetValueAtTime { envelope, value, time })
    }

    fn exponential_ramp_to_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError> {
        self.apply(GraphOp::ExponentialRampToValueAtTime { envelope, value, time })
    }
}

/// Control-side graph that forwards ops to a renderer living on the audio
/// thread. Structural errors (unknown ids etc.) surface there, not here.
pub struct StreamGraph {
    tx: Sender<GraphOp>,
    next_id: u64,
}

impl StreamGraph {
    pub fn new(tx: Sender<GraphOp>) -> Self {
        Self { tx, next_id: DESTINATION.0 + 1 }
    }

    fn send(&self, op: GraphOp) -> Result<(), GraphError> {
        op.check()?;
        self.tx.send(op).map_err(|_| GraphError::OutputClosed)
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl ToneGraph for StreamGraph {
    fn create_tone(&mut self, waveform: Waveform, frequency: f64) -> Result<NodeId, GraphError> {
        let id = self.allocate_id();
        self.send(GraphOp::CreateTone { id, waveform, frequency })?;
        Ok(id)
    }

    fn create_envelope(&mut self) -> Result<NodeId, GraphError> {
        let id = self.allocate_id();
        self.send(GraphOp::CreateEnvelope { id })?;
        Ok(id)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.send(GraphOp::Connect { from, to })
    }

    fn start(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError> {
        self.send(GraphOp::Start { tone, time })
    }

    fn stop(&mut self, tone: NodeId, time: f64) -> Result<(), GraphError> {
        self.send(GraphOp::Stop { tone, time })
    }

    fn set_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError> {
        self.send(GraphOp::SetValueAtTime { envelope, value, time })
    }

    fn exponential_ramp_to_value_at_time(&mut self, envelope: NodeId, value: f64, time: f64) -> Result<(), GraphError> {
        self.send(GraphOp::ExponentialRampToValueAtTime { envelope, value, time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn click(r: &mut VoiceRenderer, start: f64, decay: f64) -> (NodeId, NodeId) {
        let tone = r.create_tone(Waveform::Square, 1000.0).unwrap();
        let env = r.create_envelope().unwrap();
        r.set_value_at_time(env, 1.0, start).unwrap();
        r.exponential_ramp_to_value_at_time(env, 0.001, start + decay).unwrap();
        r.connect(tone, env).unwrap();
        r.connect(env, DESTINATION).unwrap();
        r.start(tone, start).unwrap();
        r.stop(tone, start + decay).unwrap();
        (tone, env)
    }

    #[test]
    fn test_click_renders_then_goes_silent() {
        let mut r = VoiceRenderer::new(8000);
        click(&mut r, 0.0, 0.01);

        let mut out = vec![0.0f32; 160];
        r.render(&mut out, 1);

        // Square starts high at full volume
        assert_eq!(out[0], 1.0);
        // 0.01s at 8 kHz = 80 frames of sound
        assert!(out[..80].iter().any(|s| s.abs() > 0.0));
        assert!(out[80..].iter().all(|&s| s == 0.0));
        // Decaying: late samples quieter than early ones
        assert!(out[70].abs() < out[2].abs());
    }

    #[test]
    fn test_finished_voices_are_reclaimed() {
        let mut r = VoiceRenderer::new(8000);
        click(&mut r, 0.0, 0.01);
        click(&mut r, 0.5, 0.01);
        assert_eq!(r.tone_count(), 2);
        assert_eq!(r.envelope_count(), 2);

        let mut out = vec![0.0f32; 800];
        r.render(&mut out, 1);
        assert_eq!(r.tone_count(), 1);
        assert_eq!(r.envelope_count(), 1);

        let mut out = vec![0.0f32; 8000];
        r.render(&mut out, 1);
        assert_eq!(r.tone_count(), 0);
        assert_eq!(r.envelope_count(), 0);
    }

    #[test]
    fn test_unconnected_tone_is_silent() {
        let mut r = VoiceRenderer::new(8000);
        let tone = r.create_tone(Waveform::Sine, 440.0).unwrap();
        r.start(tone, 0.0).unwrap();
        let mut out = vec![0.0f32; 64];
        r.render(&mut out, 1);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_stereo_output_duplicates_mix() {
        let mut r = VoiceRenderer::new(8000);
        let tone = r.create_tone(Waveform::Square, 1000.0).unwrap();
        r.connect(tone, DESTINATION).unwrap();
        r.start(tone, 0.0).unwrap();
        let mut out = vec![0.0f32; 32];
        r.render(&mut out, 2);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert_eq!(r.frames_rendered(), 16);
    }

    #[test]
    fn test_invalid_operations() {
        let mut r = VoiceRenderer::new(8000);
        let tone = r.create_tone(Waveform::Sine, 440.0).unwrap();
        let env = r.create_envelope().unwrap();

        assert_eq!(
            r.exponential_ramp_to_value_at_time(env, 0.0, 1.0),
            Err(GraphError::InvalidRampTarget(0.0))
        );
        assert_eq!(r.start(env, 0.0), Err(GraphError::NotATone(env)));
        assert_eq!(r.set_value_at_time(tone, 1.0, 0.0), Err(GraphError::NotAnEnvelope(tone)));
        assert_eq!(
            r.connect(DESTINATION, tone),
            Err(GraphError::InvalidConnection { from: DESTINATION, to: tone })
        );
        assert_eq!(r.start(NodeId(999), 0.0), Err(GraphError::UnknownNode(NodeId(999))));
        assert!(matches!(r.stop(tone, f64::NAN), Err(GraphError::InvalidTime(t)) if t.is_nan()));

        r.start(tone, 0.0).unwrap();
        assert_eq!(r.start(tone, 1.0), Err(GraphError::AlreadyStarted(tone)));
    }

    #[test]
    fn test_stream_graph_forwards_ops() {
        let (tx, rx) = unbounded();
        let mut g = StreamGraph::new(tx);
        let tone = g.create_tone(Waveform::Triangle, 880.0).unwrap();
        g.start(tone, 1.0).unwrap();

        let ops: Vec<GraphOp> = rx.try_iter().collect();
        assert_eq!(
            ops,
            vec![
                GraphOp::CreateTone { id: NodeId(1), waveform: Waveform::Triangle, frequency: 880.0 },
                GraphOp::Start { tone: NodeId(1), time: 1.0 },
            ]
        );

        let mut r = VoiceRenderer::new(8000);
        for op in ops {
            r.apply(op).unwrap();
        }
        assert_eq!(r.tone_count(), 1);
    }

    #[test]
    fn test_stream_graph_closed_output() {
        let (tx, rx) = unbounded();
        let mut g = StreamGraph::new(tx);
        drop(rx);
        assert_eq!(g.create_envelope(), Err(GraphError::OutputClosed));
        // Value checks still run before the send
        assert_eq!(
            g.exponential_ramp_to_value_at_time(NodeId(1), -1.0, 0.0),
            Err(GraphError::InvalidRampTarget(-1.0))
        );
    }
}
