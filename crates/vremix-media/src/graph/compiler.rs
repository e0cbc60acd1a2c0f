//! Compiles a transform spec and per-file parameters into an engine invocation.

use std::path::Path;
use tracing::{debug, warn};

use vremix_models::{
    EncodingConfig, OutputFormat, ResolvedJobParams, SourceInfo, TransformSpec, NEUTRAL_PERCENT,
};

use super::{format_number, GraphPlan, InputBinding, Label, LabelAllocator, Segment, StreamKind};
use crate::command::{FfmpegCommand, Invocation};
use crate::filters::FilterCatalog;
use crate::overlay::{overlay_filter, AnchorTable, CENTER_POSITION};
use crate::random::RandomSource;
use crate::tempo;

/// Silent stereo source used when an output needs audio the input lacks.
pub const SILENT_AUDIO_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=44100";

/// Default output length for looped animated sources, in seconds.
pub const DEFAULT_LOOP_SECS: f64 = 10.0;

/// Blur strength of the canvas backdrop.
pub const BACKDROP_BLUR_SIGMA: u32 = 25;

/// Result of compiling one job.
#[derive(Debug, Clone)]
pub struct CompiledJob {
    pub plan: GraphPlan,
    pub invocation: Invocation,
}

/// Builds filter graphs from injected filter and anchor tables.
#[derive(Debug, Clone)]
pub struct FilterGraphCompiler {
    catalog: FilterCatalog,
    anchors: AnchorTable,
    encoding: EncodingConfig,
    loop_secs: f64,
}

impl Default for FilterGraphCompiler {
    fn default() -> Self {
        Self::new(
            FilterCatalog::builtin(),
            AnchorTable::builtin(),
            EncodingConfig::default(),
        )
    }
}

/// Per-compile mutable state threaded through the stages.
struct Builder {
    labels: LabelAllocator,
    inputs: Vec<InputBinding>,
    segments: Vec<Segment>,
    video: Label,
    audio: Option<Label>,
}

impl Builder {
    /// Append a single-input chain and make its output the new head.
    fn chain(&mut self, head: Label, filters: Vec<String>, prefix: &str) -> Label {
        let out = self.labels.next(prefix);
        self.segments.push(Segment::chain(head, filters, out.clone()));
        out
    }

    fn video_chain(&mut self, filters: Vec<String>, prefix: &str) {
        let head = self.video.clone();
        self.video = self.chain(head, filters, prefix);
    }

    fn add_input(&mut self, binding: InputBinding) -> usize {
        self.inputs.push(binding);
        self.inputs.len() - 1
    }
}

impl FilterGraphCompiler {
    pub fn new(catalog: FilterCatalog, anchors: AnchorTable, encoding: EncodingConfig) -> Self {
        Self {
            catalog,
            anchors,
            encoding,
            loop_secs: DEFAULT_LOOP_SECS,
        }
    }

    /// Set the output length for looped animated sources.
    pub fn with_loop_secs(mut self, secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            self.loop_secs = secs;
        }
        self
    }

    pub fn catalog(&self) -> &FilterCatalog {
        &self.catalog
    }

    pub fn anchors(&self) -> &AnchorTable {
        &self.anchors
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    /// Compile one job. Never fails: unknown names are skipped and a missing
    /// overlay file is dropped, both with a warning.
    pub fn compile(
        &self,
        spec: &TransformSpec,
        params: &ResolvedJobParams,
        source: &SourceInfo,
        output: &Path,
        rng: &mut dyn RandomSource,
    ) -> CompiledJob {
        let mut b = self.bind_sources(spec, source);

        self.normalize_canvas(&mut b, spec.output_format);

        let chain = self.catalog.resolve_chain(&spec.color_filters, rng);
        if !chain.is_empty() {
            b.video_chain(chain, "color");
        }

        self.apply_zoom(&mut b, spec.output_format, params);
        self.apply_speed(&mut b, spec, params, source);

        let audio_out = b.audio.take().map(|audio| {
            let out = b.labels.named("aout");
            b.segments
                .push(Segment::chain(audio, vec!["anull".to_string()], out.clone()));
            out
        });

        self.apply_overlay(&mut b, spec);

        let video_out = b.labels.named("vout");
        let head = b.video.clone();
        b.segments.push(Segment::chain(
            head,
            vec![format!("format=pix_fmts={}", self.encoding.pixel_format)],
            video_out.clone(),
        ));

        let plan = GraphPlan {
            inputs: b.inputs,
            segments: b.segments,
            video_out,
            audio_out,
        };
        debug_assert_eq!(plan.validate(!spec.mute_audio), Ok(()));

        let invocation = self.assemble(spec, source, &plan, output);
        debug!(
            file = %source.path.display(),
            graph = %plan.filter_complex(),
            "Compiled filter graph"
        );

        CompiledJob { plan, invocation }
    }

    fn bind_sources(&self, spec: &TransformSpec, source: &SourceInfo) -> Builder {
        let path = source.path.to_string_lossy().to_string();
        let real_audio = source.has_audio && !source.is_animated_loop;

        let main = if source.is_animated_loop {
            InputBinding::stream_loop(path, vec![StreamKind::Video])
        } else if real_audio {
            InputBinding::file(path, vec![StreamKind::Video, StreamKind::Audio])
        } else {
            InputBinding::file(path, vec![StreamKind::Video])
        };

        let mut b = Builder {
            labels: LabelAllocator::new(),
            inputs: vec![main],
            segments: Vec::new(),
            video: Label::input(0, StreamKind::Video),
            audio: None,
        };

        if !spec.mute_audio {
            b.audio = Some(if real_audio {
                Label::input(0, StreamKind::Audio)
            } else {
                let index = b.add_input(InputBinding::lavfi(
                    SILENT_AUDIO_SOURCE,
                    vec![StreamKind::Audio],
                ));
                Label::input(index, StreamKind::Audio)
            });
        }

        b
    }

    fn normalize_canvas(&self, b: &mut Builder, format: OutputFormat) {
        let OutputFormat::Canvas {
            width: w,
            height: h,
            blur_background,
        } = format
        else {
            return;
        };

        if !blur_background {
            b.video_chain(
                vec![
                    format!("scale={}:{}:force_original_aspect_ratio=decrease", w, h),
                    format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2:color=black", w, h),
                ],
                "canvas",
            );
            return;
        }

        let original = b.labels.next("fgsrc");
        let copy = b.labels.next("bgsrc");
        let head = b.video.clone();
        b.segments.push(Segment::new(
            vec![head],
            vec!["split".to_string()],
            vec![original.clone(), copy.clone()],
        ));

        let backdrop = b.chain(
            copy,
            vec![
                format!("scale={}:{}:force_original_aspect_ratio=increase", w, h),
                format!("crop={w}:{h}:(in_w-{w})/2:(in_h-{h})/2", w = w, h = h),
                format!("gblur=sigma={}", BACKDROP_BLUR_SIGMA),
            ],
            "bg",
        );
        let foreground = b.chain(
            original,
            vec![format!("scale={}:{}:force_original_aspect_ratio=decrease", w, h)],
            "fg",
        );

        let out = b.labels.next("canvas");
        b.segments.push(Segment::new(
            vec![backdrop, foreground],
            vec![overlay_filter(CENTER_POSITION)],
            vec![out.clone()],
        ));
        b.video = out;
    }

    fn apply_zoom(
        &self,
        b: &mut Builder,
        format: OutputFormat,
        params: &ResolvedJobParams,
    ) {
        if !zoom_applies(params) {
            return;
        }

        let z = format_number(params.zoom_factor());
        let zoom_in = params.zoom_percent > NEUTRAL_PERCENT;

        // Without a canvas the target is the pre-zoom frame, derived from the
        // scaled frame the filter sees. Container width/height are not used:
        // the engine auto-rotates inputs, so they can be swapped.
        let (tw, th) = match format.dimensions() {
            Some((w, h)) => (w.to_string(), h.to_string()),
            None => (
                format!("trunc(iw/{}/2)*2", z),
                format!("trunc(ih/{}/2)*2", z),
            ),
        };

        let fit = if zoom_in {
            format!("crop={tw}:{th}:(in_w-out_w)/2:(in_h-out_h)/2", tw = tw, th = th)
        } else {
            format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2:color=black", tw, th)
        };

        b.video_chain(
            vec![format!("scale=iw*{z}:ih*{z}:flags=bicubic", z = z), fit],
            "zoom",
        );
    }

    fn apply_speed(
        &self,
        b: &mut Builder,
        spec: &TransformSpec,
        params: &ResolvedJobParams,
        source: &SourceInfo,
    ) {
        if params.speed_percent == NEUTRAL_PERCENT || params.speed_percent == 0 {
            return;
        }

        let factor = params.speed_factor();
        b.video_chain(vec![format!("setpts=PTS/{}", format_number(factor))], "speed");

        let real_audio = source.has_audio && !source.is_animated_loop && !spec.mute_audio;
        if !real_audio {
            return;
        }
        let filters = tempo::atempo_filters(factor);
        if filters.is_empty() {
            return;
        }
        if let Some(audio) = b.audio.take() {
            b.audio = Some(b.chain(audio, filters, "tempo"));
        }
    }

    fn apply_overlay(&self, b: &mut Builder, spec: &TransformSpec) {
        let Some(overlay) = &spec.overlay else {
            return;
        };
        if !overlay.path.exists() {
            warn!(
                overlay = %overlay.path.display(),
                "Overlay file not found, skipping overlay"
            );
            return;
        }

        let path = overlay.path.to_string_lossy().to_string();
        let binding = if overlay.is_animated() {
            InputBinding::stream_loop(path, vec![StreamKind::Video])
        } else {
            InputBinding::still_loop(path)
        };
        let index = b.add_input(binding);

        let layer = b.chain(
            Label::input(index, StreamKind::Video),
            vec!["format=rgba".to_string()],
            "ovl",
        );

        let position = self.anchors.position(&overlay.anchor);
        let out = b.labels.next("overlaid");
        let head = b.video.clone();
        b.segments.push(Segment::new(
            vec![head, layer],
            vec![overlay_filter(position)],
            vec![out.clone()],
        ));
        b.video = out;
    }

    fn assemble(
        &self,
        spec: &TransformSpec,
        source: &SourceInfo,
        plan: &GraphPlan,
        output: &Path,
    ) -> Invocation {
        let mut cmd = FfmpegCommand::new(output);
        for input in &plan.inputs {
            cmd = cmd.input_with(input.source.clone(), input.args.clone());
        }

        cmd = cmd
            .filter_complex(plan.filter_complex())
            .map(plan.video_out.to_string());

        cmd = match &plan.audio_out {
            Some(audio) => cmd
                .map(audio.to_string())
                .output_args(self.encoding.audio_args()),
            None => cmd.output_arg("-an"),
        };

        cmd = cmd.output_args(self.encoding.video_args());

        if spec.strip_metadata {
            cmd = cmd.output_args(["-map_metadata", "-1", "-map_chapters", "-1"]);
        }

        cmd = if source.is_animated_loop {
            cmd.duration(self.loop_secs)
        } else {
            cmd.output_arg("-shortest")
        };

        cmd.into_invocation(&source.path)
    }
}

fn zoom_applies(params: &ResolvedJobParams) -> bool {
    params.zoom_percent != NEUTRAL_PERCENT && params.zoom_percent != 0
}
