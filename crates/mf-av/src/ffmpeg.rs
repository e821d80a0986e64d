//! ffmpeg argument builders.
//!
//! Each builder lays out the inputs, the filter graph and the stream maps of
//! one operation. The profile's output options are passed in already
//! expanded and go right before the output path.

use std::path::{Path, PathBuf};

use mf_core::{Dimension, Error, Result};
use mf_layout::PlacedShape;

#[derive(Debug, Clone, PartialEq)]
struct Input {
    options: Vec<String>,
    source: String,
}

/// A complete ffmpeg invocation, minus the program path.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegArgs {
    inputs: Vec<Input>,
    filter_complex: Option<String>,
    maps: Vec<String>,
    output_options: Vec<String>,
    output: PathBuf,
}

impl FfmpegArgs {
    fn new(output: &Path) -> Self {
        Self {
            inputs: Vec::new(),
            filter_complex: None,
            maps: Vec::new(),
            output_options: Vec::new(),
            output: output.to_path_buf(),
        }
    }

    fn input(&mut self, options: &[&str], source: impl Into<String>) -> &mut Self {
        self.inputs.push(Input {
            options: options.iter().map(|s| s.to_string()).collect(),
            source: source.into(),
        });
        self
    }

    fn file(&mut self, options: &[&str], path: &Path) -> &mut Self {
        self.input(options, path.to_string_lossy())
    }

    fn map(&mut self, spec: impl Into<String>) -> &mut Self {
        self.maps.push(spec.into());
        self
    }

    fn output_option(&mut self, opt: impl Into<String>) -> &mut Self {
        self.output_options.push(opt.into());
        self
    }

    fn profile_options(&mut self, options: Vec<String>) -> &mut Self {
        self.output_options.extend(options);
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn filter_complex(&self) -> Option<&str> {
        self.filter_complex.as_deref()
    }

    /// Flatten into an argument list.
    pub fn into_args(self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-nostdin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for input in self.inputs {
            args.extend(input.options);
            args.push("-i".into());
            args.push(input.source);
        }
        if let Some(graph) = self.filter_complex {
            args.push("-filter_complex".into());
            args.push(graph);
        }
        for map in self.maps {
            args.push("-map".into());
            args.push(map);
        }
        args.extend(self.output_options);
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Single input, profile options only.
pub fn encode(input: &Path, output: &Path, options: Vec<String>) -> FfmpegArgs {
    let mut args = FfmpegArgs::new(output);
    args.file(&[], input).profile_options(options);
    args
}

/// Picture from `video`, sound from `audio`.
pub fn mux(video: &Path, audio: &Path, output: &Path, options: Vec<String>) -> FfmpegArgs {
    let mut args = FfmpegArgs::new(output);
    args.file(&[], video)
        .file(&[], audio)
        .map("0:v:0")
        .map("1:a:0")
        .profile_options(options);
    args
}

/// One frame at `time_secs`.
pub fn still(input: &Path, time_secs: f64, output: &Path, options: Vec<String>) -> FfmpegArgs {
    let mut args = FfmpegArgs::new(output);
    let ss = format_secs(time_secs);
    args.file(&["-ss", ss.as_str()], input)
        .output_option("-frames:v")
        .output_option("1")
        .profile_options(options);
    args
}

/// Loop a still image for `duration_secs`.
pub fn image_to_video(image: &Path, duration_secs: f64, output: &Path, options: Vec<String>) -> FfmpegArgs {
    let mut args = FfmpegArgs::new(output);
    args.file(&["-loop", "1"], image)
        .output_option("-t")
        .output_option(format_secs(duration_secs))
        .profile_options(options);
    args
}

/// One composited element.
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub path: PathBuf,
    pub shape: PlacedShape,
    /// Single image rather than a moving picture.
    pub still: bool,
    pub has_audio: bool,
}

/// Lay `layers` over a solid `background` canvas, bottom to top.
///
/// The first moving layer bounds the output duration and supplies the sound.
/// With only still layers a single frame is rendered.
pub fn composite(
    canvas: Dimension,
    background: &str,
    layers: &[OverlayLayer],
    output: &Path,
    options: Vec<String>,
) -> Result<FfmpegArgs> {
    validate_color(background)?;
    if layers.is_empty() {
        return Err(Error::illegal_input("composite needs at least one layer"));
    }

    let mut args = FfmpegArgs::new(output);
    args.input(
        &["-f", "lavfi"],
        format!("color=c={background}:s={}x{}", canvas.width, canvas.height),
    );

    let lead = layers.iter().position(|l| !l.still);
    let mut graph = Vec::with_capacity(layers.len() * 2);
    let mut below = "0:v".to_string();
    for (i, layer) in layers.iter().enumerate() {
        let input = i + 1;
        if layer.still {
            args.file(&["-loop", "1"], &layer.path);
        } else {
            args.file(&[], &layer.path);
        }
        let d = layer.shape.dimension;
        let p = layer.shape.position;
        graph.push(format!("[{input}:v]scale={}:{}[l{i}]", d.width, d.height));
        let shortest = if Some(i) == lead { ":shortest=1" } else { "" };
        graph.push(format!(
            "[{below}][l{i}]overlay=x={}:y={}{shortest}[v{i}]",
            p.x, p.y
        ));
        below = format!("v{i}");
    }

    args.filter_complex = Some(graph.join(";"));
    args.map(format!("[{below}]"));
    match lead {
        Some(i) => {
            if layers[i].has_audio {
                args.map(format!("{}:a:0", i + 1));
            }
        }
        None => {
            args.output_option("-frames:v").output_option("1");
        }
    }
    args.profile_options(options);
    Ok(args)
}

/// One concatenation segment.
#[derive(Debug, Clone)]
pub struct ConcatInput {
    pub path: PathBuf,
    pub has_audio: bool,
}

/// Normalize every segment to `canvas` (letterboxed) and optionally a common
/// frame rate, then join them. Sound is kept only when every segment has it.
pub fn concat(
    canvas: Dimension,
    frame_rate: Option<f32>,
    inputs: &[ConcatInput],
    output: &Path,
    options: Vec<String>,
) -> Result<FfmpegArgs> {
    if inputs.is_empty() {
        return Err(Error::illegal_input("concat needs at least one input"));
    }
    if let Some(r) = frame_rate {
        if !(r.is_finite() && r > 0.0) {
            return Err(Error::illegal_input(format!("frame rate {r} must be positive")));
        }
    }

    let mut args = FfmpegArgs::new(output);
    let audio = inputs.iter().all(|i| i.has_audio);
    let (w, h) = (canvas.width, canvas.height);
    let mut graph = Vec::with_capacity(inputs.len() + 1);
    let mut joined = String::new();

    for (i, input) in inputs.iter().enumerate() {
        args.file(&[], &input.path);
        let fps = frame_rate.map(|r| format!(",fps={r}")).unwrap_or_default();
        graph.push(format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1{fps}[v{i}]"
        ));
        joined.push_str(&format!("[v{i}]"));
        if audio {
            joined.push_str(&format!("[{i}:a]"));
        }
    }

    let n = inputs.len();
    if audio {
        graph.push(format!("{joined}concat=n={n}:v=1:a=1[outv][outa]"));
        args.filter_complex = Some(graph.join(";"));
        args.map("[outv]").map("[outa]");
    } else {
        graph.push(format!("{joined}concat=n={n}:v=1:a=0[outv]"));
        args.filter_complex = Some(graph.join(";"));
        args.map("[outv]");
    }
    args.profile_options(options);
    Ok(args)
}

/// Accept ffmpeg color names and hex forms (`black`, `#1a1a1a`,
/// `0x000000@0.5`); reject anything that could break out of the filter graph.
pub fn validate_color(color: &str) -> Result<()> {
    let ok = !color.is_empty()
        && color.len() <= 32
        && color
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.' | '_'));
    if ok {
        Ok(())
    } else {
        Err(Error::illegal_input(format!("invalid background color '{color}'")))
    }
}

pub fn format_secs(secs: f64) -> String {
    format!("{secs:.3}")
}
