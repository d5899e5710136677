//! Transcript parsing and instructional classification.
//!
//! Two source formats feed the pipeline: bracketed `[HH:MM:SS] text`
//! lines and WebVTT cues. Both come out as ordered [`TranscriptLine`]s
//! with rolling-caption duplicates removed, then run through an
//! instructional classifier so greetings and closings never reach the
//! detection core.

use regex::Regex;
use tracing::debug;

use gifdoc_models::{parse_timestamp, TranscriptLine};

use crate::error::{WorkerError, WorkerResult};

/// End time given to a line whose source carries no explicit end and
/// no following line.
const DEFAULT_LINE_SECS: f64 = 4.0;

/// Classifies a transcript line's text as instructional or not.
pub type LineClassifier = dyn Fn(&str) -> bool + Send + Sync;

/// Parse transcript text in either supported format.
///
/// WebVTT is recognized by its header; anything else is treated as
/// bracketed lines. Lines come back ordered by start time with
/// `is_instructional` set by the given classifier.
pub fn parse_transcript(
    content: &str,
    classifier: &LineClassifier,
) -> WorkerResult<Vec<TranscriptLine>> {
    let mut lines = if content.trim_start().starts_with("WEBVTT") {
        parse_vtt(content)?
    } else {
        parse_bracketed(content)?
    };

    if lines.is_empty() {
        return Err(WorkerError::transcript_failed(
            "no timestamped lines found",
        ));
    }

    lines.sort_by(|a, b| {
        a.start_secs
            .partial_cmp(&b.start_secs)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    for (index, line) in lines.iter_mut().enumerate() {
        line.index = index;
        line.is_instructional = classifier(&line.text);
    }

    let instructional = lines.iter().filter(|l| l.is_instructional).count();
    debug!(
        total = lines.len(),
        instructional, "Parsed transcript"
    );

    Ok(lines)
}

/// Parse `[HH:MM:SS] text` lines. A line's end time is the next line's
/// start, capped at [`DEFAULT_LINE_SECS`] past its own start.
fn parse_bracketed(content: &str) -> WorkerResult<Vec<TranscriptLine>> {
    let pattern = Regex::new(r"^\[((?:\d{1,2}:)?\d{1,2}:\d{2}(?:\.\d+)?)\]\s*(.+)$")
        .map_err(|e| WorkerError::transcript_failed(e.to_string()))?;

    let mut parsed: Vec<(f64, String)> = Vec::new();
    for raw in content.lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let caps = match pattern.captures(raw) {
            Some(caps) => caps,
            None => continue,
        };
        let start = parse_timestamp(&caps[1])
            .map_err(|e| WorkerError::transcript_failed(format!("bad timestamp in {raw:?}: {e}")))?;
        let text = caps[2].trim().to_string();
        // Rolling captions repeat the previous line verbatim
        if parsed.last().map(|(_, t)| t.as_str()) == Some(text.as_str()) {
            continue;
        }
        parsed.push((start, text));
    }

    let ends: Vec<f64> = (0..parsed.len())
        .map(|i| {
            let start = parsed[i].0;
            match parsed.get(i + 1) {
                Some((next_start, _)) => (*next_start).min(start + DEFAULT_LINE_SECS).max(start),
                None => start + DEFAULT_LINE_SECS,
            }
        })
        .collect();

    Ok(parsed
        .into_iter()
        .zip(ends)
        .enumerate()
        .map(|(i, ((start, text), end))| TranscriptLine::new(i, start, end, text))
        .collect())
}

/// Parse WebVTT cues, stripping inline tags and deduplicating rolling
/// captions.
fn parse_vtt(content: &str) -> WorkerResult<Vec<TranscriptLine>> {
    let cue_pattern = Regex::new(
        r"((?:\d{2}:)?\d{2}:\d{2}\.\d{3})\s*-->\s*((?:\d{2}:)?\d{2}:\d{2}\.\d{3})",
    )
    .map_err(|e| WorkerError::transcript_failed(e.to_string()))?;
    let tag_pattern =
        Regex::new(r"<[^>]+>").map_err(|e| WorkerError::transcript_failed(e.to_string()))?;

    let mut lines: Vec<TranscriptLine> = Vec::new();
    let mut current: Option<(f64, f64)> = None;
    let mut last_text = String::new();

    for raw in content.lines() {
        let line = tag_pattern.replace_all(raw.trim(), "").to_string();

        if line.is_empty() || line == "WEBVTT" {
            continue;
        }

        if let Some(caps) = cue_pattern.captures(&line) {
            let start = parse_timestamp(&caps[1]).map_err(|e| {
                WorkerError::transcript_failed(format!("bad cue start {:?}: {e}", &caps[1]))
            })?;
            let end = parse_timestamp(&caps[2]).map_err(|e| {
                WorkerError::transcript_failed(format!("bad cue end {:?}: {e}", &caps[2]))
            })?;
            current = Some((start, end));
            continue;
        }

        // Cue identifiers are bare numbers
        if line.chars().all(|c| c.is_numeric()) {
            continue;
        }

        let Some((start, end)) = current else {
            continue;
        };

        if line != last_text {
            last_text = line.clone();
            lines.push(TranscriptLine::new(lines.len(), start, end, line));
        }
    }

    Ok(lines)
}

/// Default instructional classifier.
///
/// A line counts as instructional when it reads like a step: starts
/// with an action verb or carries a step marker, and is not a greeting
/// or closing.
pub fn default_classifier(text: &str) -> bool {
    const ACTION_VERBS: &[&str] = &[
        "add", "apply", "attach", "click", "close", "connect", "cut", "drag", "enter", "fill",
        "fold", "hold", "insert", "install", "mix", "move", "open", "place", "pour", "press",
        "pull", "push", "remove", "run", "save", "select", "set", "slide", "start", "stir", "tap",
        "turn", "type", "use", "wait", "wrap",
    ];
    const STEP_MARKERS: &[&str] = &["step", "first", "second", "third", "next", "then", "finally", "now"];
    const REJECTIONS: &[&str] = &[
        "welcome",
        "hello",
        "hey everyone",
        "hi everyone",
        "thanks for watching",
        "thank you for watching",
        "subscribe",
        "see you",
        "goodbye",
        "like and",
    ];

    let lowered = text.to_lowercase();
    if REJECTIONS.iter().any(|r| lowered.contains(r)) {
        return false;
    }

    let first_word = lowered
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or("");

    ACTION_VERBS.contains(&first_word) || STEP_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Keep only the instructional lines, reindexed.
pub fn instructional_lines(lines: &[TranscriptLine]) -> Vec<TranscriptLine> {
    lines
        .iter()
        .filter(|l| l.is_instructional)
        .cloned()
        .enumerate()
        .map(|(index, mut line)| {
            line.index = index;
            line
        })
        .collect()
}
