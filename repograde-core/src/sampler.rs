//! Bounded, diversity-aware file selection.

use std::collections::HashMap;

use log::{debug, warn};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::domain::{Entry, FileSample, RepoSummary};
use crate::host::SourceHost;

/// Extensions considered worth sending to an evaluator.
pub const SAMPLEABLE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "mjs", "ts", "tsx", "go", "java", "kt", "kts", "scala", "c", "h",
    "cpp", "hpp", "cc", "cxx", "cs", "rb", "php", "swift", "m", "sh", "sql", "lua", "dart",
    "vue", "svelte", "html", "htm", "css", "scss",
];

/// Caps applied to one repository's sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLimits {
    /// Maximum number of files in the sample.
    pub max_total_files: usize,
    /// Maximum number of files sharing one extension.
    pub max_files_per_extension: usize,
}

impl Default for SampleLimits {
    fn default() -> Self {
        Self {
            max_total_files: 15,
            max_files_per_extension: 3,
        }
    }
}

/// Whether a file extension is on the allow-list.
pub fn is_sampleable(entry: &Entry) -> bool {
    if entry.is_dir() {
        return false;
    }
    entry
        .extension()
        .map(|ext| SAMPLEABLE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Chooses which walked files are evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSampler {
    limits: SampleLimits,
}

impl FileSampler {
    /// Create a sampler with the given caps.
    pub fn new(limits: SampleLimits) -> Self {
        Self { limits }
    }

    /// Pick at most `max_total_files` allowed files, at most
    /// `max_files_per_extension` per extension.
    ///
    /// Large files fill the first half of the sample; the rest is drawn
    /// uniformly from what remains.
    pub fn select<R: Rng + ?Sized>(&self, entries: Vec<Entry>, rng: &mut R) -> Vec<Entry> {
        let mut candidates: Vec<Entry> = entries.into_iter().filter(is_sampleable).collect();
        candidates.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));

        let mut picker = CappedPicker::new(self.limits);
        if candidates.len() <= self.limits.max_total_files {
            for entry in candidates {
                picker.offer(entry);
            }
            return picker.finish();
        }

        let head_len = self.limits.max_total_files / 2;
        let mut rest = Vec::new();
        for entry in candidates {
            if picker.len() < head_len {
                if let Some(rejected) = picker.offer(entry) {
                    rest.push(rejected);
                }
            } else {
                rest.push(entry);
            }
        }

        rest.shuffle(rng);
        for entry in rest {
            if picker.is_full() {
                break;
            }
            picker.offer(entry);
        }
        picker.finish()
    }
}

struct CappedPicker {
    limits: SampleLimits,
    per_extension: HashMap<String, usize>,
    picked: Vec<Entry>,
}

impl CappedPicker {
    fn new(limits: SampleLimits) -> Self {
        Self {
            limits,
            per_extension: HashMap::new(),
            picked: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.picked.len()
    }

    fn is_full(&self) -> bool {
        self.picked.len() >= self.limits.max_total_files
    }

    /// Take the entry if both caps allow it, handing it back otherwise.
    fn offer(&mut self, entry: Entry) -> Option<Entry> {
        if self.is_full() {
            return Some(entry);
        }
        let extension = entry.extension().unwrap_or_default();
        let count = self.per_extension.entry(extension).or_insert(0);
        if *count >= self.limits.max_files_per_extension {
            return Some(entry);
        }
        *count += 1;
        self.picked.push(entry);
        None
    }

    fn finish(self) -> Vec<Entry> {
        self.picked
    }
}

/// Download and decode the selected files.
///
/// Files that cannot be fetched or are not valid UTF-8 are skipped.
pub async fn fetch_samples<H: SourceHost + ?Sized>(
    host: &H,
    repo: &RepoSummary,
    selected: Vec<Entry>,
) -> Vec<FileSample> {
    let mut samples = Vec::with_capacity(selected.len());
    for entry in selected {
        let bytes = match host.get_file_content(repo, &entry.path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("skipping {} in {}: {err}", entry.path, repo.full_name());
                continue;
            }
        };
        let raw_content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => {
                warn!(
                    "skipping {} in {}: content is not valid UTF-8",
                    entry.path,
                    repo.full_name()
                );
                continue;
            }
        };
        if raw_content.trim().is_empty() {
            debug!("skipping blank file {}", entry.path);
            continue;
        }
        samples.push(FileSample {
            extension: entry.extension().unwrap_or_default(),
            path: entry.path,
            raw_content,
            size_bytes: entry.size,
        });
    }
    samples
}
