//! Bounds file content to a fixed character budget.

use tokei::LanguageType;

/// Appended when content had to be cut at the character budget.
pub const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Budget and excerpt shape for trimmed content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimLimits {
    /// Hard character budget for the returned text.
    pub max_chars: usize,
    /// Lines kept from the start of the file.
    pub head_lines: usize,
    /// Upper bound on lines sampled from the middle.
    pub middle_lines: usize,
    /// Lines kept from the end of the file.
    pub tail_lines: usize,
}

impl Default for TrimLimits {
    fn default() -> Self {
        Self {
            max_chars: 4000,
            head_lines: 30,
            middle_lines: 30,
            tail_lines: 20,
        }
    }
}

/// Comment delimiters used to annotate elided regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentStyle {
    Line(&'static str),
    Block(&'static str, &'static str),
}

impl CommentStyle {
    fn for_extension(extension: &str) -> Self {
        let Some(language) = LanguageType::from_file_extension(extension) else {
            return Self::Line("//");
        };
        if let Some(prefix) = language.line_comments().first() {
            return Self::Line(*prefix);
        }
        if let Some(&(open, close)) = language.multi_line_comments().first() {
            return Self::Block(open, close);
        }
        Self::Line("//")
    }

    fn wrap(self, text: &str) -> String {
        match self {
            Self::Line(prefix) => format!("{prefix} {text}"),
            Self::Block(open, close) => format!("{open} {text} {close}"),
        }
    }
}

/// Return `content` unchanged when it fits `limits.max_chars`, otherwise a
/// head / sampled-middle / tail excerpt annotated in the file's comment syntax.
///
/// The result never exceeds `max_chars` plus [`TRUNCATION_MARKER`].
pub fn trim_content(content: &str, extension: &str, limits: &TrimLimits) -> String {
    if content.chars().count() <= limits.max_chars {
        return content.to_string();
    }

    let style = CommentStyle::for_extension(extension);
    let lines: Vec<&str> = content.lines().collect();
    let excerpt = if lines.len() > limits.head_lines + limits.tail_lines {
        structural_excerpt(&lines, style, limits)
    } else {
        content.to_string()
    };

    hard_truncate(excerpt, limits.max_chars)
}

fn structural_excerpt(lines: &[&str], style: CommentStyle, limits: &TrimLimits) -> String {
    let tail_start = lines.len() - limits.tail_lines;
    let head = &lines[..limits.head_lines];
    let middle = &lines[limits.head_lines..tail_start];
    let tail = &lines[tail_start..];

    let sampled = stride_sample(middle, limits.middle_lines);

    let mut out: Vec<String> = Vec::with_capacity(head.len() + sampled.len() + tail.len() + 2);
    out.extend(head.iter().map(|line| line.to_string()));
    out.push(style.wrap(&format!(
        "... trimmed: {} of {} middle lines shown ...",
        sampled.len(),
        middle.len()
    )));
    out.extend(sampled.into_iter().map(str::to_string));
    out.push(style.wrap("... trimmed ..."));
    out.extend(tail.iter().map(|line| line.to_string()));
    out.join("\n")
}

/// Evenly spaced lines from `lines`, at most `budget` of them.
fn stride_sample<'a>(lines: &[&'a str], budget: usize) -> Vec<&'a str> {
    if budget == 0 {
        return Vec::new();
    }
    if lines.len() <= budget {
        return lines.to_vec();
    }
    let stride = lines.len().div_ceil(budget);
    lines.iter().step_by(stride).take(budget).copied().collect()
}

fn hard_truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text,
        Some((cut, _)) => {
            let mut truncated = text[..cut].to_string();
            truncated.push_str(TRUNCATION_MARKER);
            truncated
        }
    }
}
