use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use super::options::{EmbedOptions, EmbedSize};
use crate::report::format::html_escape;

static EMBED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{F(\d+)([^}]+?)?\}").unwrap());

/// The URIs an embed needs for one stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedFile {
    /// Full-size file.
    pub best_uri: String,
    /// 160x120 thumbnail.
    pub thumb_uri: String,
}

/// Looks up files by id. Called once per rendered text with every id found.
pub trait FileResolver {
    fn resolve(&self, ids: &[u64]) -> HashMap<u64, EmbedFile>;
}

impl FileResolver for HashMap<u64, EmbedFile> {
    fn resolve(&self, ids: &[u64]) -> HashMap<u64, EmbedFile> {
        ids.iter()
            .filter_map(|id| self.get(id).map(|f| (*id, f.clone())))
            .collect()
    }
}

fn parse_id(digits: &str) -> Option<u64> {
    digits.parse::<u64>().ok().filter(|id| *id != 0)
}

/// Distinct, usable file ids referenced by `{F...}` embeds, in first-seen order.
pub fn referenced_file_ids(text: &str) -> Vec<u64> {
    let mut ids = Vec::new();
    for caps in EMBED_RE.captures_iter(text) {
        if let Some(id) = parse_id(&caps[1]) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

pub fn render_embed(file: &EmbedFile, options: &EmbedOptions) -> String {
    let image = |src: &str| {
        format!(
            r#"<img src="{}" class="remarkup-embed-image" />"#,
            html_escape(src)
        )
    };

    let embed = match options.size {
        EmbedSize::Full => image(&file.best_uri),
        EmbedSize::Thumb => format!(
            r#"<a href="{}" target="_blank">{}</a>"#,
            html_escape(&file.best_uri),
            image(&file.thumb_uri)
        ),
    };

    format!(
        r#"<div class="{}">{}</div>"#,
        html_escape(&options.layout_class()),
        embed
    )
}

/// Replace every `{F<id><options>}` whose file resolves with its rendered
/// embed. Everything else, including embeds of unknown files, is returned
/// unchanged.
pub fn apply_embed_rule(text: &str, resolver: &dyn FileResolver) -> String {
    let ids = referenced_file_ids(text);
    if ids.is_empty() {
        return text.to_string();
    }
    let files = resolver.resolve(&ids);

    EMBED_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let file = parse_id(&caps[1]).and_then(|id| files.get(&id));
            match file {
                Some(file) => {
                    let options = caps
                        .get(2)
                        .map(|m| EmbedOptions::parse(m.as_str()))
                        .unwrap_or_default();
                    render_embed(file, &options)
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
