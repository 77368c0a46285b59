use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedSize {
    #[default]
    Thumb,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedLayout {
    #[default]
    Left,
    Right,
    Center,
    Inline,
}

impl EmbedLayout {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedLayout::Left => "left",
            EmbedLayout::Right => "right",
            EmbedLayout::Center => "center",
            EmbedLayout::Inline => "inline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmbedOptions {
    pub size: EmbedSize,
    pub layout: EmbedLayout,
    pub float: bool,
}

/// Split `key=value, flag` into lowercase keys and raw values. A bare key
/// maps to `None`. Later duplicates win.
pub fn parse_simple_options(input: &str) -> HashMap<String, Option<String>> {
    input
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (key, value) = match part.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim().to_string())),
                None => (part, None),
            };
            if key.is_empty() {
                return None;
            }
            Some((key.to_ascii_lowercase(), value))
        })
        .collect()
}

fn truthy(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    }
}

impl EmbedOptions {
    /// Parse the text between the file id and the closing brace, e.g.
    /// `, size=full, layout=right, float`. Unknown keys are ignored and
    /// unrecognized values keep the default.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim_matches(|c| c == ',' || c == ' ');
        let parsed = parse_simple_options(trimmed);
        let value = |key: &str| {
            parsed
                .get(key)
                .map(|v| v.as_deref().unwrap_or("").to_ascii_lowercase())
        };

        let size = match value("size").as_deref() {
            Some("full") => EmbedSize::Full,
            _ => EmbedSize::Thumb,
        };
        let layout = match value("layout").as_deref() {
            Some("right") => EmbedLayout::Right,
            Some("center") => EmbedLayout::Center,
            Some("inline") => EmbedLayout::Inline,
            _ => EmbedLayout::Left,
        };
        let float = parsed
            .get("float")
            .map(|v| truthy(v.as_deref()))
            .unwrap_or(false);

        Self {
            size,
            layout,
            float,
        }
    }

    /// Class list for the wrapping `div`.
    pub fn layout_class(&self) -> String {
        let mut class = format!("remarkup-embed-layout-{}", self.layout.as_str());
        if self.float {
            match self.layout {
                EmbedLayout::Left => class.push_str(" remarkup-embed-float-left"),
                EmbedLayout::Right => class.push_str(" remarkup-embed-float-right"),
                EmbedLayout::Center | EmbedLayout::Inline => {}
            }
        }
        class
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(EmbedOptions::parse(""), EmbedOptions::default());
        assert_eq!(
            EmbedOptions::default().layout_class(),
            "remarkup-embed-layout-left"
        );
    }

    #[test]
    fn test_parse_all_keys() {
        let opts = EmbedOptions::parse(", size=full, layout=right, float");
        assert_eq!(
            opts,
            EmbedOptions {
                size: EmbedSize::Full,
                layout: EmbedLayout::Right,
                float: true,
            }
        );
        assert_eq!(
            opts.layout_class(),
            "remarkup-embed-layout-right remarkup-embed-float-right"
        );
    }

    #[test]
    fn test_keys_case_insensitive_and_unknown_ignored() {
        let opts = EmbedOptions::parse(" SIZE=Full, colour=blue, Layout=CENTER ");
        assert_eq!(opts.size, EmbedSize::Full);
        assert_eq!(opts.layout, EmbedLayout::Center);
        assert!(!opts.float);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let opts = EmbedOptions::parse("size=huge, layout=diagonal");
        assert_eq!(opts.size, EmbedSize::Thumb);
        assert_eq!(opts.layout, EmbedLayout::Left);
    }

    #[test]
    fn test_float_values() {
        for on in ["float", "float=1", "float=true", "float=YES", "float=on"] {
            assert!(EmbedOptions::parse(on).float, "{on}");
        }
        for off in ["float=0", "float=false", "float=no", "layout=left"] {
            assert!(!EmbedOptions::parse(off).float, "{off}");
        }
    }

    #[test]
    fn test_float_ignored_for_center_and_inline() {
        for layout in ["center", "inline"] {
            let opts = EmbedOptions::parse(&format!("layout={layout}, float"));
            assert_eq!(opts.layout_class(), format!("remarkup-embed-layout-{layout}"));
        }
        assert_eq!(
            EmbedOptions::parse("float").layout_class(),
            "remarkup-embed-layout-left remarkup-embed-float-left"
        );
    }
}
