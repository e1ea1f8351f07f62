//! Post-processing: inline extracted images into the Markdown.
//!
//! Engines emit bare references like `![](images/abc.jpg)`. The response
//! replaces each one whose file was extracted with a self-contained data
//! URI, and uses the file name as alt text either way:
//!
//! ```text
//! ![](images/abc.jpg)  ──▶ ![abc.jpg](data:image/jpeg;base64,…)   (found)
//! ![](images/zzz.jpg)  ──▶ ![zzz.jpg](images/zzz.jpg)             (not found)
//! ```
//!
//! References with alt text, or outside `images/`, are left alone.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;

static RE_IMAGE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[\]\((images/.*?)\)").unwrap());

/// Rewrite `![](images/<name>)` references using `images` (file name → data URI).
pub fn embed_images(markdown: &str, images: &BTreeMap<String, String>) -> String {
    RE_IMAGE_REF
        .replace_all(markdown, |caps: &Captures| {
            let path = &caps[1];
            let name = path.rsplit('/').next().unwrap_or(path);
            match images.get(name) {
                Some(uri) => format!("![{name}]({uri})"),
                None => format!("![{name}]({path})"),
            }
        })
        .into_owned()
}
