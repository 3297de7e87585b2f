/// Poem models
///
/// `RawPoemResponse` mirrors the JSON payload of the sentence endpoint;
/// `NormalizedPoem` is the flat row written to `t_poem`. The mapping between
/// them is a pure function, so calling it twice on the same response yields
/// identical rows.
///
/// # Example
///
/// ```
/// use poemcron_shared::models::poem::{NormalizedPoem, RawPoemResponse};
///
/// let body = r#"{"data":{"content":"床前明月光","origin":{"title":"静夜思","dynasty":"唐","author":"李白","content":["床前明月光，","疑是地上霜。"],"translate":null},"matchTags":[]}}"#;
/// let raw: RawPoemResponse = serde_json::from_str(body).unwrap();
/// let poem = NormalizedPoem::from(&raw);
/// assert_eq!(poem.all, "床前明月光，疑是地上霜。");
/// assert_eq!(poem.translate, "");
/// ```

use serde::{Deserialize, Deserializer};

/// Separator placed between tags
pub const TAG_SEPARATOR: &str = ", ";

/// Raw payload of the sentence endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawPoemResponse {
    /// Service status ("success" on the happy path), informational only
    #[serde(default)]
    pub status: Option<String>,

    /// Poem payload
    pub data: PoemData,
}

/// `data` object of the payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoemData {
    /// The matched line
    pub content: String,

    /// The poem the line comes from
    pub origin: PoemOrigin,

    /// Tags the service matched
    #[serde(rename = "matchTags", default)]
    pub match_tags: Vec<String>,
}

/// `data.origin` object of the payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PoemOrigin {
    pub title: String,
    pub dynasty: String,
    pub author: String,

    /// Every line of the poem
    pub content: Vec<String>,

    /// Modern translation, `null` or missing for many poems
    #[serde(default, deserialize_with = "translation")]
    pub translate: Translation,
}

/// Optional translation lines
///
/// The endpoint sends `null` (or omits the key) when no translation exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Translation {
    /// Translation lines, in order
    Present(Vec<String>),

    /// No translation available
    #[default]
    Absent,
}

impl Translation {
    /// Concatenates the lines with no separator; absent yields ""
    pub fn joined(&self) -> String {
        match self {
            Translation::Present(lines) => lines.concat(),
            Translation::Absent => String::new(),
        }
    }
}

impl From<Option<Vec<String>>> for Translation {
    fn from(lines: Option<Vec<String>>) -> Self {
        match lines {
            Some(lines) => Translation::Present(lines),
            None => Translation::Absent,
        }
    }
}

fn translation<'de, D>(deserializer: D) -> Result<Translation, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Vec<String>>::deserialize(deserializer).map(Translation::from)
}

/// Flat row written to `t_poem`
///
/// Field order matches the insert column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPoem {
    pub title: String,
    pub dynasty: String,
    pub author: String,

    /// The matched line
    pub content: String,

    /// Full poem text, lines concatenated
    pub all: String,

    /// Translation, "" when absent
    pub translate: String,

    /// Tags joined by ", "
    pub tag: String,
}

impl NormalizedPoem {
    /// Returns the seven column values in insert order
    pub fn columns(&self) -> [&str; 7] {
        [
            &self.title,
            &self.dynasty,
            &self.author,
            &self.content,
            &self.all,
            &self.translate,
            &self.tag,
        ]
    }
}

impl From<&RawPoemResponse> for NormalizedPoem {
    fn from(raw: &RawPoemResponse) -> Self {
        let data = &raw.data;
        let origin = &data.origin;

        NormalizedPoem {
            title: origin.title.clone(),
            dynasty: origin.dynasty.clone(),
            author: origin.author.clone(),
            content: data.content.clone(),
            all: origin.content.concat(),
            translate: origin.translate.joined(),
            tag: data.match_tags.join(TAG_SEPARATOR),
        }
    }
}
