use url::Url;

/// Resource the consumer asks a loader to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSource {
    pub url: String,
}

impl DataSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub(crate) fn has_url(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl From<&str> for DataSource {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for DataSource {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

impl From<Url> for DataSource {
    fn from(url: Url) -> Self {
        Self::new(String::from(url))
    }
}

/// Byte range hint for `open`. `to` is inclusive; `None` means to the end.
///
/// Backends that cannot fetch partially are free to ignore it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteRange {
    pub from: u64,
    pub to: Option<u64>,
}

impl ByteRange {
    pub fn new(from: u64, to: Option<u64>) -> Self {
        Self { from, to }
    }

    pub fn from_start(from: u64) -> Self {
        Self { from, to: None }
    }

    pub fn is_full(&self) -> bool {
        self.from == 0 && self.to.is_none()
    }
}

/// What a transport receives in `load_source`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub video_id: Option<String>,
    pub src: String,
    pub range: Option<ByteRange>,
}
