//! Storage path templating.
//!
//! Converts an [`Asset`] and its owner into the canonical, library-relative
//! path the asset's original file should live at, using a user-configured
//! [upon] template. The template syntax follows upon's Mustache-like
//! conventions (`{{ variable }}`, `{{ value|formatter }}`), extended with:
//!
//! - **`slug`**: converts strings to URL-safe slugs, stripping quotation marks
//!   first to avoid artifacts like leading/trailing hyphens.
//! - **`truncate`**: truncates strings to a maximum byte length at a character
//!   boundary, usable as either `truncate(value, n)` or `{{ value|truncate: n }}`.
//!
//! The rendered template only decides the middle of the path. The full path
//! is always `{library folder}/{owner}/{rendered}.{ext}`, where the owner
//! segment is the owner's storage label (or ID) and the extension is taken
//! from the asset's current path.
//!
//! # Template Variables
//!
//! | Variable       | Example      | Description                                  |
//! |----------------|--------------|----------------------------------------------|
//! | `filename`     | `IMG_0001`   | Upload name (or current name) without extension |
//! | `ext`          | `jpg`        | Extension of the current path                |
//! | `filetype`     | `IMG`        | Short media type                             |
//! | `filetypefull` | `IMAGE`      | Full media type                              |
//! | `assetId`      | `a1b2...`    | Asset ID                                     |
//! | `owner`        | `user-id`    | Storage label, or owner ID without one       |
//! | `date`         | `2023-02-23` | Capture date                                 |
//! | `y` / `yy`     | `2023` / `23`| Year                                         |
//! | `M` / `MM`     | `2` / `02`   | Month number                                 |
//! | `MMM` / `MMMM` | `Feb` / `February` | Month name                             |
//! | `d` / `dd`     | `3` / `03`   | Day of month                                 |
//! | `H` / `HH`     | `9` / `09`   | Hour (24-hour clock)                         |
//! | `h` / `hh`     | `9` / `09`   | Hour (12-hour clock)                         |
//! | `m` / `mm`     | `5` / `05`   | Minute                                       |
//! | `s` / `ss`     | `7` / `07`   | Second                                       |
//!
//! Dates use the offset the asset was captured in.
//!
//! # Example
//!
//! ```
//! use stowage_catalog::models::{Asset, User};
//! use stowage_library::PathGenerator;
//! use time::macros::datetime;
//!
//! let generator: PathGenerator = "{{ y }}/{{ MMMM }}/{{ filename|slug }}".parse().unwrap();
//! let asset = Asset::new("asset-id", "user-id", "upload/IMG 0001.JPG", datetime!(2023-02-23 12:00 UTC));
//! let path = generator.render(&asset, &User::new("user-id")).unwrap();
//! assert_eq!(path.to_string(), "upload/library/user-id/2023/February/img-0001.JPG");
//! ```

use crate::error::{Error, ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use std::fmt;
use std::str::FromStr;
use stowage_catalog::models::{Asset, User};
use stowage_config::{DEFAULT_LIBRARY_FOLDER, TemplateConfig};
use stowage_storage::{split_extension, validate_path};
use time::OffsetDateTime;
use tracing::instrument;
use upon::{Engine, Template};

/// A canonical path split around the place a disambiguation suffix goes.
///
/// The suffix scheme is `base+N.ext`; suffix `0` means no suffix at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPath {
    base: String,
    ext: Option<String>,
}
impl RenderedPath {
    pub fn new(base: impl Into<String>, ext: Option<impl Into<String>>) -> Self {
        Self { base: base.into(), ext: ext.map(Into::into) }
    }

    /// Everything before the suffix and extension.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn ext(&self) -> Option<&str> {
        self.ext.as_deref()
    }

    /// The path carrying disambiguation suffix `n`.
    ///
    /// ```
    /// use stowage_library::RenderedPath;
    ///
    /// let path = RenderedPath::new("upload/library/user-id/asset-id", Some("jpg"));
    /// assert_eq!(path.with_suffix(0), "upload/library/user-id/asset-id.jpg");
    /// assert_eq!(path.with_suffix(2), "upload/library/user-id/asset-id+2.jpg");
    /// ```
    pub fn with_suffix(&self, n: u32) -> String {
        let suffix = if n == 0 { String::new() } else { format!("+{n}") };
        match &self.ext {
            Some(ext) => format!("{}{suffix}.{ext}", self.base),
            None => format!("{}{suffix}", self.base),
        }
    }

    /// The suffix `path` carries if it is exactly this path with a
    /// disambiguation suffix applied (`Some(0)` for the bare path), as
    /// produced by [`with_suffix`](Self::with_suffix).
    ///
    /// `path` is compared in the normalized form storage uses, so
    /// `/upload/..` and `./upload/..` match `upload/..`.
    pub fn suffix_of(&self, path: &str) -> Option<u32> {
        let path = validate_path(path).ok()?;
        let rest = path.to_str()?.strip_prefix(self.base.as_str())?;
        let rest = match &self.ext {
            Some(ext) => rest.strip_suffix(ext.as_str())?.strip_suffix('.')?,
            None => rest,
        };
        if rest.is_empty() {
            return Some(0);
        }
        let digits = rest.strip_prefix('+')?;
        let n: u32 = digits.parse().ok()?;
        // Only the canonical spelling: no `+0`, `+01` or `++1`.
        (n > 0 && digits == n.to_string()).then_some(n)
    }
}
impl fmt::Display for RenderedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.with_suffix(0))
    }
}

/// Generates deterministic storage paths from asset metadata and a
/// user-defined template string.
///
/// The template is compiled once at construction and rendered against a
/// sample asset, so syntax errors and unknown variables surface at creation
/// time as [`ErrorKind::Configuration`] rather than halfway through a run.
pub struct PathGenerator {
    engine: Engine<'static>,
    template: Template<'static>,
    library_folder: String,
}
impl FromStr for PathGenerator {
    type Err = Error;

    /// Compiles the template with the default library folder.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s, DEFAULT_LIBRARY_FOLDER)
    }
}
impl PathGenerator {
    pub fn new(template: impl AsRef<str>, library_folder: impl AsRef<str>) -> Result<Self> {
        let generator = Self::compile(template.as_ref(), library_folder.as_ref())?;
        let (asset, owner) = sample();
        generator.render(&asset, &owner).or_raise(|| ErrorKind::Configuration)?;
        Ok(generator)
    }

    /// Builds a generator for the active template of `config`.
    pub fn from_config(config: &TemplateConfig) -> Result<Self> {
        Self::new(config.active(), &config.library_folder)
    }

    /// Compiles without the sample render.
    pub(crate) fn compile(template: &str, library_folder: &str) -> Result<Self> {
        let mut engine = Engine::new();
        addons::configure(&mut engine);
        let template = engine.compile(template.to_string()).or_raise(|| ErrorKind::Configuration)?;
        let library_folder = Self::normalize(library_folder, || ErrorKind::Configuration)?;
        Ok(Self { engine, template, library_folder })
    }

    /// Renders the canonical path of `asset`, owned by `owner`.
    ///
    /// The owner segment and filename are sanitized so they always stay a
    /// single path segment. A template that can't be rendered at all is a
    /// configuration error; one that renders to nothing, or to a path climbing
    /// out of the owner's folder, for this asset only fails the asset with
    /// [`ErrorKind::InvalidRenderedPath`].
    #[instrument(skip_all, fields(asset = %asset.id))]
    pub fn render(&self, asset: &Asset, owner: &User) -> Result<RenderedPath> {
        let owner_segment = sanitize(owner.storage_label.as_deref().unwrap_or(owner.id.as_str()));
        let ext = split_extension(&asset.original_path).1;
        let rendered = self
            .template
            .render(&self.engine, Self::parameters(asset, &owner_segment, ext))
            .to_string()
            .or_raise(|| ErrorKind::Configuration)?;
        let rendered = Self::normalize(&rendered, || ErrorKind::InvalidRenderedPath(asset.id.clone()))?;
        Ok(RenderedPath::new(format!("{}/{owner_segment}/{rendered}", self.library_folder), ext))
    }

    /// Trims each path segment, joins them with `/`, then validates via
    /// [`stowage_storage::validate_path`].
    fn normalize(s: &str, invalid: impl Fn() -> ErrorKind) -> Result<String> {
        let path = s.trim().split('/').map(str::trim).collect::<Vec<_>>().join("/");
        validate_path(&path)
            .or_raise(&invalid)?
            .to_str()
            .map(str::to_string)
            // Infallible: input was a String. Here for completeness.
            .ok_or_raise(invalid)
    }

    /// Builds the [`upon::Value`] map exposed to the template engine.
    fn parameters(asset: &Asset, owner: &str, ext: Option<&str>) -> upon::Value {
        let created = asset.file_created_at;
        let month = created.month();
        let hour12 = match created.hour() % 12 {
            0 => 12,
            h => h,
        };
        upon::value! {
            filename: sanitize(&filename(asset)),
            ext: ext.unwrap_or_default(),
            filetype: asset.kind.short_str(),
            filetypefull: asset.kind.to_string(),
            assetId: asset.id.as_str(),
            owner: owner,
            date: format!("{:04}-{:02}-{:02}", created.year(), u8::from(month), created.day()),
            y: format!("{:04}", created.year()),
            yy: format!("{:02}", created.year().rem_euclid(100)),
            M: u8::from(month).to_string(),
            MM: format!("{:02}", u8::from(month)),
            MMM: month.to_string().chars().take(3).collect::<String>(),
            MMMM: month.to_string(),
            d: created.day().to_string(),
            dd: format!("{:02}", created.day()),
            H: created.hour().to_string(),
            HH: format!("{:02}", created.hour()),
            h: hour12.to_string(),
            hh: format!("{hour12:02}"),
            m: created.minute().to_string(),
            mm: format!("{:02}", created.minute()),
            s: created.second().to_string(),
            ss: format!("{:02}", created.second()),
        }
    }
}

/// Upload name without its extension, falling back to the current file name.
fn filename(asset: &Asset) -> String {
    let name = asset.original_file_name.as_deref().filter(|n| !n.trim().is_empty()).unwrap_or(&asset.original_path);
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    split_extension(name).0.to_string()
}

/// Keeps a value to a single, non-special path segment.
fn sanitize(segment: &str) -> String {
    let cleaned: String =
        segment.trim().chars().map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c }).collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

fn sample() -> (Asset, User) {
    let asset = Asset::new("sample-asset", "sample-user", "upload/sample.jpg", OffsetDateTime::UNIX_EPOCH)
        .with_original_file_name("sample.jpg");
    (asset, User::new("sample-user"))
}

/// Custom [`upon`] extensions for path-safe string manipulation.
mod addons {
    use rslug::slugify;
    use std::fmt::Write;
    use upon::{Engine, Value, fmt as upon_fmt};

    /// Strips quotation marks before slugifying to avoid awkward slug output
    /// like `"hello"` becoming `-hello-`.
    fn slug_formatter(f: &mut upon_fmt::Formatter<'_>, value: &Value) -> upon_fmt::Result {
        match value {
            Value::String(s) => {
                let marks = [
                    '\u{0027}', '\u{0022}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{201E}', '\u{201B}',
                    '\u{0060}', '\u{00AB}', '\u{00BB}', '\u{2039}', '\u{203A}',
                ];
                let stripped: String = s.chars().filter(|c| !marks.contains(c)).collect();
                write!(f, "{}", slugify!(&stripped))?
            },
            v => upon_fmt::default(f, v)?,
        };
        Ok(())
    }

    fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> String {
        s[..s.floor_char_boundary(max_bytes)].to_string()
    }

    pub(crate) fn configure(engine: &mut Engine<'_>) {
        engine.add_formatter("slug", slug_formatter);
        engine.add_function("truncate", truncate_to_char_boundary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use stowage_catalog::models::AssetKind;
    use time::macros::datetime;

    fn make_test_asset() -> Asset {
        Asset::new("asset-id", "user-id", "/original/asset-id.jpg", datetime!(2023-02-03 14:05:09 UTC))
    }

    #[test]
    fn test_default_template() {
        let generator = PathGenerator::from_config(&TemplateConfig::default()).unwrap();
        let path = generator.render(&make_test_asset(), &User::new("user-id")).unwrap();
        assert_eq!(path.to_string(), "upload/library/user-id/2023/2023-02-03/asset-id.jpg");
        assert_eq!(path.base(), "upload/library/user-id/2023/2023-02-03/asset-id");
        assert_eq!(path.ext(), Some("jpg"));
    }

    #[test]
    fn test_storage_label_replaces_owner_id() {
        let generator: PathGenerator = "{{ y }}/{{ filename }}".parse().unwrap();
        let owner = User::new("user-id").with_storage_label("label-1");
        let path = generator.render(&make_test_asset(), &owner).unwrap();
        assert_eq!(path.to_string(), "upload/library/label-1/2023/asset-id.jpg");
    }

    #[test]
    fn test_upload_name_is_used_with_current_extension() {
        let generator: PathGenerator = "{{ filename }}".parse().unwrap();
        let asset = make_test_asset().with_original_file_name("IMG_0001.HEIC");
        let path = generator.render(&asset, &User::new("user-id")).unwrap();
        assert_eq!(path.to_string(), "upload/library/user-id/IMG_0001.jpg");
    }

    #[test]
    fn test_no_extension() {
        let generator: PathGenerator = "{{ filename }}".parse().unwrap();
        let asset = Asset::new("asset-id", "user-id", "upload/README", datetime!(2023-02-03 0:00 UTC));
        let path = generator.render(&asset, &User::new("user-id")).unwrap();
        assert_eq!(path.to_string(), "upload/library/user-id/README");
        assert_eq!(path.with_suffix(1), "upload/library/user-id/README+1");
    }

    #[rstest]
    #[case("{{ yy }}", "23")]
    #[case("{{ M }}", "2")]
    #[case("{{ MM }}", "02")]
    #[case("{{ MMM }}", "Feb")]
    #[case("{{ MMMM }}", "February")]
    #[case("{{ d }}", "3")]
    #[case("{{ dd }}", "03")]
    #[case("{{ H }}", "14")]
    #[case("{{ HH }}", "14")]
    #[case("{{ h }}", "2")]
    #[case("{{ hh }}", "02")]
    #[case("{{ m }}", "5")]
    #[case("{{ mm }}", "05")]
    #[case("{{ s }}", "9")]
    #[case("{{ ss }}", "09")]
    #[case("{{ date }}", "2023-02-03")]
    #[case("{{ filetype }}", "VID")]
    #[case("{{ filetypefull }}", "VIDEO")]
    #[case("{{ assetId }}", "asset-id")]
    #[case("{{ owner }}", "user-id")]
    #[case("{{ ext }}", "jpg")]
    fn test_tokens(#[case] template: &str, #[case] expected: &str) {
        let generator: PathGenerator = template.parse().unwrap();
        let asset = make_test_asset().with_kind(AssetKind::Video);
        let path = generator.render(&asset, &User::new("user-id")).unwrap();
        assert_eq!(path.base(), format!("upload/library/user-id/{expected}"));
    }

    #[test]
    fn test_midnight_is_twelve_on_a_twelve_hour_clock() {
        let generator: PathGenerator = "{{ hh }}{{ HH }}".parse().unwrap();
        let asset = Asset::new("asset-id", "user-id", "a.jpg", datetime!(2023-02-03 0:30 UTC));
        assert_eq!(generator.render(&asset, &User::new("user-id")).unwrap().base(), "upload/library/user-id/1200");
    }

    #[test]
    fn test_dates_keep_capture_offset() {
        let generator: PathGenerator = "{{ date }}".parse().unwrap();
        let asset = Asset::new("asset-id", "user-id", "a.jpg", datetime!(2023-02-23 23:30 +05:30));
        assert_eq!(generator.render(&asset, &User::new("user-id")).unwrap().base(), "upload/library/user-id/2023-02-23");
    }

    #[rstest]
    #[case("{{ nonsense }}")]
    #[case("{{ y ")]
    #[case("../../{{ filename }}")]
    #[case("{{ truncate(filename, 0) }}")]
    fn test_invalid_templates_fail_at_construction(#[case] template: &str) {
        let err = template.parse::<PathGenerator>().err().unwrap();
        assert!(matches!(&*err, ErrorKind::Configuration));
    }

    #[test]
    fn test_empty_render_fails_only_the_asset() {
        let generator: PathGenerator = "{{ ext }}".parse().unwrap();
        let asset = make_test_asset().with_original_file_name("README");
        let asset = Asset { original_path: "/original/README".to_string(), ..asset };
        let err = generator.render(&asset, &User::new("user-id")).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRenderedPath(id) if id.as_str() == "asset-id"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_sanitizes_owner_and_filename() {
        let generator: PathGenerator = "{{ filename }}".parse().unwrap();
        let owner = User::new("user-id").with_storage_label("../evil");
        let asset = make_test_asset().with_original_file_name("..");
        let path = generator.render(&asset, &owner).unwrap();
        assert_eq!(path.to_string(), "upload/library/.._evil/_.jpg");
    }

    #[test]
    fn test_normalizes_segments() {
        let generator = PathGenerator::new(" {{ y }} // {{ filename }} ", "/media/").unwrap();
        let path = generator.render(&make_test_asset(), &User::new("user-id")).unwrap();
        assert_eq!(path.to_string(), "media/user-id/2023/asset-id.jpg");
    }

    #[test]
    fn test_slug_and_truncate() {
        let generator: PathGenerator = "{{ filename|slug }}/{{ truncate(filename, 5) }}".parse().unwrap();
        let asset = make_test_asset().with_original_file_name("\"Hello\" World's Day.png");
        let path = generator.render(&asset, &User::new("user-id")).unwrap();
        assert_eq!(path.base(), "upload/library/user-id/hello-worlds-day/\"Hell");
    }

    #[rstest]
    #[case("upload/library/user-id/asset-id.jpg", Some(0))]
    #[case("upload/library/user-id/asset-id+1.jpg", Some(1))]
    #[case("upload/library/user-id/asset-id+42.jpg", Some(42))]
    #[case("upload/library/user-id/asset-id+0.jpg", None)]
    #[case("upload/library/user-id/asset-id+01.jpg", None)]
    #[case("upload/library/user-id/asset-id++1.jpg", None)]
    #[case("upload/library/user-id/asset-id+1.mov", None)]
    #[case("upload/library/user-id/asset-idx.jpg", None)]
    #[case("upload/library/user-id/asset-id+.jpg", None)]
    #[case("/original/asset-id.jpg", None)]
    #[case("/upload/library/user-id/asset-id.jpg", Some(0))]
    #[case("./upload/library/user-id/asset-id+1.jpg", Some(1))]
    #[case("upload//library/user-id/./asset-id.jpg", Some(0))]
    #[case("../upload/library/user-id/asset-id.jpg", None)]
    fn test_suffix_of(#[case] path: &str, #[case] expected: Option<u32>) {
        let rendered = RenderedPath::new("upload/library/user-id/asset-id", Some("jpg"));
        assert_eq!(rendered.suffix_of(path), expected);
    }
}
