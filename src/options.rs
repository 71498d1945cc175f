//! Test run options and the two inbound message shapes
//!
//! A run is configured either by a caret-delimited string
//! (`name^mode^ping^sort^_^concurrency^timeout`) or by a JSON object.
//! Both shapes normalize into [`TestOptions`]; all clamping happens here
//! so the rest of the engine can treat options as read-only.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser::parse_links;

/// Minimum download budget for fresh runs entering through the JSON shape.
const MIN_FRESH_TIMEOUT: Duration = Duration::from_secs(8);
/// Minimum download budget for retests and caret-shaped runs.
const MIN_RETEST_TIMEOUT: Duration = Duration::from_secs(20);

// ============================================================================
// Option Types
// ============================================================================

/// Which phases a profile test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SpeedTestMode {
    SpeedOnly,
    PingOnly,
    #[default]
    All,
}

impl From<&str> for SpeedTestMode {
    fn from(value: &str) -> Self {
        match value {
            "speedonly" => SpeedTestMode::SpeedOnly,
            "pingonly" => SpeedTestMode::PingOnly,
            _ => SpeedTestMode::All,
        }
    }
}

impl From<String> for SpeedTestMode {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl From<SpeedTestMode> for String {
    fn from(mode: SpeedTestMode) -> Self {
        match mode {
            SpeedTestMode::SpeedOnly => "speedonly".to_string(),
            SpeedTestMode::PingOnly => "pingonly".to_string(),
            SpeedTestMode::All => "all".to_string(),
        }
    }
}

/// Run kind, carried on the wire as an integer (`2` fresh, `3` retest).
/// Anything else normalizes to a fresh run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TestMode {
    #[default]
    All,
    Retest,
}

impl From<i64> for TestMode {
    fn from(value: i64) -> Self {
        match value {
            3 => TestMode::Retest,
            _ => TestMode::All,
        }
    }
}

impl From<TestMode> for i64 {
    fn from(mode: TestMode) -> Self {
        match mode {
            TestMode::All => 2,
            TestMode::Retest => 3,
        }
    }
}

/// Output form of the summary image (`0` inline base64, `1` file path,
/// `2` skip rendering).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum PicMode {
    #[default]
    Base64,
    Path,
    None,
}

impl From<i64> for PicMode {
    fn from(value: i64) -> Self {
        match value {
            1 => PicMode::Path,
            2 => PicMode::None,
            _ => PicMode::Base64,
        }
    }
}

impl From<PicMode> for i64 {
    fn from(mode: PicMode) -> Self {
        match mode {
            PicMode::Base64 => 0,
            PicMode::Path => 1,
            PicMode::None => 2,
        }
    }
}

/// Configuration for one test run.
///
/// Wire field names follow the JSON message contract; missing fields take
/// their defaults and are clamped by the normalizers below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestOptions {
    #[serde(rename = "group")]
    pub group_name: String,

    #[serde(rename = "speedtestMode")]
    pub speed_test_mode: SpeedTestMode,

    /// Ping style tag, forwarded untouched to the pinger.
    #[serde(rename = "pingMethod")]
    pub ping_method: String,

    /// `speed` / `rspeed` / `ping` / `rping`, consumed by the renderer.
    #[serde(rename = "sortMethod")]
    pub sort_method: String,

    #[serde(deserialize_with = "lenient_concurrency")]
    pub concurrency: usize,

    #[serde(rename = "testMode")]
    pub test_mode: TestMode,

    /// Original indices for retests, parallel to `links`.
    #[serde(rename = "testids")]
    pub test_ids: Vec<i64>,

    /// Per-profile download ceiling, carried as integer seconds.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Explicit link list for retests.
    pub links: Vec<String>,

    /// Source blob for fresh runs, fed to ingestion.
    pub subscription: String,

    pub language: String,

    #[serde(rename = "fontSize")]
    pub font_size: u32,

    pub theme: String,

    /// Target path for `PicMode::Path` output.
    #[serde(rename = "picPath")]
    pub pic_path: String,

    #[serde(rename = "generatePicMode")]
    pub generate_pic_mode: PicMode,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            group_name: String::new(),
            speed_test_mode: SpeedTestMode::All,
            ping_method: String::new(),
            sort_method: String::new(),
            concurrency: 1,
            test_mode: TestMode::All,
            test_ids: Vec::new(),
            timeout: MIN_FRESH_TIMEOUT,
            links: Vec::new(),
            subscription: String::new(),
            language: String::new(),
            font_size: 0,
            theme: String::new(),
            pic_path: "out.png".to_string(),
            generate_pic_mode: PicMode::Base64,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    /// Negative wire values collapse to zero and are clamped upward later.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(|secs| Duration::from_secs(secs.max(0) as u64))
    }
}

/// Out-of-range wire values collapse to the minimum of one worker.
fn lenient_concurrency<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<usize, D::Error> {
    use serde::Deserialize;
    i64::deserialize(deserializer).map(|value| value.max(1) as usize)
}

// ============================================================================
// Normalizers
// ============================================================================

fn normalize_group(name: &str) -> String {
    if name.is_empty() || name == "?empty?" {
        "Default".to_string()
    } else {
        name.to_string()
    }
}

fn clamp(options: &mut TestOptions, min_timeout: Duration) {
    options.group_name = normalize_group(&options.group_name);
    if options.timeout < min_timeout {
        options.timeout = min_timeout;
    }
    if options.concurrency < 1 {
        options.concurrency = 1;
    }
}

/// The retest arrays are parallel; a length mismatch would misattribute
/// results to the wrong original indices.
fn validate_retest_ids(options: &TestOptions) -> Result<()> {
    if !options.test_ids.is_empty() && options.test_ids.len() != options.links.len() {
        return Err(Error::InvalidData);
    }
    Ok(())
}

/// Parses the caret-delimited option shape:
/// `name^mode^ping^sort^_^concurrency^timeout`. Always a fresh run.
pub fn parse_options(message: &str) -> Result<TestOptions> {
    let fields: Vec<&str> = message.split('^').collect();
    if fields.len() < 7 {
        return Err(Error::InvalidData);
    }
    let concurrency: i64 = fields[5].parse().map_err(|_| Error::InvalidData)?;
    let timeout: i64 = fields[6].parse().map_err(|_| Error::InvalidData)?;
    let mut options = TestOptions {
        group_name: fields[0].to_string(),
        speed_test_mode: fields[1].into(),
        ping_method: fields[2].to_string(),
        sort_method: fields[3].to_string(),
        concurrency: concurrency.max(1) as usize,
        test_mode: TestMode::All,
        timeout: Duration::from_secs(timeout.max(0) as u64),
        ..Default::default()
    };
    clamp(&mut options, MIN_RETEST_TIMEOUT);
    Ok(options)
}

/// Parses the JSON option shape and resolves the link list.
///
/// Retest messages carry their own links; anything else is forced to a
/// fresh run and its `subscription` field goes through ingestion.
pub async fn parse_message(message: &[u8]) -> Result<(Vec<String>, TestOptions)> {
    let mut options: TestOptions = serde_json::from_slice(message)?;
    clamp(&mut options, MIN_FRESH_TIMEOUT);
    if options.test_mode == TestMode::Retest {
        validate_retest_ids(&options)?;
        return Ok((options.links.clone(), options));
    }
    options.test_mode = TestMode::All;
    let links = parse_links(&options.subscription).await?;
    Ok((links, options))
}

/// Parses a JSON message that must already be in retest mode.
pub fn parse_retest_message(message: &[u8]) -> Result<(Vec<String>, TestOptions)> {
    let mut options: TestOptions = serde_json::from_slice(message)?;
    if options.test_mode != TestMode::Retest {
        return Err(Error::NotRetest);
    }
    clamp(&mut options, MIN_RETEST_TIMEOUT);
    validate_retest_ids(&options)?;
    Ok((options.links.clone(), options))
}
