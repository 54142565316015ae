//! Job inputs
//!
//! The immutable snapshot of what a job asked for. Built once per
//! invocation from CLI flags and `INPUT_*` variables, then only read.

use crate::cli::args::RunArgs;
use crate::error::{DockhandError, DockhandResult};

/// Default cache key prefix
pub const DEFAULT_CACHE_KEY: &str = "buildx";

/// Validated job inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
    /// Image repository the build is tagged and pushed to
    pub repository: String,
    pub username: String,
    pub password: String,
    /// Extra `user:password@host` logins
    pub registries: Vec<String>,
    /// Build context path
    pub context: String,
    /// Dockerfile path
    pub file: Option<String>,
    pub build_args: Vec<String>,
    pub tags: Vec<String>,
    pub labels: Vec<String>,
    pub push: bool,
    pub load: bool,
    pub platform: Option<String>,
    /// Existing builder to use; a new one is created when unset
    pub builder: Option<String>,
    /// Restore and save the layer cache
    pub cache: bool,
    /// Cache key prefix
    pub cache_key: String,
    pub skip_default_tag: bool,
    pub skip_tag_with_prefix: bool,
    pub auth_only: bool,
    /// Install QEMU emulators before building
    pub qemu: bool,
    /// Default branch when the event payload lacks one
    pub default_branch: Option<String>,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            repository: String::new(),
            username: String::new(),
            password: String::new(),
            registries: vec![],
            context: ".".to_string(),
            file: None,
            build_args: vec![],
            tags: vec![],
            labels: vec![],
            push: false,
            load: false,
            platform: None,
            builder: None,
            cache: false,
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            skip_default_tag: false,
            skip_tag_with_prefix: false,
            auth_only: false,
            qemu: false,
            default_branch: None,
        }
    }
}

impl Inputs {
    /// Normalize raw CLI / environment values
    pub fn from_args(args: &RunArgs) -> Self {
        let context = non_empty(Some(&args.context)).unwrap_or_else(|| ".".to_string());
        let cache_key =
            non_empty(Some(&args.cache_key)).unwrap_or_else(|| DEFAULT_CACHE_KEY.to_string());

        Self {
            repository: non_empty(args.repository.as_ref()).unwrap_or_default(),
            username: args.username.clone().unwrap_or_default(),
            password: args.password.clone().unwrap_or_default(),
            registries: parse_lists(&args.registries),
            context,
            file: non_empty(args.file.as_ref()),
            build_args: parse_lists(&args.build_args),
            tags: parse_lists(&args.tags),
            labels: parse_lists(&args.labels),
            push: args.push,
            load: args.load,
            platform: non_empty(args.platform.as_ref()),
            builder: non_empty(args.builder.as_ref()),
            cache: args.cache,
            cache_key,
            skip_default_tag: args.skip_default_tag,
            skip_tag_with_prefix: args.skip_tag_with_prefix,
            auth_only: args.auth_only,
            qemu: args.qemu,
            default_branch: non_empty(args.default_branch.as_ref()),
        }
    }

    /// Check the inputs the main phase cannot run without
    pub fn validate(&self) -> DockhandResult<()> {
        if self.repository.is_empty() {
            return Err(DockhandError::input("repository", "is required"));
        }
        if self.load && self.platform.as_deref().is_some_and(|p| p.contains(',')) {
            return Err(DockhandError::input(
                "load",
                "cannot load a multi-platform image into the local image store",
            ));
        }
        Ok(())
    }

    /// Whether the derived tags need CI event metadata
    pub fn wants_prefixed_tag(&self) -> bool {
        !self.skip_default_tag && !self.skip_tag_with_prefix
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_lists(raw: &[String]) -> Vec<String> {
    raw.iter().flat_map(|item| parse_list(item)).collect()
}

/// Split a list input into items.
///
/// Items are separated by newlines or commas. A field wrapped in double
/// quotes may contain commas; `""` inside quotes is a literal quote.
/// Items are trimmed and empty items dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    let mut items = Vec::new();

    for line in raw.lines() {
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes && chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => items.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
        items.push(field);
    }

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
